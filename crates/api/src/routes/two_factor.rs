//! Two-factor enrollment route handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::ApiJson;
use crate::middleware::RequireAuth;
use crate::services::two_factor::{Enrollment, TwoFactorService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnableRequest {
    /// The candidate secret returned by `generate`.
    pub secret: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct DisableRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorStatus {
    pub two_factor_enabled: bool,
}

/// POST /api/auth/2fa/generate
///
/// # Errors
///
/// `conflict` if two-factor is already enabled.
pub async fn generate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Enrollment>> {
    let enrollment = TwoFactorService::new(state.pool(), &state.config().auth.totp_issuer)
        .generate_secret(user.id)
        .await?;
    Ok(Json(enrollment))
}

/// POST /api/auth/2fa/enable
///
/// # Errors
///
/// `conflict` if already enabled; `validation` for a bad secret or code.
pub async fn enable(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<EnableRequest>,
) -> Result<Json<TwoFactorStatus>> {
    TwoFactorService::new(state.pool(), &state.config().auth.totp_issuer)
        .verify_and_enable(user.id, &body.secret, &body.code)
        .await?;
    Ok(Json(TwoFactorStatus {
        two_factor_enabled: true,
    }))
}

/// POST /api/auth/2fa/disable
///
/// # Errors
///
/// `forbidden` if the password confirmation is wrong.
pub async fn disable(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<DisableRequest>,
) -> Result<Json<TwoFactorStatus>> {
    TwoFactorService::new(state.pool(), &state.config().auth.totp_issuer)
        .disable(user.id, &body.password)
        .await?;
    Ok(Json(TwoFactorStatus {
        two_factor_enabled: false,
    }))
}
