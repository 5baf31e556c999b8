//! Authentication route handlers.
//!
//! Registration, the two-step login and the caller's profile. Failed logins
//! all answer `401 unauthorized` with the same message.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use mercato_core::UserId;

use crate::error::{AppError, Result, add_breadcrumb, set_sentry_user};
use crate::extract::ApiJson;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{AuthService, LoginOutcome, Session};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorLoginRequest {
    pub user_id: UserId,
    pub code: String,
}

/// Password step answer when a TOTP code is still needed.
#[derive(Debug, Serialize)]
pub struct TwoFactorChallenge {
    pub requires_two_factor: bool,
    pub user_id: UserId,
}

/// Register a new account and sign in.
///
/// POST /api/auth/register
///
/// # Errors
///
/// `validation` for a bad username, email or password; `conflict` if the
/// username or email is taken.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Session>)> {
    let session = AuthService::new(state.pool(), state.tokens())
        .register(&body.username, &body.email, &body.password)
        .await?;

    set_sentry_user(&session.user.id, Some(&session.user.username));
    Ok((StatusCode::CREATED, Json(session)))
}

/// Check email and password.
///
/// POST /api/auth/login
///
/// Answers with a session, or with a challenge carrying only the user id
/// when the account has two-factor enabled.
///
/// # Errors
///
/// `unauthorized` for an unknown email or wrong password.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Response> {
    let outcome = AuthService::new(state.pool(), state.tokens())
        .login(&body.email, &body.password)
        .await?;

    Ok(match outcome {
        LoginOutcome::Authenticated(session) => {
            set_sentry_user(&session.user.id, Some(&session.user.username));
            Json(session).into_response()
        }
        LoginOutcome::TwoFactorRequired { user_id } => {
            add_breadcrumb("auth", "Two-factor challenge issued", None);
            Json(TwoFactorChallenge {
                requires_two_factor: true,
                user_id,
            })
            .into_response()
        }
    })
}

/// Finish a two-factor login.
///
/// POST /api/auth/login/2fa
///
/// # Errors
///
/// `unauthorized` for an unknown user or a wrong code.
pub async fn login_two_factor(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<TwoFactorLoginRequest>,
) -> Result<Json<Session>> {
    let session = AuthService::new(state.pool(), state.tokens())
        .complete_two_factor_login(body.user_id, &body.code, state.code_attempts())
        .await?;

    set_sentry_user(&session.user.id, Some(&session.user.username));
    Ok(Json(session))
}

/// The caller's profile.
///
/// GET /api/auth/me
///
/// # Errors
///
/// `unauthorized` if the token is missing or the user no longer exists.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool(), state.tokens())
        .get_user(current.id)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => {
                AppError::Unauthorized("Session user no longer exists".to_string())
            }
            other => other,
        })?;

    Ok(Json(user))
}
