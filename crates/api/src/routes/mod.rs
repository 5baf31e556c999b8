//! HTTP routes.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                         - Liveness
//! GET    /health/ready                   - Readiness (database round-trip)
//!
//! # Auth (strict rate limit)
//! POST   /api/auth/register              - Register and sign in
//! POST   /api/auth/login                 - Password step
//! POST   /api/auth/login/2fa             - TOTP step
//! POST   /api/auth/2fa/generate          - New candidate secret      [token]
//! POST   /api/auth/2fa/enable            - Verify code and enable    [token]
//! POST   /api/auth/2fa/disable           - Disable with password     [token]
//!
//! # API (relaxed rate limit)
//! GET    /api/auth/me                    - Current profile           [token]
//! GET    /api/products                   - Catalog
//! GET    /api/products/{id}              - Catalog item
//! GET    /api/cart                       - Read cart                 [token]
//! DELETE /api/cart                       - Clear cart                [token]
//! POST   /api/cart/items                 - Add to cart               [token]
//! PUT    /api/cart/items/{product_id}    - Set quantity              [token]
//! DELETE /api/cart/items/{product_id}    - Remove line               [token]
//! POST   /api/orders                     - Place order               [token]
//! GET    /api/orders                     - Order history             [token]
//! GET    /api/orders/{id}                - Own order                 [token]
//! GET    /api/admin/orders/{id}          - Any order                 [admin]
//! PUT    /api/admin/orders/{id}/status   - Set status                [admin]
//! PUT    /api/admin/users/{id}/admin     - Grant/revoke admin        [admin]
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
pub mod two_factor;

use axum::{
    Router,
    extract::State,
    http::{
        HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::from_fn,
    routing::{get, post, put},
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Login, registration and two-factor routes.
pub fn auth_routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/login/2fa", post(auth::login_two_factor))
        .route("/2fa/generate", post(two_factor::generate))
        .route("/2fa/enable", post(two_factor::enable))
        .route("/2fa/disable", post(two_factor::disable))
        .layer(auth_rate_limiter(trust_proxy_headers))
}

/// Everything else under `/api`.
pub fn api_routes(trust_proxy_headers: bool) -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(auth::me))
        .route("/products", get(products::index))
        .route("/products/{id}", get(products::show))
        .route("/cart", get(cart::show).delete(cart::clear))
        .route("/cart/items", post(cart::add))
        .route(
            "/cart/items/{product_id}",
            put(cart::set_quantity).delete(cart::remove),
        )
        .route("/orders", get(orders::index).post(orders::place))
        .route("/orders/{id}", get(orders::show))
        .route("/admin/orders/{id}", get(admin::show_order))
        .route("/admin/orders/{id}/status", put(admin::set_order_status))
        .route("/admin/users/{id}/admin", put(admin::set_user_admin))
        .layer(api_rate_limiter(trust_proxy_headers))
}

/// Build the application router with its middleware stack.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app(state: AppState) -> Router {
    let cors = state.config().cors_origin.as_deref().and_then(cors_layer);
    let trust_proxy_headers = state.config().trust_proxy_headers;

    let router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api/auth", auth_routes(trust_proxy_headers))
        .nest("/api", api_routes(trust_proxy_headers))
        .layer(from_fn(security_headers_middleware));

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let Ok(origin) = HeaderValue::from_str(origin) else {
        tracing::warn!(origin, "Ignoring unusable CORS origin");
        return None;
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
    )
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
