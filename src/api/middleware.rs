//! Bearer-token authentication for admin routes.
//!
//! Admin endpoints (explanation seeding, pass granting) are locked unless
//! `MENULENS_API_KEYS` is configured. Errors come back in the standard
//! `{ success, error, errorKind }` envelope.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ErrorKind;

use super::response::ApiResponse;
use super::state::AppState;

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if state.config.server.api_keys.is_empty() {
        return ApiResponse::<()>::failure(
            ErrorKind::Unauthorized,
            "API keys not configured. Set MENULENS_API_KEYS to enable admin access.",
        )
        .into_response();
    }

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        Some(_) => {
            return ApiResponse::<()>::failure(
                ErrorKind::Unauthorized,
                "Invalid authorization header format. Expected: Bearer <token>",
            )
            .into_response();
        }
        None => {
            return ApiResponse::<()>::failure(
                ErrorKind::Unauthorized,
                "Missing authorization header",
            )
            .into_response();
        }
    };

    if state.config.server.api_keys.contains(&token.to_string()) {
        next.run(request).await
    } else {
        ApiResponse::<()>::failure(ErrorKind::Unauthorized, "Invalid API key").into_response()
    }
}
