use axum::extract::DefaultBodyLimit;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::admin_auth_middleware;
use super::AppState;

/// Base64-encoded menu photos run large; cap bodies well above the raw
/// image limit instead of axum's 2 MB default.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/scan", post(handlers::scan_menu))
        .route("/explain", post(handlers::explain_dish))
        .route("/quota/{ownerId}", get(handlers::quota_status));

    let admin = Router::new()
        .route("/explanations:seed", post(handlers::seed_explanations))
        .route("/passes", post(handlers::grant_pass))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", public.nest("/admin", admin))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
