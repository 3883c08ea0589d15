pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{state::AppState, utils::middleware as mw};

/// 组装全部路由与中间件
pub fn build_router(state: Arc<AppState>) -> Router {
    let origins = state
        .config
        .cors_allowed_origins
        .split(',')
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(origins);

    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/auth", routes::auth::router())
        .nest("/api/blogs", routes::blogs::router())
        .nest("/api/comments", routes::comments::router())
        .nest("/api/notifications", routes::notifications::router())
        .nest("/api/users", routes::users::router())
        .nest("/api/admin", routes::admin::router())
        .nest("/api/analytics", routes::analytics::router())
        .layer(middleware::from_fn(mw::security_headers_middleware))
        .layer(middleware::from_fn(mw::request_logging_middleware))
        .layer(middleware::from_fn(mw::request_id_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "Campus Blog is running!"
}
