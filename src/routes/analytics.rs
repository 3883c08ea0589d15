use crate::{error::Result, services::AuthUser, state::AppState};
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(user_dashboard))
        .route("/admin", get(admin_dashboard))
}

/// 当前用户的发文统计与热门文章
async fn user_dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    let dashboard = state.analytics_service.user_dashboard(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": dashboard
    })))
}

async fn admin_dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    let dashboard = state.analytics_service.admin_dashboard(&user).await?;

    Ok(Json(json!({
        "success": true,
        "data": dashboard
    })))
}
