use crate::{
    error::Result,
    models::{SearchUsersQuery, UpdateProfileImageRequest, UpdateProfileRequest},
    services::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, put},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", get(search_users))
        .route("/profile/:username", get(get_profile))
        .route("/profile", put(update_profile))
        .route("/profile-img", put(update_profile_img))
        .route("/me", delete(delete_account))
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchUsersQuery>,
) -> Result<Json<Value>> {
    let users = state.user_service.search_users(&query.query).await?;

    Ok(Json(json!({
        "success": true,
        "data": users
    })))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<Value>> {
    let profile = state.user_service.get_profile(&username).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Value>> {
    let username = state.user_service.update_profile(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "username": username }
    })))
}

async fn update_profile_img(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<UpdateProfileImageRequest>,
) -> Result<Json<Value>> {
    request.validate()?;
    let profile_img = state
        .user_service
        .update_profile_img(&user.id, &request.url)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "profile_img": profile_img }
    })))
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    state.moderation_service.delete_own_account(&user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Account deleted"
    })))
}
