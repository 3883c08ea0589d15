use crate::{
    error::Result,
    models::{AdminUsersQuery, ManagedBlogsQuery},
    services::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// 管理员接口，全部要求 `admin` 声明
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/blogs", get(list_blogs))
        .route("/blogs/count", get(count_blogs))
        .route("/blogs/:blog_id", delete(delete_blog))
        .route("/blogs/:blog_id/suspend", post(suspend_blog))
        .route("/blogs/:blog_id/unsuspend", post(unsuspend_blog))
        .route("/users", get(list_users))
        .route("/users/count", get(count_users))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/unsuspend", post(unsuspend_user))
}

async fn list_blogs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ManagedBlogsQuery>,
) -> Result<Json<Value>> {
    let page = state.blog_service.admin_blogs(&user, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

async fn count_blogs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ManagedBlogsQuery>,
) -> Result<Json<Value>> {
    let total_docs = state.blog_service.admin_blogs_count(&user, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "totalDocs": total_docs }
    })))
}

async fn suspend_blog(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(blog_id): Path<String>,
) -> Result<Json<Value>> {
    state.moderation_service.suspend_blog(&user, &blog_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Blog suspended"
    })))
}

async fn unsuspend_blog(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(blog_id): Path<String>,
) -> Result<Json<Value>> {
    state.moderation_service.unsuspend_blog(&user, &blog_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Blog unsuspended"
    })))
}

async fn delete_blog(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(blog_id): Path<String>,
) -> Result<Json<Value>> {
    state.moderation_service.admin_delete_blog(&user, &blog_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Blog deleted"
    })))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AdminUsersQuery>,
) -> Result<Json<Value>> {
    let page = state.user_service.admin_users(&user, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

async fn count_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<AdminUsersQuery>,
) -> Result<Json<Value>> {
    let total_docs = state.user_service.admin_users_count(&user, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "totalDocs": total_docs }
    })))
}

async fn suspend_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.moderation_service.suspend_user(&user, &id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User suspended"
    })))
}

async fn unsuspend_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.moderation_service.unsuspend_user(&user, &id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User unsuspended"
    })))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.moderation_service.delete_user(&user, &id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User deleted"
    })))
}
