use crate::{
    error::Result,
    models::{AddCommentRequest, RepliesQuery},
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

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(add_comment))
        .route("/blog/:blog_id", get(get_blog_comments))
        .route("/blog/:blog_id/count", get(count_blog_comments))
        .route("/:id", delete(delete_comment))
        .route("/:id/replies", get(get_replies))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<AddCommentRequest>,
) -> Result<Json<Value>> {
    let comment = state.comment_service.add_comment(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": comment
    })))
}

async fn get_blog_comments(
    State(state): State<Arc<AppState>>,
    Path(blog_id): Path<String>,
    Query(query): Query<RepliesQuery>,
) -> Result<Json<Value>> {
    let comments = state
        .comment_service
        .get_blog_comments(&blog_id, query.skip.unwrap_or(0))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": comments
    })))
}

async fn count_blog_comments(
    State(state): State<Arc<AppState>>,
    Path(blog_id): Path<String>,
) -> Result<Json<Value>> {
    let total_docs = state.comment_service.count_blog_comments(&blog_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "totalDocs": total_docs }
    })))
}

async fn get_replies(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RepliesQuery>,
) -> Result<Json<Value>> {
    let replies = state
        .comment_service
        .get_replies(&id, query.skip.unwrap_or(0))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": replies
    })))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let removed = state.comment_service.delete_comment(&user.id, &id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "removed": removed }
    })))
}
