use crate::{
    error::Result,
    models::{
        CreateBlogRequest, FeedQuery, GetBlogRequest, LatestBlogsQuery, LikeBlogRequest,
        ManagedBlogsQuery, SearchBlogsQuery,
    },
    services::AuthUser,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_blog))
        .route("/latest", get(latest_blogs))
        .route("/latest/count", get(latest_blogs_count))
        .route("/trending", get(trending_blogs))
        .route("/feed", get(feed))
        .route("/search", get(search_blogs))
        .route("/search/count", get(search_blogs_count))
        .route("/mine", get(user_blogs))
        .route("/mine/count", get(user_blogs_count))
        .route("/like", post(like_blog))
        .route("/liked/:id", get(is_liked))
        .route("/:blog_id", get(get_blog).delete(delete_blog))
}

#[derive(Debug, Default, Deserialize)]
struct ReadQuery {
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    mode: Option<String>,
}

async fn create_blog(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateBlogRequest>,
) -> Result<Json<Value>> {
    let blog_id = state.blog_service.create_or_update(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "id": blog_id }
    })))
}

async fn latest_blogs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestBlogsQuery>,
) -> Result<Json<Value>> {
    let page = state.blog_service.latest(query.page).await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

async fn latest_blogs_count(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let total_docs = state.blog_service.latest_count().await?;

    Ok(Json(json!({
        "success": true,
        "data": { "totalDocs": total_docs }
    })))
}

async fn trending_blogs(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let blogs = state.blog_service.trending().await?;

    Ok(Json(json!({
        "success": true,
        "data": blogs
    })))
}

async fn feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Value>> {
    let page = state
        .blog_service
        .feed(query.after.as_deref(), query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

async fn search_blogs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchBlogsQuery>,
) -> Result<Json<Value>> {
    let page = state.blog_service.search(query).await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

async fn search_blogs_count(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchBlogsQuery>,
) -> Result<Json<Value>> {
    let total_docs = state.blog_service.search_count(&query).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "totalDocs": total_docs }
    })))
}

async fn user_blogs(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ManagedBlogsQuery>,
) -> Result<Json<Value>> {
    let page = state.blog_service.user_blogs(&user.id, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

async fn user_blogs_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ManagedBlogsQuery>,
) -> Result<Json<Value>> {
    let total_docs = state.blog_service.user_blogs_count(&user.id, &query).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "totalDocs": total_docs }
    })))
}

async fn get_blog(
    State(state): State<Arc<AppState>>,
    Path(blog_id): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>> {
    let blog = state
        .blog_service
        .get_blog(GetBlogRequest {
            blog_id,
            draft: query.draft,
            mode: query.mode,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": blog
    })))
}

async fn like_blog(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<LikeBlogRequest>,
) -> Result<Json<Value>> {
    let liked_by_user = state.blog_service.like(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "liked_by_user": liked_by_user }
    })))
}

async fn is_liked(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let liked = state.blog_service.is_liked(&user.id, &id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "result": liked }
    })))
}

async fn delete_blog(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(blog_id): Path<String>,
) -> Result<Json<Value>> {
    state.moderation_service.delete_blog(&user, &blog_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Blog deleted"
    })))
}
