use crate::{
    error::{AppError, Result},
    models::{NotificationFilter, NotificationsQuery},
    services::{
        pagination::{PageRequest, NOTIFICATIONS_PAGE_SIZE},
        AuthUser,
    },
    state::AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/count", get(count_notifications))
        .route("/new", get(new_notification))
}

fn parse_filter(filter: Option<&str>) -> Result<NotificationFilter> {
    filter
        .unwrap_or("all")
        .parse()
        .map_err(|e: String| AppError::BadRequest(e))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Value>> {
    let filter = parse_filter(query.filter.as_deref())?;
    let request = PageRequest::from_query(query.page, NOTIFICATIONS_PAGE_SIZE, query.deleted_doc_count);
    let page = state
        .notification_service
        .list(&user.id, filter, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

async fn count_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<Value>> {
    let filter = parse_filter(query.filter.as_deref())?;
    let total_docs = state.notification_service.count(&user.id, filter).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "totalDocs": total_docs }
    })))
}

async fn new_notification(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Value>> {
    let available = state
        .notification_service
        .new_notification_available(&user.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "new_notification_available": available }
    })))
}
