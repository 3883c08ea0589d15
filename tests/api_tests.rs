mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use campus_blog::{build_router, state::AppState};
use common::{seed_blog, seed_user, state};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn token_for(state: &Arc<AppState>, id: &str, admin: bool) -> String {
    let mut user = seed_user(state.db.as_ref(), id, 0, 0).await;
    user.admin = admin;
    state.auth_service.issue_access_token(&user).unwrap()
}

#[tokio::test]
async fn health_check_responds() {
    let app = build_router(state().await);
    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bad_tokens() {
    let app = build_router(state().await);

    let (status, body) = send(&app, post("/api/blogs", None, json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTHENTICATION_ERROR");

    let (status, _) = send(&app, get("/api/notifications", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn blog_can_be_published_and_read() {
    let state = state().await;
    let token = token_for(&state, "author", false).await;
    let app = build_router(state.clone());

    let (status, body) = send(
        &app,
        post(
            "/api/blogs",
            Some(&token),
            json!({
                "title": "Hello Campus!",
                "desc": "First post",
                "banner": "https://cdn/banner.png",
                "content": { "blocks": [{ "type": "paragraph" }] },
                "tags": ["Rust", "Campus"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let blog_id = body["data"]["id"].as_str().unwrap().to_string();
    assert!(blog_id.starts_with("Hello-Campus"));

    let (status, body) = send(&app, get(&format!("/api/blogs/{}", blog_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["activity"]["total_reads"], 1);
    assert_eq!(body["data"]["tags"], json!(["rust", "campus"]));
    assert_eq!(body["data"]["author"]["username"], "author");

    let (_, body) = send(&app, get("/api/blogs/latest", None)).await;
    assert_eq!(body["data"]["totalDocs"], 1);

    let author = common::user(state.db.as_ref(), "author").await;
    assert_eq!(author.account_info.total_posts, 1);
    assert_eq!(author.account_info.total_reads, 1);
    assert_eq!(author.blogs.len(), 1);
}

#[tokio::test]
async fn publishing_without_description_is_forbidden() {
    let state = state().await;
    let token = token_for(&state, "author", false).await;
    let app = build_router(state);

    let (status, body) = send(
        &app,
        post(
            "/api/blogs",
            Some(&token),
            json!({ "title": "Hello", "content": { "blocks": [1] }, "tags": ["a"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn suspension_needs_the_admin_claim() {
    let state = state().await;
    seed_user(state.db.as_ref(), "author", 1, 0).await;
    let blog = seed_blog(state.db.as_ref(), "b1", "author", false, 0).await;
    let reader = token_for(&state, "reader", false).await;
    let admin = token_for(&state, "boss", true).await;
    let app = build_router(state);

    let uri = format!("/api/admin/blogs/{}/suspend", blog.blog_id);
    let (status, _) = send(&app, post(&uri, Some(&reader), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, post(&uri, Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, post(&uri, Some(&admin), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = send(&app, get(&format!("/api/blogs/{}", blog.blog_id), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn liking_twice_counts_once() {
    let state = state().await;
    seed_user(state.db.as_ref(), "author", 1, 0).await;
    seed_blog(state.db.as_ref(), "b1", "author", false, 0).await;
    let reader = token_for(&state, "reader", false).await;
    let app = build_router(state.clone());

    for _ in 0..2 {
        let (status, body) = send(
            &app,
            post("/api/blogs/like", Some(&reader), json!({ "_id": "b1", "isLikedByUser": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["liked_by_user"], true);
    }
    assert_eq!(common::blog(state.db.as_ref(), "b1").await.activity.total_likes, 4);

    let (_, body) = send(&app, get("/api/blogs/liked/b1", Some(&reader))).await;
    assert_eq!(body["data"]["result"], true);

    let (_, body) = send(
        &app,
        post("/api/blogs/like", Some(&reader), json!({ "_id": "b1", "isLikedByUser": true })),
    )
    .await;
    assert_eq!(body["data"]["liked_by_user"], false);
    assert_eq!(common::blog(state.db.as_ref(), "b1").await.activity.total_likes, 3);
}

#[tokio::test]
async fn notifications_list_marks_seen_and_rejects_unknown_filters() {
    let state = state().await;
    seed_user(state.db.as_ref(), "author", 1, 0).await;
    seed_blog(state.db.as_ref(), "b1", "author", false, 0).await;
    let author = state
        .auth_service
        .issue_access_token(&common::user(state.db.as_ref(), "author").await)
        .unwrap();
    let reader = token_for(&state, "reader", false).await;
    let app = build_router(state);

    send(
        &app,
        post("/api/comments", Some(&reader), json!({ "_id": "b1", "comment": "hi" })),
    )
    .await;

    let (_, body) = send(&app, get("/api/notifications/new", Some(&author))).await;
    assert_eq!(body["data"]["new_notification_available"], true);

    let (status, body) = send(&app, get("/api/notifications?filter=comment", Some(&author))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalDocs"], 1);
    assert_eq!(body["data"]["results"][0]["comment"]["comment"], "hi");

    let (_, body) = send(&app, get("/api/notifications/new", Some(&author))).await;
    assert_eq!(body["data"]["new_notification_available"], false);

    let (status, _) = send(&app, get("/api/notifications?filter=follow", Some(&author))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_and_signin_round_trip() {
    let app = build_router(state().await);

    let (status, body) = send(
        &app,
        post(
            "/api/auth/signup",
            None,
            json!({
                "fullname": "Budi Santoso",
                "email": "budi@poljan.ac.id",
                "nim": "213051001",
                "password": "Secret12"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "budi");

    let (status, body) = send(
        &app,
        post(
            "/api/auth/signin",
            None,
            json!({ "email": "budi@poljan.ac.id", "nim": "213051001", "password": "Secret12" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isAdmin"], false);
    assert!(body["data"]["access_token"].as_str().is_some());

    let (status, _) = send(
        &app,
        post(
            "/api/auth/signup",
            None,
            json!({
                "fullname": "Budi Santoso",
                "email": "budi@poljan.ac.id",
                "nim": "213051002",
                "password": "Secret12"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
