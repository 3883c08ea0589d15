use crate::{
    error::Result,
    models::{ChangePasswordRequest, GoogleAuthRequest, SigninRequest, SignupRequest, VerifyEmailRequest},
    services::AuthUser,
    state::AppState,
};
use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/verify-email", post(verify_email))
        .route("/google-auth", post(google_auth))
        .route("/change-password", post(change_password))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<Value>> {
    let user = state.auth_service.signup(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "_id": user.id,
            "username": user.personal_info.username,
        },
        "message": "Registration successful. Check your email to verify your account"
    })))
}

async fn signin(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SigninRequest>,
) -> Result<Json<Value>> {
    let session = state.auth_service.signin(request).await?;

    Ok(Json(json!({
        "success": true,
        "data": session
    })))
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<Value>> {
    let session = state.auth_service.verify_email(&request.token).await?;

    Ok(Json(json!({
        "success": true,
        "data": session
    })))
}

async fn google_auth(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GoogleAuthRequest>,
) -> Result<Json<Value>> {
    let session = state.auth_service.google_auth(&request.access_token).await?;

    Ok(Json(json!({
        "success": true,
        "data": session
    })))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>> {
    state.auth_service.change_password(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password changed"
    })))
}
