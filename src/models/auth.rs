use serde::{Deserialize, Serialize};
use validator::Validate;

/// JWT 中携带的声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 `_id`
    pub id: String,
    #[serde(default)]
    pub admin: bool,
    pub exp: i64,
    pub iat: i64,
}

/// 邮件验证令牌
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailClaims {
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, message = "Fullname must be at least 3 letters long"))]
    pub fullname: String,
    pub email: String,
    pub nim: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub nim: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleAuthRequest {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "currentPassword")]
    pub current_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// 登录成功后返回给客户端的会话信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    pub access_token: String,
    pub profile_img: String,
    pub username: String,
    pub fullname: String,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

/// 外部 OAuth 校验返回的身份信息
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleIdentity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}
