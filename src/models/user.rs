use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::serde_helpers::timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default)]
    pub account_info: AccountInfo,
    /// 账号由 Google 登录创建，此时密码不参与校验
    #[serde(default)]
    pub google_auth: bool,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub suspend: bool,
    #[serde(default)]
    pub blogs: Vec<String>,
    #[serde(rename = "joinedAt", with = "timestamp")]
    pub joined_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub fullname: String,
    pub email: String,
    pub nim: Option<String>,
    pub password: Option<String>,
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_img: String,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SocialLinks {
    #[serde(default)]
    pub youtube: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub website: String,
}

impl SocialLinks {
    pub fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("youtube", self.youtube.as_str()),
            ("instagram", self.instagram.as_str()),
            ("facebook", self.facebook.as_str()),
            ("twitter", self.twitter.as_str()),
            ("github", self.github.as_str()),
            ("website", self.website.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    #[serde(default)]
    pub total_posts: i64,
    #[serde(default)]
    pub total_reads: i64,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            fullname: self.personal_info.fullname.clone(),
            username: self.personal_info.username.clone(),
            profile_img: self.personal_info.profile_img.clone(),
        }
    }

    /// 对外展示的资料，不含密码等凭据
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            fullname: self.personal_info.fullname.clone(),
            username: self.personal_info.username.clone(),
            email: self.personal_info.email.clone(),
            bio: self.personal_info.bio.clone(),
            profile_img: self.personal_info.profile_img.clone(),
            is_verified: self.personal_info.is_verified,
            social_links: self.social_links.clone(),
            account_info: self.account_info,
            admin: self.admin,
            suspend: self.suspend,
            joined_at: self.joined_at,
        }
    }
}

/// 被引用时展开的作者信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub fullname: String,
    pub username: String,
    pub profile_img: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub profile_img: String,
    pub is_verified: bool,
    pub social_links: SocialLinks,
    pub account_info: AccountInfo,
    pub admin: bool,
    pub suspend: bool,
    #[serde(rename = "joinedAt", with = "timestamp")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, message = "Username should be at least 3 letters long"))]
    pub username: String,

    #[serde(default)]
    #[validate(length(max = 150, message = "Bio should not be more than 150 characters"))]
    pub bio: String,

    #[serde(default)]
    pub social_links: SocialLinks,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileImageRequest {
    #[validate(url(message = "Profile image must be a URL"))]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchUsersQuery {
    pub query: String,
}

/// 管理员用户列表筛选条件
#[derive(Debug, Default, Deserialize)]
pub struct AdminUsersQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub admin: Option<bool>,
    #[serde(default)]
    pub suspend: Option<bool>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "deletedDocCount")]
    pub deleted_doc_count: Option<u64>,
}
