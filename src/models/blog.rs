use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::user::UserSummary;
use crate::utils::serde_helpers::timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    #[serde(rename = "_id")]
    pub id: String,
    pub blog_id: String,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub banner: String,
    /// 编辑器输出的结构化内容，服务端不解析
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    #[serde(default)]
    pub activity: Activity,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(rename = "publishedAt", with = "timestamp")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    #[serde(default)]
    pub total_likes: i64,
    #[serde(default)]
    pub total_comments: i64,
    #[serde(default)]
    pub total_reads: i64,
    #[serde(default)]
    pub total_parent_comments: i64,
}

/// 由 (`draft`, `active`) 推导出的文章状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogState {
    Draft,
    Active,
    Suspended,
}

impl BlogState {
    pub fn of(draft: bool, active: bool) -> Self {
        match (draft, active) {
            (true, _) => BlogState::Draft,
            (false, true) => BlogState::Active,
            (false, false) => BlogState::Suspended,
        }
    }
}

impl Blog {
    pub fn state(&self) -> BlogState {
        BlogState::of(self.draft, self.active)
    }

    pub fn summary(&self, author: Option<UserSummary>) -> BlogSummary {
        BlogSummary {
            id: self.id.clone(),
            blog_id: self.blog_id.clone(),
            title: self.title.clone(),
            desc: self.desc.clone(),
            banner: self.banner.clone(),
            tags: self.tags.clone(),
            activity: self.activity,
            draft: self.draft,
            active: self.active,
            published_at: self.published_at,
            author,
        }
    }
}

/// 列表中展示的文章，作者引用已展开
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub blog_id: String,
    pub title: String,
    pub desc: String,
    pub banner: String,
    pub tags: Vec<String>,
    pub activity: Activity,
    pub draft: bool,
    pub active: bool,
    #[serde(rename = "publishedAt", with = "timestamp")]
    pub published_at: DateTime<Utc>,
    pub author: Option<UserSummary>,
}

/// 单篇文章详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogDetail {
    #[serde(flatten)]
    pub blog: BlogSummary,
    pub content: Value,
}

/// 创建或更新文章；`id` 存在时表示更新已有文章
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBlogRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, message = "You must provide a title"))]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub banner: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetBlogRequest {
    pub blog_id: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LikeBlogRequest {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "isLikedByUser", default)]
    pub is_liked_by_user: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestBlogsQuery {
    #[serde(default)]
    pub page: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchBlogsQuery {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub eliminate_blog: Option<String>,
}

/// 作者自己的文章列表，以及管理员文章列表
#[derive(Debug, Default, Deserialize)]
pub struct ManagedBlogsQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub draft: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "deletedDocCount")]
    pub deleted_doc_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
}
