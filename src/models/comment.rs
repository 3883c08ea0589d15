use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::user::UserSummary;
use crate::utils::serde_helpers::timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: String,
    /// 所属文章的内部 `_id`
    pub blog_id: String,
    pub blog_author: String,
    pub comment: String,
    pub commented_by: String,
    pub parent: Option<String>,
    #[serde(rename = "isReply", default)]
    pub is_reply: bool,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(rename = "commentedAt", with = "timestamp")]
    pub commented_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn view(&self, commented_by: Option<UserSummary>) -> CommentView {
        CommentView {
            id: self.id.clone(),
            blog_id: self.blog_id.clone(),
            blog_author: self.blog_author.clone(),
            comment: self.comment.clone(),
            parent: self.parent.clone(),
            is_reply: self.is_reply,
            children: self.children.clone(),
            commented_at: self.commented_at,
            commented_by,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    #[serde(rename = "_id")]
    pub id: String,
    pub blog_id: String,
    pub blog_author: String,
    pub comment: String,
    pub parent: Option<String>,
    #[serde(rename = "isReply")]
    pub is_reply: bool,
    pub children: Vec<String>,
    #[serde(rename = "commentedAt", with = "timestamp")]
    pub commented_at: DateTime<Utc>,
    pub commented_by: Option<UserSummary>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddCommentRequest {
    /// 文章内部 `_id`
    #[serde(rename = "_id")]
    pub blog_id: String,
    #[validate(length(min = 1, message = "Write something to leave a comment"))]
    pub comment: String,
    #[serde(default)]
    pub replying_to: Option<String>,
    #[serde(default)]
    pub notification_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepliesQuery {
    #[serde(default)]
    pub skip: Option<u64>,
}
