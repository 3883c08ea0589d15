use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserSummary;
use crate::utils::serde_helpers::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Comment,
    Reply,
    Suspend,
    Unsuspend,
}

impl NotificationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Reply => "reply",
            NotificationType::Suspend => "suspend",
            NotificationType::Unsuspend => "unsuspend",
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "comment" => Ok(Self::Comment),
            "reply" => Ok(Self::Reply),
            "suspend" => Ok(Self::Suspend),
            "unsuspend" => Ok(Self::Unsuspend),
            other => Err(format!("Unknown notification type: {}", other)),
        }
    }
}

/// 通知只持有弱引用，被引用的实体可能已经不存在
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub blog: String,
    pub notification_for: String,
    pub user: String,
    pub comment: Option<String>,
    pub replied_on_comment: Option<String>,
    pub reply: Option<String>,
    #[serde(default)]
    pub seen: bool,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// 列表中的通知，引用已展开
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub blog: Option<BlogRef>,
    pub user: Option<UserSummary>,
    pub comment: Option<CommentRef>,
    pub replied_on_comment: Option<CommentRef>,
    pub reply: Option<CommentRef>,
    pub seen: bool,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlogRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub blog_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentRef {
    #[serde(rename = "_id")]
    pub id: String,
    pub comment: String,
}

/// 通知筛选，`all` 表示不限类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationFilter {
    All,
    Only(NotificationType),
}

impl std::str::FromStr for NotificationFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default, rename = "deletedDocCount")]
    pub deleted_doc_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_all_and_each_type() {
        assert_eq!("all".parse::<NotificationFilter>().unwrap(), NotificationFilter::All);
        assert_eq!(
            "reply".parse::<NotificationFilter>().unwrap(),
            NotificationFilter::Only(NotificationType::Reply)
        );
        assert!("follow".parse::<NotificationFilter>().is_err());
    }

    #[test]
    fn type_serializes_lowercase() {
        assert_eq!(serde_json::to_value(NotificationType::Unsuspend).unwrap(), "unsuspend");
        assert_eq!(NotificationType::Like.as_str(), "like");
    }
}
