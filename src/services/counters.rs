//! Every change to the denormalized counters (`account_info.*` on users,
//! `activity.*` on blogs) goes through here. Decrements are clamped at zero by
//! the store in the same atomic update.

use crate::error::Result;
use crate::models::{Blog, User};
use crate::services::database::Database;
use crate::store::{Collection, Update};

const FLOOR: i64 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountDelta {
    pub total_posts: i64,
    pub total_reads: i64,
}

impl AccountDelta {
    pub fn posts(by: i64) -> Self {
        Self {
            total_posts: by,
            ..Self::default()
        }
    }

    pub fn reads(by: i64) -> Self {
        Self {
            total_reads: by,
            ..Self::default()
        }
    }

    pub fn and_reads(mut self, by: i64) -> Self {
        self.total_reads += by;
        self
    }

    pub fn is_zero(&self) -> bool {
        self.total_posts == 0 && self.total_reads == 0
    }

    pub fn to_update(self) -> Update {
        let mut update = Update::new();
        if self.total_posts != 0 {
            update = update.inc_clamped("account_info.total_posts", self.total_posts, FLOOR);
        }
        if self.total_reads != 0 {
            update = update.inc_clamped("account_info.total_reads", self.total_reads, FLOOR);
        }
        update
    }

    /// Returns the user as it was before the change, `None` if it does not exist.
    pub async fn apply(self, db: &Database, user_id: &str) -> Result<Option<User>> {
        if self.is_zero() {
            return db.get_by_id(Collection::Users, user_id).await;
        }
        db.update_by_id(Collection::Users, user_id, &self.to_update()).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityDelta {
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_reads: i64,
    pub total_parent_comments: i64,
}

impl ActivityDelta {
    pub fn likes(by: i64) -> Self {
        Self {
            total_likes: by,
            ..Self::default()
        }
    }

    pub fn reads(by: i64) -> Self {
        Self {
            total_reads: by,
            ..Self::default()
        }
    }

    pub fn comment_added(top_level: bool) -> Self {
        Self {
            total_comments: 1,
            total_parent_comments: i64::from(top_level),
            ..Self::default()
        }
    }

    pub fn comment_removed(top_level: bool) -> Self {
        Self {
            total_comments: -1,
            total_parent_comments: -i64::from(top_level),
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_update(self) -> Update {
        [
            ("activity.total_likes", self.total_likes),
            ("activity.total_comments", self.total_comments),
            ("activity.total_reads", self.total_reads),
            ("activity.total_parent_comments", self.total_parent_comments),
        ]
        .into_iter()
        .filter(|(_, by)| *by != 0)
        .fold(Update::new(), |update, (field, by)| update.inc_clamped(field, by, FLOOR))
    }

    /// 将所有活动计数清零（封禁/解封时的破坏性重置）
    pub fn reset() -> Update {
        Update::new()
            .set("activity.total_likes", 0)
            .set("activity.total_comments", 0)
            .set("activity.total_reads", 0)
            .set("activity.total_parent_comments", 0)
    }

    pub async fn apply(self, db: &Database, blog_id: &str) -> Result<Option<Blog>> {
        if self.is_zero() {
            return db.get_by_id(Collection::Blogs, blog_id).await;
        }
        db.update_by_id(Collection::Blogs, blog_id, &self.to_update()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UpdateOp;

    #[test]
    fn zero_fields_produce_no_operations() {
        assert!(AccountDelta::default().to_update().is_empty());
        assert_eq!(AccountDelta::posts(-1).to_update().0.len(), 1);
        assert_eq!(ActivityDelta::comment_removed(false).to_update().0.len(), 1);
        assert_eq!(ActivityDelta::comment_removed(true).to_update().0.len(), 2);
    }

    #[test]
    fn decrements_are_clamped_at_zero() {
        let update = AccountDelta::posts(-1).and_reads(-50).to_update();
        assert!(update
            .0
            .iter()
            .all(|op| matches!(op, UpdateOp::IncClamped { floor: 0, .. })));
    }

    #[test]
    fn reset_sets_all_activity_counters() {
        let update = ActivityDelta::reset();
        assert_eq!(update.0.len(), 4);
        assert!(update.0.iter().all(|op| matches!(op, UpdateOp::Set { .. })));
    }

    #[tokio::test]
    async fn apply_clamps_against_stored_value() {
        let db = Database::in_memory();
        db.create(
            Collection::Users,
            &serde_json::json!({
                "_id": "u1",
                "personal_info": {"username": "u1", "email": "u1@x.id"},
                "account_info": {"total_posts": 1, "total_reads": 10}
            }),
        )
        .await
        .unwrap();

        db.update_by_id::<serde_json::Value>(
            Collection::Users,
            "u1",
            &AccountDelta::posts(-3).and_reads(-4).to_update(),
        )
        .await
        .unwrap();

        let user: serde_json::Value = db.get_by_id(Collection::Users, "u1").await.unwrap().unwrap();
        assert_eq!(user["account_info"]["total_posts"], 0);
        assert_eq!(user["account_info"]["total_reads"], 6);
    }
}
