//! Delete / suspend / unsuspend of users and blogs, with their cascades.
//!
//! The primary change is always one atomic single-document update or delete.
//! Everything after it is best-effort: a failing step is logged and recorded in
//! the returned [`CascadeReport`], the remaining steps still run, and the primary
//! change is never rolled back.

use crate::{
    error::{AppError, Result},
    models::{Blog, BlogState, NotificationType, User},
    services::{
        auth::AuthUser,
        comment::CommentService,
        counters::{AccountDelta, ActivityDelta},
        notification::{NewNotification, NotificationService},
        Database,
    },
    store::{Collection, Filter, Update},
    utils::serde_helpers::{now, timestamp},
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Done { affected: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeStep {
    pub step: &'static str,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Outcome of every secondary step of one moderation operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub steps: Vec<CascadeStep>,
}

impl CascadeReport {
    fn record(&mut self, step: &'static str, result: Result<u64>) {
        let outcome = match result {
            Ok(affected) => {
                debug!("Cascade step {} affected {}", step, affected);
                StepOutcome::Done { affected }
            }
            Err(e) => {
                warn!("Cascade step {} failed: {}", step, e);
                StepOutcome::Failed { error: e.to_string() }
            }
        };
        self.steps.push(CascadeStep { step, outcome });
    }

    async fn run<F>(&mut self, step: &'static str, fut: F)
    where
        F: Future<Output = Result<u64>>,
    {
        let result = fut.await;
        self.record(step, result);
    }

    pub fn is_clean(&self) -> bool {
        self.steps
            .iter()
            .all(|s| matches!(s.outcome, StepOutcome::Done { .. }))
    }

    /// Rows touched by a step, `None` if it did not run or failed.
    pub fn affected(&self, step: &str) -> Option<u64> {
        self.steps.iter().find(|s| s.step == step).and_then(|s| match s.outcome {
            StepOutcome::Done { affected } => Some(affected),
            StepOutcome::Failed { .. } => None,
        })
    }
}

pub const STEP_NOTIFICATIONS: &str = "notifications";
pub const STEP_COMMENTS: &str = "comments";
pub const STEP_AUTHOR: &str = "author";
pub const STEP_BLOGS: &str = "blogs";
pub const STEP_NOTICE: &str = "notice";

#[derive(Clone)]
pub struct ModerationService {
    db: Arc<Database>,
    notifications: NotificationService,
    comments: CommentService,
}

impl ModerationService {
    pub async fn new(
        db: Arc<Database>,
        notifications: NotificationService,
        comments: CommentService,
    ) -> Result<Self> {
        Ok(Self {
            db,
            notifications,
            comments,
        })
    }

    /// 封禁文章：仅允许从公开状态转入
    pub async fn suspend_blog(&self, actor: &AuthUser, blog_id: &str) -> Result<CascadeReport> {
        actor.require_admin()?;
        let blog = self
            .transition_blog(blog_id, BlogState::Active, false)
            .await?;
        info!("Blog {} suspended by {}", blog.blog_id, actor.id);

        let mut report = CascadeReport::default();
        report
            .run(
                STEP_NOTIFICATIONS,
                self.notifications
                    .delete_for_blog_except(&blog.id, NotificationType::Suspend),
            )
            .await;
        report
            .run(STEP_COMMENTS, self.comments.delete_for_blog(&blog.id))
            .await;
        report
            .run(
                STEP_AUTHOR,
                self.apply_account(
                    &blog.author,
                    AccountDelta::posts(-1).and_reads(-blog.activity.total_reads),
                ),
            )
            .await;
        report
            .run(
                STEP_NOTICE,
                self.notice(NotificationType::Suspend, &blog, actor),
            )
            .await;
        Ok(report)
    }

    /// 解封文章：仅允许从封禁状态转入，计数器重置而不是恢复
    pub async fn unsuspend_blog(&self, actor: &AuthUser, blog_id: &str) -> Result<CascadeReport> {
        actor.require_admin()?;
        let blog = self
            .transition_blog(blog_id, BlogState::Suspended, true)
            .await?;
        info!("Blog {} unsuspended by {}", blog.blog_id, actor.id);

        let mut report = CascadeReport::default();
        report
            .run(
                STEP_NOTIFICATIONS,
                self.notifications
                    .delete_for_blog_except(&blog.id, NotificationType::Unsuspend),
            )
            .await;
        report
            .run(STEP_COMMENTS, self.comments.delete_for_blog(&blog.id))
            .await;
        report
            .run(STEP_AUTHOR, self.apply_account(&blog.author, AccountDelta::posts(1)))
            .await;
        report
            .run(
                STEP_NOTICE,
                self.notice(NotificationType::Unsuspend, &blog, actor),
            )
            .await;
        Ok(report)
    }

    pub async fn suspend_user(&self, actor: &AuthUser, user_id: &str) -> Result<CascadeReport> {
        actor.require_admin()?;
        self.set_user_suspension(user_id, true).await?;
        info!("User {} suspended by {}", user_id, actor.id);
        Ok(self.cascade_user_suspension(user_id, false).await)
    }

    pub async fn unsuspend_user(&self, actor: &AuthUser, user_id: &str) -> Result<CascadeReport> {
        actor.require_admin()?;
        self.set_user_suspension(user_id, false).await?;
        info!("User {} unsuspended by {}", user_id, actor.id);
        Ok(self.cascade_user_suspension(user_id, true).await)
    }

    /// 作者删除自己的文章
    ///
    /// 与管理员删除一样清理评论和通知；只有非草稿文章才扣减作者的文章数。
    pub async fn delete_blog(&self, actor: &AuthUser, blog_id: &str) -> Result<CascadeReport> {
        let existing: Blog = self
            .db
            .find_one(Collection::Blogs, &Filter::eq("blog_id", blog_id))
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;
        if existing.author != actor.id {
            return Err(AppError::forbidden("You can only delete your own blogs"));
        }

        let blog: Blog = self
            .db
            .delete_one(
                Collection::Blogs,
                &Filter::by_id(existing.id.as_str()).with(Filter::eq("author", actor.id.as_str())),
            )
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;
        info!("Blog {} deleted by its author {}", blog.blog_id, actor.id);

        let post_delta = if blog.draft { 0 } else { -1 };
        Ok(self.cascade_blog_removal(&blog, post_delta).await)
    }

    pub async fn admin_delete_blog(&self, actor: &AuthUser, blog_id: &str) -> Result<CascadeReport> {
        actor.require_admin()?;
        let blog: Blog = self
            .db
            .delete_one(Collection::Blogs, &Filter::eq("blog_id", blog_id))
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;
        info!("Blog {} deleted by admin {}", blog.blog_id, actor.id);

        Ok(self.cascade_blog_removal(&blog, -1).await)
    }

    pub async fn delete_user(&self, actor: &AuthUser, user_id: &str) -> Result<CascadeReport> {
        actor.require_admin()?;
        let user = self.remove_user(user_id).await?;
        info!("User {} deleted by admin {}", user.personal_info.username, actor.id);
        Ok(self.cascade_user_removal(&user.id).await)
    }

    pub async fn delete_own_account(&self, actor: &AuthUser) -> Result<CascadeReport> {
        let user = self.remove_user(&actor.id).await?;
        info!("User {} deleted their account", user.personal_info.username);
        Ok(self.cascade_user_removal(&user.id).await)
    }

    /// 原子地把文章从 `from` 状态切换到 `active`，返回切换前的文章
    async fn transition_blog(&self, blog_id: &str, from: BlogState, active: bool) -> Result<Blog> {
        let current: Blog = self
            .db
            .find_one(Collection::Blogs, &Filter::eq("blog_id", blog_id))
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;
        if current.state() != from {
            return Err(AppError::Conflict(format!(
                "Blog {} is {:?}, expected {:?}",
                blog_id,
                current.state(),
                from
            )));
        }

        let update = Update::new()
            .set("active", active)
            .set("updatedAt", timestamp::format(&now()))
            .set("comments", Vec::<String>::new())
            .merge(ActivityDelta::reset());
        let guard = Filter::by_id(current.id.as_str())
            .with(Filter::eq("draft", false))
            .with(Filter::eq("active", !active));

        self.db
            .update_one(Collection::Blogs, &guard, &update)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("Blog {} changed state concurrently", blog_id)))
    }

    async fn set_user_suspension(&self, user_id: &str, suspend: bool) -> Result<User> {
        let update = Update::new()
            .set("suspend", suspend)
            .set("updatedAt", timestamp::format(&now()))
            .set("account_info.total_reads", 0);
        self.db
            .update_by_id(Collection::Users, user_id, &update)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    async fn cascade_user_suspension(&self, user_id: &str, active: bool) -> CascadeReport {
        let mut report = CascadeReport::default();
        report
            .run(
                STEP_BLOGS,
                self.db.update_many(
                    Collection::Blogs,
                    &Filter::eq("author", user_id),
                    &Update::new()
                        .set("active", active)
                        .set("comments", Vec::<String>::new())
                        .merge(ActivityDelta::reset()),
                ),
            )
            .await;
        report
            .run(STEP_NOTIFICATIONS, self.notifications.delete_for_recipient(user_id))
            .await;
        report
            .run(STEP_COMMENTS, self.comments.delete_for_user(user_id))
            .await;
        report
    }

    async fn cascade_blog_removal(&self, blog: &Blog, post_delta: i64) -> CascadeReport {
        let mut report = CascadeReport::default();
        report
            .run(STEP_NOTIFICATIONS, self.notifications.delete_for_blog(&blog.id))
            .await;
        report
            .run(STEP_COMMENTS, self.comments.delete_for_blog(&blog.id))
            .await;

        let author_update = Update::new()
            .pull("blogs", blog.id.clone())
            .merge(AccountDelta::posts(post_delta).to_update());
        report
            .run(STEP_AUTHOR, async {
                let previous: Option<User> = self
                    .db
                    .update_by_id(Collection::Users, &blog.author, &author_update)
                    .await?;
                Ok::<u64, AppError>(u64::from(previous.is_some()))
            })
            .await;
        report
    }

    async fn remove_user(&self, user_id: &str) -> Result<User> {
        self.db
            .delete_by_id(Collection::Users, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    async fn cascade_user_removal(&self, user_id: &str) -> CascadeReport {
        let mut report = CascadeReport::default();
        report
            .run(
                STEP_BLOGS,
                self.db
                    .delete_many(Collection::Blogs, &Filter::eq("author", user_id)),
            )
            .await;
        report
            .run(STEP_NOTIFICATIONS, self.notifications.delete_for_recipient(user_id))
            .await;
        report
            .run(STEP_COMMENTS, self.comments.delete_for_user(user_id))
            .await;
        report
    }


    async fn apply_account(&self, user_id: &str, delta: AccountDelta) -> Result<u64> {
        let previous = delta.apply(&self.db, user_id).await?;
        Ok(u64::from(previous.is_some()))
    }

    async fn notice(&self, kind: NotificationType, blog: &Blog, actor: &AuthUser) -> Result<u64> {
        self.notifications
            .create(NewNotification::new(kind, &blog.id, &blog.author, &actor.id))
            .await?;
        Ok(1)
    }
}
