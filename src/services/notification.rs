use crate::{
    error::Result,
    models::{
        Blog, BlogRef, Comment, CommentRef, Notification, NotificationFilter, NotificationType,
        NotificationView, User,
    },
    services::{
        pagination::{paginate, Page, PageRequest},
        Database,
    },
    store::{Collection, Filter, Sort, Update},
    utils::serde_helpers::now,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 待创建的通知
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationType,
    pub blog: String,
    pub notification_for: String,
    pub user: String,
    pub comment: Option<String>,
    pub replied_on_comment: Option<String>,
}

impl NewNotification {
    pub fn new(
        kind: NotificationType,
        blog: impl Into<String>,
        notification_for: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            blog: blog.into(),
            notification_for: notification_for.into(),
            user: user.into(),
            comment: None,
            replied_on_comment: None,
        }
    }

    pub fn comment(mut self, comment_id: impl Into<String>) -> Self {
        self.comment = Some(comment_id.into());
        self
    }

    pub fn replied_on(mut self, comment_id: impl Into<String>) -> Self {
        self.replied_on_comment = Some(comment_id.into());
        self
    }
}

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<Database>,
}

impl NotificationService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    pub async fn create(&self, new: NewNotification) -> Result<Notification> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            blog: new.blog,
            notification_for: new.notification_for,
            user: new.user,
            comment: new.comment,
            replied_on_comment: new.replied_on_comment,
            reply: None,
            seen: false,
            created_at: now(),
        };
        self.db.create(Collection::Notifications, &notification).await?;
        debug!(
            "Created {} notification {} for {}",
            notification.kind.as_str(),
            notification.id,
            notification.notification_for
        );
        Ok(notification)
    }

    /// 通知接收者的筛选条件；自己触发的通知不计入
    pub fn recipient_filter(user_id: &str, filter: NotificationFilter) -> Filter {
        let base = Filter::eq("notification_for", user_id).with(Filter::ne("user", user_id));
        match filter {
            NotificationFilter::All => base,
            NotificationFilter::Only(kind) => base.with(Filter::eq("type", kind.as_str())),
        }
    }

    pub async fn new_notification_available(&self, user_id: &str) -> Result<bool> {
        let filter = Self::recipient_filter(user_id, NotificationFilter::All)
            .with(Filter::eq("seen", false));
        Ok(self.db.count(Collection::Notifications, &filter).await? > 0)
    }

    /// 获取通知列表，并把本页通知标记为已读
    pub async fn list(
        &self,
        user_id: &str,
        filter: NotificationFilter,
        request: PageRequest,
    ) -> Result<Page<NotificationView>> {
        let page: Page<Notification> = paginate(
            &self.db,
            Collection::Notifications,
            &Self::recipient_filter(user_id, filter),
            Sort::desc("createdAt"),
            request,
        )
        .await?;

        let unseen: Vec<String> = page
            .results
            .iter()
            .filter(|n| !n.seen)
            .map(|n| n.id.clone())
            .collect();
        if !unseen.is_empty() {
            let marked = self
                .db
                .update_many(
                    Collection::Notifications,
                    &Filter::is_in("_id", unseen),
                    &Update::new().set("seen", true),
                )
                .await?;
            debug!("Marked {} notifications as seen for {}", marked, user_id);
        }

        let views = self.populate(&page.results).await?;
        Ok(page.with_results(views))
    }

    pub async fn count(&self, user_id: &str, filter: NotificationFilter) -> Result<u64> {
        self.db
            .count(Collection::Notifications, &Self::recipient_filter(user_id, filter))
            .await
    }

    /// 展开通知中的引用；已不存在的引用显示为空
    async fn populate(&self, notifications: &[Notification]) -> Result<Vec<NotificationView>> {
        let blog_ids: Vec<String> = notifications.iter().map(|n| n.blog.clone()).collect();
        let user_ids: Vec<String> = notifications.iter().map(|n| n.user.clone()).collect();
        let comment_ids: Vec<String> = notifications
            .iter()
            .flat_map(|n| [&n.comment, &n.replied_on_comment, &n.reply])
            .flatten()
            .cloned()
            .collect();

        let blogs = self.db.get_many::<Blog>(Collection::Blogs, &blog_ids).await?;
        let users = self.db.get_many::<User>(Collection::Users, &user_ids).await?;
        let comments = self.db.get_many::<Comment>(Collection::Comments, &comment_ids).await?;

        let comment_ref = |id: &Option<String>| {
            id.as_ref().and_then(|id| comments.get(id)).map(|c| CommentRef {
                id: c.id.clone(),
                comment: c.comment.clone(),
            })
        };

        Ok(notifications
            .iter()
            .map(|n| NotificationView {
                id: n.id.clone(),
                kind: n.kind,
                blog: blogs.get(&n.blog).map(|b| BlogRef {
                    id: b.id.clone(),
                    blog_id: b.blog_id.clone(),
                    title: b.title.clone(),
                }),
                user: users.get(&n.user).map(User::summary),
                comment: comment_ref(&n.comment),
                replied_on_comment: comment_ref(&n.replied_on_comment),
                reply: comment_ref(&n.reply),
                seen: n.seen,
                created_at: n.created_at,
            })
            .collect())
    }

    /// 删除某篇文章上除 `keep` 类型外的所有通知
    pub async fn delete_for_blog_except(&self, blog_id: &str, keep: NotificationType) -> Result<u64> {
        let filter = Filter::eq("blog", blog_id).with(Filter::ne("type", keep.as_str()));
        self.db.delete_many(Collection::Notifications, &filter).await
    }

    pub async fn delete_for_blog(&self, blog_id: &str) -> Result<u64> {
        self.db
            .delete_many(Collection::Notifications, &Filter::eq("blog", blog_id))
            .await
    }

    pub async fn delete_for_recipient(&self, user_id: &str) -> Result<u64> {
        self.db
            .delete_many(Collection::Notifications, &Filter::eq("notification_for", user_id))
            .await
    }

    pub async fn delete_for_comment(&self, comment_id: &str) -> Result<u64> {
        self.db
            .delete_many(Collection::Notifications, &Filter::eq("comment", comment_id))
            .await
    }

    pub async fn delete_for_comments(&self, comment_ids: &[String]) -> Result<u64> {
        self.db
            .delete_many(
                Collection::Notifications,
                &Filter::is_in("comment", comment_ids.iter().cloned()),
            )
            .await
    }

    pub async fn unset_replies(&self, comment_ids: &[String]) -> Result<u64> {
        self.db
            .update_many(
                Collection::Notifications,
                &Filter::is_in("reply", comment_ids.iter().cloned()),
                &Update::new().unset("reply"),
            )
            .await
    }

    /// 回复被删除时只解除引用，原通知保留
    pub async fn unset_reply(&self, comment_id: &str) -> Result<u64> {
        self.db
            .update_many(
                Collection::Notifications,
                &Filter::eq("reply", comment_id),
                &Update::new().unset("reply"),
            )
            .await
    }

    /// 回复某条通知时记录回复引用
    pub async fn attach_reply(&self, notification_id: &str, reply_id: &str) -> Result<bool> {
        let previous: Option<Notification> = self
            .db
            .update_by_id(
                Collection::Notifications,
                notification_id,
                &Update::new().set("reply", reply_id),
            )
            .await?;
        if previous.is_some() {
            info!("Notification {} answered by {}", notification_id, reply_id);
        }
        Ok(previous.is_some())
    }

    /// 点赞通知
    pub async fn find_like(&self, blog_id: &str, user_id: &str) -> Result<Option<Notification>> {
        self.db
            .find_one(
                Collection::Notifications,
                &Filter::eq("type", NotificationType::Like.as_str())
                    .with(Filter::eq("blog", blog_id))
                    .with(Filter::eq("user", user_id)),
            )
            .await
    }

    pub async fn delete_like(&self, blog_id: &str, user_id: &str) -> Result<Option<Notification>> {
        self.db
            .delete_one(
                Collection::Notifications,
                &Filter::eq("type", NotificationType::Like.as_str())
                    .with(Filter::eq("blog", blog_id))
                    .with(Filter::eq("user", user_id)),
            )
            .await
    }
}
