use crate::{
    error::{AppError, Result},
    models::{AddCommentRequest, Blog, Comment, CommentView, NotificationType, User},
    services::{
        counters::ActivityDelta,
        notification::{NewNotification, NotificationService},
        pagination::{fetch_window, COMMENTS_PAGE_SIZE, REPLIES_PAGE_SIZE},
        Database,
    },
    store::{Collection, Filter, FindOptions, Sort, Update},
    utils::serde_helpers::now,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct CommentService {
    db: Arc<Database>,
    notifications: NotificationService,
}

impl CommentService {
    pub async fn new(db: Arc<Database>, notifications: NotificationService) -> Result<Self> {
        Ok(Self { db, notifications })
    }

    pub async fn add_comment(&self, user_id: &str, request: AddCommentRequest) -> Result<Comment> {
        debug!("Adding comment to blog {} by {}", request.blog_id, user_id);

        request.validate()?;
        if request.comment.trim().is_empty() {
            return Err(AppError::validation("Write something to leave a comment"));
        }

        let blog: Blog = self
            .db
            .get_by_id(Collection::Blogs, &request.blog_id)
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;

        let parent: Option<Comment> = match &request.replying_to {
            Some(parent_id) => {
                let parent: Comment = self
                    .db
                    .get_by_id(Collection::Comments, parent_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Parent comment"))?;
                if parent.blog_id != blog.id {
                    return Err(AppError::validation("Parent comment belongs to another blog"));
                }
                Some(parent)
            }
            None => None,
        };

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            blog_id: blog.id.clone(),
            blog_author: blog.author.clone(),
            comment: request.comment,
            commented_by: user_id.to_string(),
            parent: parent.as_ref().map(|p| p.id.clone()),
            is_reply: parent.is_some(),
            children: Vec::new(),
            commented_at: now(),
        };
        self.db.create(Collection::Comments, &comment).await?;

        if let Some(parent) = &parent {
            self.db
                .update_by_id::<Comment>(
                    Collection::Comments,
                    &parent.id,
                    &Update::new().push("children", comment.id.clone()),
                )
                .await?;
        }

        let blog_update = Update::new()
            .push("comments", comment.id.clone())
            .merge(ActivityDelta::comment_added(comment.is_top_level()).to_update());
        self.db
            .update_by_id::<Blog>(Collection::Blogs, &blog.id, &blog_update)
            .await?;

        let notification = match &parent {
            Some(parent) => NewNotification::new(NotificationType::Reply, &blog.id, &parent.commented_by, user_id)
                .comment(&comment.id)
                .replied_on(&parent.id),
            None => NewNotification::new(NotificationType::Comment, &blog.id, &blog.author, user_id)
                .comment(&comment.id),
        };
        self.notifications.create(notification).await?;

        if let Some(notification_id) = &request.notification_id {
            if !self.notifications.attach_reply(notification_id, &comment.id).await? {
                warn!("Replied-to notification {} no longer exists", notification_id);
            }
        }

        info!("Comment {} added to blog {}", comment.id, blog.id);
        Ok(comment)
    }

    /// 删除评论及其全部回复；仅评论作者或文章作者可操作
    ///
    /// 返回删除的评论条数。
    pub async fn delete_comment(&self, requester_id: &str, comment_id: &str) -> Result<u64> {
        let comment: Comment = self
            .db
            .get_by_id(Collection::Comments, comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        if comment.commented_by != requester_id && comment.blog_author != requester_id {
            return Err(AppError::forbidden("You can not delete this comment"));
        }

        self.delete_subtree(comment_id).await
    }

    /// 深度优先删除以 `root_id` 为根的评论子树
    ///
    /// 子树中出现重复访问（环）时立即失败。
    pub async fn delete_subtree(&self, root_id: &str) -> Result<u64> {
        let mut stack = vec![root_id.to_string()];
        let mut visited = HashSet::new();
        let mut removed = 0u64;

        while let Some(id) = stack.pop() {
            if !visited.insert(id.clone()) {
                error!("Comment tree under {} contains a cycle at {}", root_id, id);
                return Err(AppError::Fatal(format!(
                    "comment tree under {} contains a cycle at {} ({} removed)",
                    root_id, id, removed
                )));
            }

            let deleted: Option<Comment> = self
                .db
                .delete_by_id(Collection::Comments, &id)
                .await
                .map_err(|e| self.abort(root_id, removed, e))?;
            let Some(comment) = deleted else {
                debug!("Comment {} already removed", id);
                continue;
            };

            self.detach(&comment)
                .await
                .map_err(|e| self.abort(root_id, removed, e))?;
            removed += 1;

            stack.extend(comment.children.iter().rev().cloned());
        }

        info!("Removed {} comments under {}", removed, root_id);
        Ok(removed)
    }

    /// 单条评论删除后的引用清理
    async fn detach(&self, comment: &Comment) -> Result<()> {
        if let Some(parent_id) = &comment.parent {
            self.db
                .update_by_id::<Comment>(
                    Collection::Comments,
                    parent_id,
                    &Update::new().pull("children", comment.id.clone()),
                )
                .await?;
        }

        if let Err(e) = self.notifications.delete_for_comment(&comment.id).await {
            warn!("Failed to delete notifications for comment {}: {}", comment.id, e);
        }
        if let Err(e) = self.notifications.unset_reply(&comment.id).await {
            warn!("Failed to unset reply {} on notifications: {}", comment.id, e);
        }

        let blog_update = Update::new()
            .pull("comments", comment.id.clone())
            .merge(ActivityDelta::comment_removed(comment.is_top_level()).to_update());
        self.db
            .update_by_id::<Blog>(Collection::Blogs, &comment.blog_id, &blog_update)
            .await?;
        Ok(())
    }

    fn abort(&self, root_id: &str, removed: u64, cause: AppError) -> AppError {
        error!(
            "Comment subtree deletion under {} aborted after {} removals: {}",
            root_id, removed, cause
        );
        AppError::Fatal(format!(
            "comment subtree deletion under {} aborted after {} removals: {}",
            root_id, removed, cause
        ))
    }

    /// 文章的顶层评论，最新的在前
    pub async fn get_blog_comments(&self, blog_id: &str, skip: u64) -> Result<Vec<CommentView>> {
        let filter = Filter::eq("blog_id", blog_id).with(Filter::eq("isReply", false));
        let comments: Vec<Comment> = fetch_window(
            &self.db,
            Collection::Comments,
            &filter,
            Sort::desc("commentedAt"),
            skip,
            COMMENTS_PAGE_SIZE,
        )
        .await?;
        self.populate(comments).await
    }

    pub async fn count_blog_comments(&self, blog_id: &str) -> Result<u64> {
        let filter = Filter::eq("blog_id", blog_id).with(Filter::eq("isReply", false));
        self.db.count(Collection::Comments, &filter).await
    }

    pub async fn get_replies(&self, comment_id: &str, skip: u64) -> Result<Vec<CommentView>> {
        let exists = self
            .db
            .count(Collection::Comments, &Filter::by_id(comment_id))
            .await?;
        if exists == 0 {
            return Err(AppError::not_found("Comment"));
        }

        let replies: Vec<Comment> = fetch_window(
            &self.db,
            Collection::Comments,
            &Filter::eq("parent", comment_id),
            Sort::desc("commentedAt"),
            skip,
            REPLIES_PAGE_SIZE,
        )
        .await?;
        self.populate(replies).await
    }

    async fn populate(&self, comments: Vec<Comment>) -> Result<Vec<CommentView>> {
        let authors: Vec<String> = comments.iter().map(|c| c.commented_by.clone()).collect();
        let users = self.db.get_many::<User>(Collection::Users, &authors).await?;
        Ok(comments
            .iter()
            .map(|c| c.view(users.get(&c.commented_by).map(User::summary)))
            .collect())
    }

    pub async fn delete_for_blog(&self, blog_id: &str) -> Result<u64> {
        self.db
            .delete_many(Collection::Comments, &Filter::eq("blog_id", blog_id))
            .await
    }

    /// 清理用户相关的全部评论
    ///
    /// 用户文章下的评论整体删除（文章本身由调用方重置或删除）；
    /// 用户在他人文章下的评论逐条按子树删除，保持父评论、文章计数和通知一致。
    pub async fn delete_for_user(&self, user_id: &str) -> Result<u64> {
        let on_own_blogs: Vec<Comment> = self
            .db
            .find(
                Collection::Comments,
                &Filter::eq("blog_author", user_id),
                &FindOptions::default(),
            )
            .await?;
        let own_ids: Vec<String> = on_own_blogs.into_iter().map(|c| c.id).collect();
        let mut removed = self
            .db
            .delete_many(Collection::Comments, &Filter::eq("blog_author", user_id))
            .await?;
        if !own_ids.is_empty() {
            self.notifications.delete_for_comments(&own_ids).await?;
            self.notifications.unset_replies(&own_ids).await?;
        }

        let elsewhere: Vec<Comment> = self
            .db
            .find(
                Collection::Comments,
                &Filter::eq("commented_by", user_id),
                &FindOptions::sorted(Sort::asc("commentedAt")),
            )
            .await?;
        for comment in elsewhere {
            removed += self.delete_subtree(&comment.id).await?;
        }

        debug!("Removed {} comments related to user {}", removed, user_id);
        Ok(removed)
    }
}
