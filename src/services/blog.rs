use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        Blog, BlogDetail, BlogState, BlogSummary, CreateBlogRequest, GetBlogRequest,
        LikeBlogRequest, ManagedBlogsQuery, NotificationType, SearchBlogsQuery, User,
    },
    services::{
        auth::AuthUser,
        counters::{AccountDelta, ActivityDelta},
        notification::{NewNotification, NotificationService},
        pagination::{
            paginate, paginate_after, Cursor, KeysetPage, Page, PageRequest,
            ADMIN_BLOGS_PAGE_SIZE, FEED_DEFAULT_LIMIT, FEED_MAX_LIMIT, LATEST_BLOGS_PAGE_SIZE,
            SEARCH_BLOGS_PAGE_SIZE, TRENDING_BLOGS_LIMIT, USER_BLOGS_PAGE_SIZE,
        },
        Database,
    },
    store::{Collection, Filter, FindOptions, Sort, SortOrder, Update},
    utils::{
        serde_helpers::{now, timestamp},
        slug::generate_blog_id,
    },
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

/// 公开可见：已发布且未被封禁
pub fn public_filter() -> Filter {
    Filter::eq("draft", false).with(Filter::eq("active", true))
}

#[derive(Clone)]
pub struct BlogService {
    db: Arc<Database>,
    notifications: NotificationService,
    max_description_length: usize,
    max_tags: usize,
}

impl BlogService {
    pub async fn new(db: Arc<Database>, notifications: NotificationService, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            notifications,
            max_description_length: config.max_description_length,
            max_tags: config.max_tags,
        })
    }

    fn validate_publishable(&self, request: &CreateBlogRequest) -> Result<()> {
        let desc_len = request.desc.chars().count();
        if desc_len == 0 || desc_len > self.max_description_length {
            return Err(AppError::Validation(format!(
                "You must provide blog description under {} characters",
                self.max_description_length
            )));
        }
        if request.banner.trim().is_empty() {
            return Err(AppError::validation("You must provide blog banner to publish it"));
        }
        let has_blocks = request
            .content
            .get("blocks")
            .and_then(Value::as_array)
            .map_or(false, |blocks| !blocks.is_empty());
        if !has_blocks {
            return Err(AppError::validation("There must be some blog content to publish it"));
        }
        if request.tags.is_empty() || request.tags.len() > self.max_tags {
            return Err(AppError::Validation(format!(
                "Provide tags in order to publish the blog, maximum {}",
                self.max_tags
            )));
        }
        Ok(())
    }

    /// 创建或更新文章，返回 `blog_id`
    pub async fn create_or_update(&self, author_id: &str, mut request: CreateBlogRequest) -> Result<String> {
        request.validate()?;
        if request.title.trim().is_empty() {
            return Err(AppError::validation("You must provide a title"));
        }
        if !request.draft {
            self.validate_publishable(&request)?;
        }
        request.tags = request.tags.iter().map(|t| t.to_lowercase()).collect();

        match request.id.take() {
            Some(blog_id) => self.update_blog(author_id, &blog_id, request).await,
            None => self.create_blog(author_id, request).await,
        }
    }

    async fn create_blog(&self, author_id: &str, request: CreateBlogRequest) -> Result<String> {
        let published_at = now();
        let blog = Blog {
            id: Uuid::new_v4().to_string(),
            blog_id: generate_blog_id(&request.title),
            title: request.title,
            desc: request.desc,
            banner: request.banner,
            content: request.content,
            tags: request.tags,
            author: author_id.to_string(),
            activity: Default::default(),
            comments: Vec::new(),
            draft: request.draft,
            active: true,
            published_at,
            updated_at: published_at,
        };
        self.db.create(Collection::Blogs, &blog).await?;

        let posts = if blog.draft { 0 } else { 1 };
        let author_update = Update::new()
            .push("blogs", blog.id.clone())
            .merge(AccountDelta::posts(posts).to_update());
        self.db
            .update_by_id::<User>(Collection::Users, author_id, &author_update)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        info!("Blog {} created by {}", blog.blog_id, author_id);
        Ok(blog.blog_id)
    }

    async fn update_blog(&self, author_id: &str, blog_id: &str, request: CreateBlogRequest) -> Result<String> {
        let update = Update::new()
            .set("title", request.title)
            .set("desc", request.desc)
            .set("banner", request.banner)
            .set("content", request.content)
            .set("tags", request.tags)
            .set("draft", request.draft)
            .set("updatedAt", timestamp::format(&now()));

        let previous: Blog = self
            .db
            .update_one(
                Collection::Blogs,
                &Filter::eq("blog_id", blog_id).with(Filter::eq("author", author_id)),
                &update,
            )
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;

        // 草稿与已发布之间切换时同步作者文章数；封禁中的文章已在封禁时扣减过
        let posts = match (previous.active, previous.draft, request.draft) {
            (true, true, false) => 1,
            (true, false, true) => -1,
            _ => 0,
        };
        if posts != 0 {
            AccountDelta::posts(posts).apply(&self.db, author_id).await?;
        }

        info!("Blog {} updated by {}", blog_id, author_id);
        Ok(previous.blog_id)
    }

    pub async fn get_blog(&self, request: GetBlogRequest) -> Result<BlogDetail> {
        let mut blog: Blog = self
            .db
            .find_one(Collection::Blogs, &Filter::eq("blog_id", request.blog_id.as_str()))
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;

        let editing = request.mode.as_deref() == Some("edit");
        if blog.draft && !request.draft {
            return Err(AppError::validation("You can not access draft blogs"));
        }
        if blog.state() == BlogState::Suspended && !editing {
            return Err(AppError::not_found("Blog"));
        }

        if !editing {
            ActivityDelta::reads(1).apply(&self.db, &blog.id).await?;
            AccountDelta::reads(1).apply(&self.db, &blog.author).await?;
            blog.activity.total_reads += 1;
            debug!("Blog {} read, {} reads", blog.blog_id, blog.activity.total_reads);
        }

        let author: Option<User> = self.db.get_by_id(Collection::Users, &blog.author).await?;
        let content = blog.content.clone();
        Ok(BlogDetail {
            blog: blog.summary(author.as_ref().map(User::summary)),
            content,
        })
    }

    /// 点赞或取消点赞，返回当前用户是否已点赞
    pub async fn like(&self, user_id: &str, request: LikeBlogRequest) -> Result<bool> {
        if request.is_liked_by_user {
            let removed = self.notifications.delete_like(&request.id, user_id).await?;
            if removed.is_some() {
                ActivityDelta::likes(-1)
                    .apply(&self.db, &request.id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Blog"))?;
                debug!("Blog {} unliked by {}", request.id, user_id);
            }
            return Ok(false);
        }

        if self.notifications.find_like(&request.id, user_id).await?.is_some() {
            return Ok(true);
        }

        let blog = ActivityDelta::likes(1)
            .apply(&self.db, &request.id)
            .await?
            .ok_or_else(|| AppError::not_found("Blog"))?;
        self.notifications
            .create(NewNotification::new(NotificationType::Like, &blog.id, &blog.author, user_id))
            .await?;
        debug!("Blog {} liked by {}", blog.blog_id, user_id);
        Ok(true)
    }

    pub async fn is_liked(&self, user_id: &str, blog_id: &str) -> Result<bool> {
        Ok(self.notifications.find_like(blog_id, user_id).await?.is_some())
    }

    pub async fn latest(&self, page: Option<u64>) -> Result<Page<BlogSummary>> {
        let page = paginate(
            &self.db,
            Collection::Blogs,
            &public_filter(),
            Sort::desc("publishedAt"),
            PageRequest::from_query(page, LATEST_BLOGS_PAGE_SIZE, None),
        )
        .await?;
        self.with_authors(page).await
    }

    pub async fn latest_count(&self) -> Result<u64> {
        self.db.count(Collection::Blogs, &public_filter()).await
    }

    /// 阅读量、点赞数、发布时间依次降序的前 5 篇
    pub async fn trending(&self) -> Result<Vec<BlogSummary>> {
        let sort = Sort::desc("activity.total_reads")
            .then_desc("activity.total_likes")
            .then_desc("publishedAt")
            .with_id_tiebreak();
        let blogs: Vec<Blog> = self
            .db
            .find(
                Collection::Blogs,
                &public_filter(),
                &FindOptions::sorted(sort).limit(TRENDING_BLOGS_LIMIT),
            )
            .await?;
        self.summaries(blogs).await
    }

    fn search_filter(query: &SearchBlogsQuery) -> Result<Filter> {
        if let Some(tag) = &query.tag {
            let filter = public_filter().with(Filter::contains("tags", tag.to_lowercase()));
            return Ok(filter.with_opt(
                query
                    .eliminate_blog
                    .as_deref()
                    .map(|blog_id| Filter::ne("blog_id", blog_id)),
            ));
        }
        if let Some(text) = &query.query {
            return Ok(public_filter().with(Filter::text_contains("title", text.as_str())));
        }
        if let Some(author) = &query.author {
            return Ok(public_filter().with(Filter::eq("author", author.as_str())));
        }
        Err(AppError::validation("Provide a tag, a query or an author to search"))
    }

    pub async fn search(&self, query: SearchBlogsQuery) -> Result<Page<BlogSummary>> {
        let filter = Self::search_filter(&query)?;
        let max_limit = query.limit.filter(|l| *l > 0).unwrap_or(SEARCH_BLOGS_PAGE_SIZE);
        let page = paginate(
            &self.db,
            Collection::Blogs,
            &filter,
            Sort::desc("publishedAt"),
            PageRequest::from_query(query.page, max_limit, None),
        )
        .await?;
        self.with_authors(page).await
    }

    pub async fn search_count(&self, query: &SearchBlogsQuery) -> Result<u64> {
        self.db
            .count(Collection::Blogs, &Self::search_filter(query)?)
            .await
    }

    fn managed_filter(base: Filter, query: &ManagedBlogsQuery) -> Filter {
        base.with_opt(query.draft.map(|draft| Filter::eq("draft", draft)))
            .with_opt(query.active.map(|active| Filter::eq("active", active)))
            .with_opt(
                query
                    .query
                    .as_deref()
                    .filter(|q| !q.is_empty())
                    .map(|q| Filter::text_contains("title", q)),
            )
    }

    /// 当前用户自己的文章（管理后台）
    pub async fn user_blogs(&self, user_id: &str, query: &ManagedBlogsQuery) -> Result<Page<BlogSummary>> {
        let filter = Self::managed_filter(Filter::eq("author", user_id), query);
        let page = paginate(
            &self.db,
            Collection::Blogs,
            &filter,
            Sort::desc("publishedAt"),
            PageRequest::from_query(query.page, USER_BLOGS_PAGE_SIZE, query.deleted_doc_count),
        )
        .await?;
        self.with_authors(page).await
    }

    pub async fn user_blogs_count(&self, user_id: &str, query: &ManagedBlogsQuery) -> Result<u64> {
        let filter = Self::managed_filter(Filter::eq("author", user_id), query);
        self.db.count(Collection::Blogs, &filter).await
    }

    pub async fn admin_blogs(&self, actor: &AuthUser, query: &ManagedBlogsQuery) -> Result<Page<BlogSummary>> {
        actor.require_admin()?;
        let filter = Self::managed_filter(Filter::all(), query);
        let page = paginate(
            &self.db,
            Collection::Blogs,
            &filter,
            Sort::desc("activity.total_likes").then_desc("activity.total_reads"),
            PageRequest::from_query(query.page, ADMIN_BLOGS_PAGE_SIZE, query.deleted_doc_count),
        )
        .await?;
        self.with_authors(page).await
    }

    pub async fn admin_blogs_count(&self, actor: &AuthUser, query: &ManagedBlogsQuery) -> Result<u64> {
        actor.require_admin()?;
        let filter = Self::managed_filter(Filter::all(), query);
        self.db.count(Collection::Blogs, &filter).await
    }

    /// 基于游标的最新文章流
    pub async fn feed(&self, after: Option<&str>, limit: Option<u64>) -> Result<KeysetPage<BlogSummary>> {
        let cursor = after.map(Cursor::decode).transpose()?;
        let limit = limit.unwrap_or(FEED_DEFAULT_LIMIT).clamp(1, FEED_MAX_LIMIT);
        let page: KeysetPage<Blog> = paginate_after(
            &self.db,
            Collection::Blogs,
            &public_filter(),
            "publishedAt",
            SortOrder::Desc,
            cursor.as_ref(),
            limit,
        )
        .await?;
        Ok(KeysetPage {
            results: self.summaries(page.results).await?,
            next_cursor: page.next_cursor,
        })
    }

    async fn summaries(&self, blogs: Vec<Blog>) -> Result<Vec<BlogSummary>> {
        let author_ids: Vec<String> = blogs.iter().map(|b| b.author.clone()).collect();
        let authors = self.db.get_many::<User>(Collection::Users, &author_ids).await?;
        Ok(blogs
            .iter()
            .map(|b| b.summary(authors.get(&b.author).map(User::summary)))
            .collect())
    }

    async fn with_authors(&self, page: Page<Blog>) -> Result<Page<BlogSummary>> {
        let author_ids: Vec<String> = page.results.iter().map(|b| b.author.clone()).collect();
        let authors = self.db.get_many::<User>(Collection::Users, &author_ids).await?;
        Ok(page.map(|b| b.summary(authors.get(&b.author).map(User::summary))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn service() -> (BlogService, Arc<Database>) {
        let db = Arc::new(Database::in_memory());
        let notifications = NotificationService::new(db.clone()).await.unwrap();
        let blogs = BlogService::new(db.clone(), notifications, &Config::default())
            .await
            .unwrap();
        (blogs, db)
    }

    fn published(title: &str) -> CreateBlogRequest {
        CreateBlogRequest {
            id: None,
            title: title.to_string(),
            desc: "A short description".to_string(),
            banner: "https://cdn/banner.png".to_string(),
            content: json!({ "blocks": [{ "type": "paragraph" }] }),
            tags: vec!["Rust".to_string()],
            draft: false,
        }
    }

    #[tokio::test]
    async fn publishing_requires_content_and_tags() {
        let (blogs, _) = service().await;
        let mut request = published("Empty");
        request.content = json!({ "blocks": [] });
        assert!(matches!(
            blogs.create_or_update("u1", request).await,
            Err(AppError::Validation(_))
        ));

        let mut request = published("Tagless");
        request.tags.clear();
        assert!(matches!(
            blogs.create_or_update("u1", request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn search_without_criteria_is_rejected() {
        assert!(BlogService::search_filter(&SearchBlogsQuery::default()).is_err());
        let by_tag = SearchBlogsQuery {
            tag: Some("rust".into()),
            ..Default::default()
        };
        assert!(BlogService::search_filter(&by_tag).is_ok());
    }

    #[tokio::test]
    async fn unknown_blog_is_not_found() {
        let (blogs, _) = service().await;
        let request = GetBlogRequest {
            blog_id: "missing".into(),
            ..Default::default()
        };
        assert!(matches!(blogs.get_blog(request).await, Err(AppError::NotFound(_))));
    }
}
