use crate::{
    error::Result,
    models::{AdminDashboard, Blog, DailyCount, TopBlog, TopUser, User, UserDashboard},
    services::{auth::AuthUser, blog::public_filter, Database},
    store::{Collection, Filter, FindOptions, Sort},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// 每日统计保留的天数
pub const DAILY_WINDOW: usize = 10;
pub const TOP_BLOGS_LIMIT: usize = 5;
pub const TOP_USERS_LIMIT: u64 = 5;
pub const USER_TOP_BLOGS_LIMIT: u64 = 3;

#[derive(Deserialize)]
struct JoinedStamp {
    #[serde(rename = "joinedAt")]
    joined_at: String,
}

#[derive(Deserialize)]
struct PublishedStamp {
    #[serde(rename = "publishedAt")]
    published_at: String,
}

/// 按日期前缀（`YYYY-MM-DD`）分组，保留最近 `window` 天，按日期升序
pub fn group_by_day<'a>(stamps: impl IntoIterator<Item = &'a str>, window: usize) -> Vec<DailyCount> {
    let mut days: BTreeMap<&str, u64> = BTreeMap::new();
    for stamp in stamps {
        let day = stamp.get(..10).unwrap_or(stamp);
        *days.entry(day).or_default() += 1;
    }
    let skip = days.len().saturating_sub(window);
    days.into_iter()
        .skip(skip)
        .map(|(date, count)| DailyCount {
            date: date.to_string(),
            count,
        })
        .collect()
}

fn top_blog(blog: &Blog, score: i64) -> TopBlog {
    TopBlog {
        id: blog.id.clone(),
        blog_id: blog.blog_id.clone(),
        title: blog.title.clone(),
        total_reads: blog.activity.total_reads,
        total_likes: blog.activity.total_likes,
        total_comments: blog.activity.total_comments,
        score,
    }
}

/// 只读统计，不修改任何数据
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<Database>,
}

impl AnalyticsService {
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        Ok(Self { db })
    }

    pub async fn registrations_per_day(&self) -> Result<Vec<DailyCount>> {
        let stamps: Vec<JoinedStamp> = self
            .db
            .find(Collection::Users, &Filter::all(), &FindOptions::default())
            .await?;
        Ok(group_by_day(stamps.iter().map(|s| s.joined_at.as_str()), DAILY_WINDOW))
    }

    pub async fn posts_per_day(&self, author: Option<&str>) -> Result<Vec<DailyCount>> {
        let filter = Filter::eq("draft", false)
            .with_opt(author.map(|id| Filter::eq("author", id)));
        let stamps: Vec<PublishedStamp> = self
            .db
            .find(Collection::Blogs, &filter, &FindOptions::default())
            .await?;
        Ok(group_by_day(stamps.iter().map(|s| s.published_at.as_str()), DAILY_WINDOW))
    }

    /// 点赞数与评论数之和最高的公开文章
    pub async fn top_blogs_by_engagement(&self) -> Result<Vec<TopBlog>> {
        let blogs: Vec<Blog> = self
            .db
            .find(Collection::Blogs, &public_filter(), &FindOptions::default())
            .await?;
        let mut ranked: Vec<TopBlog> = blogs
            .iter()
            .map(|b| top_blog(b, b.activity.total_likes + b.activity.total_comments))
            .collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        ranked.truncate(TOP_BLOGS_LIMIT);
        Ok(ranked)
    }

    pub async fn top_users_by_posts(&self) -> Result<Vec<TopUser>> {
        let users: Vec<User> = self
            .db
            .find(
                Collection::Users,
                &Filter::all(),
                &FindOptions::sorted(Sort::desc("account_info.total_posts").with_id_tiebreak())
                    .limit(TOP_USERS_LIMIT),
            )
            .await?;
        Ok(users
            .into_iter()
            .map(|u| TopUser {
                id: u.id,
                username: u.personal_info.username,
                fullname: u.personal_info.fullname,
                profile_img: u.personal_info.profile_img,
                total_posts: u.account_info.total_posts,
                total_reads: u.account_info.total_reads,
            })
            .collect())
    }

    pub async fn user_top_blogs(&self, user_id: &str) -> Result<Vec<TopBlog>> {
        let blogs: Vec<Blog> = self
            .db
            .find(
                Collection::Blogs,
                &Filter::eq("author", user_id).with(Filter::eq("draft", false)),
                &FindOptions::sorted(Sort::desc("activity.total_reads").with_id_tiebreak())
                    .limit(USER_TOP_BLOGS_LIMIT),
            )
            .await?;
        Ok(blogs.iter().map(|b| top_blog(b, b.activity.total_reads)).collect())
    }

    pub async fn admin_dashboard(&self, actor: &AuthUser) -> Result<AdminDashboard> {
        actor.require_admin()?;
        debug!("Building admin dashboard for {}", actor.id);
        let (registrations_per_day, posts_per_day, top_blogs, top_users) = futures::try_join!(
            self.registrations_per_day(),
            self.posts_per_day(None),
            self.top_blogs_by_engagement(),
            self.top_users_by_posts(),
        )?;
        Ok(AdminDashboard {
            registrations_per_day,
            posts_per_day,
            top_blogs,
            top_users,
        })
    }

    pub async fn user_dashboard(&self, user_id: &str) -> Result<UserDashboard> {
        debug!("Building dashboard for {}", user_id);
        let (posts_per_day, top_blogs) = futures::try_join!(
            self.posts_per_day(Some(user_id)),
            self.user_top_blogs(user_id),
        )?;
        Ok(UserDashboard {
            posts_per_day,
            top_blogs,
        })
    }
}
