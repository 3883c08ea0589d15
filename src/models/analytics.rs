use serde::{Deserialize, Serialize};

/// 按天统计的数量，`date` 为 `YYYY-MM-DD`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopBlog {
    #[serde(rename = "_id")]
    pub id: String,
    pub blog_id: String,
    pub title: String,
    pub total_reads: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    /// 排序依据（点赞数 + 评论数，或阅读数）
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub profile_img: String,
    pub total_posts: i64,
    pub total_reads: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub registrations_per_day: Vec<DailyCount>,
    pub posts_per_day: Vec<DailyCount>,
    pub top_blogs: Vec<TopBlog>,
    pub top_users: Vec<TopUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDashboard {
    pub posts_per_day: Vec<DailyCount>,
    pub top_blogs: Vec<TopBlog>,
}
