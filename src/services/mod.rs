pub mod analytics;
pub mod auth;
pub mod blog;
pub mod comment;
pub mod counters;
pub mod database;
pub mod mailer;
pub mod moderation;
pub mod notification;
pub mod pagination;
pub mod user;

// 重新导出常用类型
pub use analytics::AnalyticsService;
pub use auth::{AuthService, AuthUser};
pub use blog::BlogService;
pub use comment::CommentService;
pub use database::Database;
pub use moderation::{CascadeReport, ModerationService};
pub use notification::NotificationService;
pub use user::UserService;
