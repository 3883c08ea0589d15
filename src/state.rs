use crate::{
    config::Config,
    error::Result,
    services::{
        analytics::AnalyticsService, auth::AuthService, blog::BlogService,
        comment::CommentService, database::Database, moderation::ModerationService,
        notification::NotificationService, user::UserService,
    },
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 认证服务
    pub auth_service: AuthService,

    /// 文章服务
    pub blog_service: BlogService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// 用户服务
    pub user_service: UserService,

    /// 封禁与删除
    pub moderation_service: ModerationService,

    /// 统计分析服务
    pub analytics_service: AnalyticsService,
}

impl AppState {
    pub async fn new(config: Config, db: Arc<Database>) -> Result<Self> {
        let auth_service = AuthService::new(db.clone(), &config).await?;
        Self::with_auth_service(config, db, auth_service).await
    }

    /// 使用给定的认证服务组装其余服务
    pub async fn with_auth_service(
        config: Config,
        db: Arc<Database>,
        auth_service: AuthService,
    ) -> Result<Self> {
        let notification_service = NotificationService::new(db.clone()).await?;
        let comment_service = CommentService::new(db.clone(), notification_service.clone()).await?;
        let blog_service =
            BlogService::new(db.clone(), notification_service.clone(), &config).await?;
        let user_service = UserService::new(db.clone(), &config).await?;
        let moderation_service = ModerationService::new(
            db.clone(),
            notification_service.clone(),
            comment_service.clone(),
        )
        .await?;
        let analytics_service = AnalyticsService::new(db.clone()).await?;

        Ok(Self {
            config,
            db,
            auth_service,
            blog_service,
            comment_service,
            notification_service,
            user_service,
            moderation_service,
            analytics_service,
        })
    }
}
