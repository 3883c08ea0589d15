use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_blog::{build_router, config::Config, services::Database, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    // 初始化日志，生产环境输出 JSON
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Campus Blog service...");

    // 初始化数据库连接
    let db = Arc::new(match Database::new(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    });
    if let Err(e) = db.verify_connection().await {
        error!("Database connection failed: {}", e);
        return Err(anyhow::anyhow!("Database connection failed"));
    }
    info!("Database connection established successfully");

    // 创建应用状态
    let app_state = Arc::new(AppState::new(config.clone(), db).await?);

    let app = build_router(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
