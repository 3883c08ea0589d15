use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Surreal,
    Memory,
}

impl std::str::FromStr for DatabaseBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "surreal" | "surrealdb" => Ok(Self::Surreal),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unknown database backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_backend: DatabaseBackend,
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub jwt_secret: String,
    pub email_token_secret: String,
    pub jwt_expiry_hours: i64,
    pub email_token_expiry_hours: i64,
    pub google_allowed_domain: String,
    pub google_tokeninfo_url: String,

    // Email configuration
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from_email: String,

    // Frontend URLs
    pub frontend_url: String,

    // Content settings
    pub max_bio_length: usize,
    pub max_description_length: usize,
    pub max_tags: usize,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "campus_blog=debug,tower_http=debug".to_string()),

            database_backend: env::var("DATABASE_BACKEND")
                .unwrap_or_else(|_| "surreal".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "campus".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "blog".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            email_token_secret: env::var("EMAIL_TOKEN_SECRET")
                .map_err(|_| anyhow::anyhow!("EMAIL_TOKEN_SECRET must be set"))?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "168".to_string())
                .parse()?,
            email_token_expiry_hours: env::var("EMAIL_TOKEN_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,
            google_allowed_domain: env::var("GOOGLE_ALLOWED_DOMAIN")
                .unwrap_or_else(|_| "@poljan.ac.id".to_string()),
            google_tokeninfo_url: env::var("GOOGLE_TOKENINFO_URL")
                .unwrap_or_else(|_| "https://oauth2.googleapis.com/tokeninfo".to_string()),

            smtp_host: env::var("SMTP_HOST").ok(),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()?,
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            smtp_from_email: env::var("SMTP_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@campus-blog.local".to_string()),

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            max_bio_length: env::var("MAX_BIO_LENGTH")
                .unwrap_or_else(|_| "150".to_string())
                .parse()?,
            max_description_length: env::var("MAX_DESCRIPTION_LENGTH")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,
            max_tags: env::var("MAX_TAGS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 邮件验证链接
    pub fn verification_url(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={}",
            self.frontend_url.trim_end_matches('/'),
            urlencoding::encode(token)
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            database_backend: DatabaseBackend::Memory,
            database_url: "http://localhost:8000".to_string(),
            database_namespace: "campus".to_string(),
            database_name: "blog".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            jwt_secret: "test-jwt-secret".to_string(),
            email_token_secret: "test-email-secret".to_string(),
            jwt_expiry_hours: 168,
            email_token_expiry_hours: 24,
            google_allowed_domain: "@poljan.ac.id".to_string(),
            google_tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            smtp_host: None,
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_from_email: "noreply@campus-blog.local".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            max_bio_length: 150,
            max_description_length: 200,
            max_tags: 10,
            cors_allowed_origins: "http://localhost:5173".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<DatabaseBackend>().unwrap(), DatabaseBackend::Memory);
        assert_eq!("surrealdb".parse::<DatabaseBackend>().unwrap(), DatabaseBackend::Surreal);
        assert!("mongo".parse::<DatabaseBackend>().is_err());
    }

    #[test]
    fn verification_url_encodes_token() {
        let config = Config::default();
        assert_eq!(
            config.verification_url("a b"),
            "http://localhost:5173/verify-email?token=a%20b"
        );
    }
}
