use crate::{
    config::Config,
    error::{AppError, Result},
};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tracing::{error, info};

/// 邮件发送接口：服务端只负责生成验证链接
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, to: &str, verification_url: &str) -> Result<()>;
}

pub fn mailer_from_config(config: &Config) -> Result<Arc<dyn Mailer>> {
    match &config.smtp_host {
        Some(host) => Ok(Arc::new(SmtpMailer::new(config, host)?)),
        None => {
            info!("SMTP_HOST not set, verification links will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &Config, host: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Email(format!("Invalid SMTP relay {}: {}", host, e)))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: config.smtp_from_email.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, verification_url: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.parse::<Mailbox>().map_err(|e| AppError::Email(format!("Invalid sender: {}", e)))?)
            .to(to.parse::<Mailbox>().map_err(|e| AppError::Email(format!("Invalid recipient: {}", e)))?)
            .subject("Email Verification")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Click on the following link to verify your email: {}",
                verification_url
            ))
            .map_err(|e| AppError::Email(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| {
            error!("Failed to send verification email to {}: {}", to, e);
            AppError::Email(e.to_string())
        })?;

        info!("Verification email sent to {}", to);
        Ok(())
    }
}

/// 未配置 SMTP 时使用，只记录日志
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, verification_url: &str) -> Result<()> {
        info!("Verification link for {}: {}", to, verification_url);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        assert!(LogMailer.send_verification("a@poljan.ac.id", "http://x/verify").await.is_ok());
    }

    #[test]
    fn config_without_smtp_uses_log_mailer() {
        assert!(mailer_from_config(&Config::default()).is_ok());
    }
}
