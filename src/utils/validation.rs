use crate::error::{AppError, Result};
use crate::models::SocialLinks;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+([\.-]?\w+)*@\w+([\.-]?\w+)*(\.\w{2,3})+$").unwrap()
});

/// 学号格式
static NIM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^213051\d{3}$").unwrap());

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 20;

pub fn validate_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// 验证邮箱并返回详细错误信息
pub fn validate_email_format(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(AppError::validation("Enter an email"));
    }
    if !validate_email(email) {
        return Err(AppError::validation("Email is invalid"));
    }
    Ok(())
}

pub fn validate_nim(nim: &str) -> Result<()> {
    if nim.trim().is_empty() {
        return Err(AppError::validation("Enter a student number"));
    }
    if !NIM_REGEX.is_match(nim) {
        return Err(AppError::validation("Student number is not registered"));
    }
    Ok(())
}

/// 6 到 20 个字符，至少包含一个数字、一个小写字母和一个大写字母
pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len)
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
}

pub fn validate_password(password: &str) -> Result<()> {
    if !is_valid_password(password) {
        return Err(AppError::validation(
            "Password should be 6 to 20 characters long with a numeric, 1 lowercase and 1 uppercase letters",
        ));
    }
    Ok(())
}

/// 验证用户名格式
pub fn validate_username(username: &str) -> Result<()> {
    if username.chars().count() < 3 {
        return Err(AppError::validation("Username should be at least 3 letters long"));
    }
    Ok(())
}

pub fn validate_bio(bio: &str, limit: usize) -> Result<()> {
    if bio.chars().count() > limit {
        return Err(AppError::Validation(format!(
            "Bio should not be more than {} characters",
            limit
        )));
    }
    Ok(())
}

/// 社交链接必须是完整 URL，且主机名包含 `<网络名>.com`（个人网站除外）
pub fn validate_social_links(links: &SocialLinks) -> Result<()> {
    for (network, link) in links.entries() {
        if link.is_empty() {
            continue;
        }
        let parsed = url::Url::parse(link).map_err(|_| {
            AppError::Validation(format!(
                "The {} link must be a full link including http(s)",
                network
            ))
        })?;
        let host = parsed.host_str().unwrap_or_default();
        if network != "website" && !host.contains(&format!("{}.com", network)) {
            return Err(AppError::Validation(format!(
                "{} link is invalid. You must enter a full link",
                network
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("student@poljan.ac.id"));
        assert!(validate_email("first.last@example.com"));

        assert!(!validate_email("invalid-email"));
        assert!(!validate_email("@domain.com"));
        assert!(!validate_email("user@domain.c"));
        assert!(validate_email_format("").is_err());
    }

    #[test]
    fn test_validate_nim() {
        assert!(validate_nim("213051123").is_ok());
        assert!(validate_nim("21305112").is_err());
        assert!(validate_nim("113051123").is_err());
        assert!(validate_nim("").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(is_valid_password("Secret1"));
        assert!(!is_valid_password("secret1"));
        assert!(!is_valid_password("SECRET1"));
        assert!(!is_valid_password("Secret"));
        assert!(!is_valid_password("Se1"));
        assert!(!is_valid_password(&format!("Aa1{}", "x".repeat(18))));
    }

    #[test]
    fn test_username_and_bio() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_bio(&"a".repeat(150), 150).is_ok());
        assert!(validate_bio(&"a".repeat(151), 150).is_err());
    }

    #[test]
    fn test_social_links() {
        let mut links = SocialLinks {
            github: "https://github.com/someone".into(),
            website: "https://my.blog.id".into(),
            ..Default::default()
        };
        assert!(validate_social_links(&links).is_ok());

        links.youtube = "https://example.com/channel".into();
        assert!(validate_social_links(&links).is_err());

        links.youtube = "youtube.com/channel".into();
        assert!(validate_social_links(&links).is_err());
    }
}
