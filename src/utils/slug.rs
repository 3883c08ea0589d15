use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

static NON_ALNUM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());
static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// 随机后缀长度
pub const SUFFIX_LEN: usize = 21;

/// 随机字母数字串
pub fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// 从标题生成 slug：非字母数字替换为空格，空白串合并为连字符
pub fn slugify_title(title: &str) -> String {
    let spaced = NON_ALNUM_REGEX.replace_all(title, " ");
    let hyphenated = WHITESPACE_REGEX.replace_all(spaced.trim(), "-");
    hyphenated.into_owned()
}

/// 新文章的 `blog_id`
pub fn generate_blog_id(title: &str) -> String {
    format!("{}{}", slugify_title(title), random_suffix(SUFFIX_LEN))
}

/// 用户名：邮箱本地部分，已被占用时追加随机后缀
pub fn username_from_email(email: &str, taken: bool) -> String {
    let local = email.split('@').next().unwrap_or(email);
    if taken {
        format!("{}{}", local, random_suffix(5))
    } else {
        local.to_string()
    }
}
