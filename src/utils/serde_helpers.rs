/// 时间戳序列化辅助模块

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// 固定宽度的 RFC 3339 UTC 时间戳（微秒精度，`Z` 结尾）
///
/// 所有存储中的时间字段都使用这种格式，字符串顺序与时间顺序一致，
/// 排序和范围查询可以直接在字符串上进行。
pub mod timestamp {
    use super::*;

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// 当前时间，按存储精度截断
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::parse_from_rfc3339(&timestamp::format(&now))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}
