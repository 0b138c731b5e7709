// ==========================================
// CRM 自动分配系统 - 行映射辅助函数
// ==========================================
// 时间统一以 RFC3339 文本存储
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};

/// 时间 → 存储文本
pub fn ts_to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// 存储文本 → 时间
pub fn ts_from_db(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("无法解析时间 '{}': {}", raw, e),
        })
}

/// 可空存储文本 → 可空时间
pub fn opt_ts_from_db(field: &str, raw: Option<String>) -> RepositoryResult<Option<DateTime<Utc>>> {
    raw.map(|s| ts_from_db(field, &s)).transpose()
}
