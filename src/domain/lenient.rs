// ==========================================
// CRM 自动分配系统 - 宽松反序列化
// ==========================================
// 职责: 实体 data 为自由 JSON,类型化视图按宽松口径读取
// 规则:
// - null / 缺失 → 默认值
// - 数值字段接受 JSON 数字或可解析的数字字符串（与条件匹配口径一致）
// ==========================================

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

/// null 视为默认值
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 数字或数字字符串 → f64;null / 空字符串 → 0
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(0.0),
        Some(JsonValue::Number(n)) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("数值超出范围: {}", n))),
        Some(JsonValue::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| D::Error::custom(format!("无法解析为数字: {:?}", s)))
        }
        Some(other) => Err(D::Error::custom(format!("期望数字,实际为: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "lenient_f64")]
        value: f64,
        #[serde(default, deserialize_with = "null_as_default")]
        stage: String,
    }

    fn parse(data: JsonValue) -> Result<Sample, serde_json::Error> {
        serde_json::from_value(data)
    }

    #[test]
    fn test_numbers_and_numeric_strings() {
        assert_eq!(parse(json!({ "value": 1200 })).unwrap().value, 1200.0);
        assert_eq!(parse(json!({ "value": 12.5 })).unwrap().value, 12.5);
        assert_eq!(parse(json!({ "value": " 50000 " })).unwrap().value, 50_000.0);
    }

    #[test]
    fn test_null_missing_and_blank_fall_back_to_default() {
        let parsed = parse(json!({ "value": null, "stage": null })).unwrap();
        assert_eq!(parsed.value, 0.0);
        assert_eq!(parsed.stage, "");

        let parsed = parse(json!({})).unwrap();
        assert_eq!(parsed.value, 0.0);
        assert_eq!(parsed.stage, "");

        assert_eq!(parse(json!({ "value": "  " })).unwrap().value, 0.0);
    }

    #[test]
    fn test_rejects_non_numeric_values() {
        assert!(parse(json!({ "value": "lots" })).is_err());
        assert!(parse(json!({ "value": "NaN" })).is_err());
        assert!(parse(json!({ "value": true })).is_err());
        assert!(parse(json!({ "value": [1] })).is_err());
        assert!(parse(json!({ "stage": 5 })).is_err());
    }
}
