// ==========================================
// CRM 自动分配系统 - 条件匹配器
// ==========================================
// 职责: 单个条件对实体字段的匹配判定
// 红线: 匹配失败一律返回 false,不向上抛错
// ==========================================
// 运算符语义:
// - equals / not_equals: 精确值相等
// - contains: 字段值字符串化后大小写不敏感子串匹配
// - greater_than / less_than: 双方解析为数字,解析失败即不匹配
// - between: 闭区间
// - in: 列表成员
// ==========================================

use crate::domain::entity::CrmEntity;
use crate::domain::rule::{Condition, ConditionValue};
use crate::domain::types::ConditionOperator;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// 条件评估内部故障（仅用于日志,调用方视为不匹配）
#[derive(Debug, Error, PartialEq)]
pub(crate) enum ConditionFault {
    #[error("运算符 {operator} 与比较值形状不匹配")]
    ShapeMismatch { operator: ConditionOperator },

    #[error("无法解析为数字: {0}")]
    NotNumeric(String),
}

// ==========================================
// ConditionMatcher - 条件匹配器
// ==========================================
pub struct ConditionMatcher;

impl ConditionMatcher {
    /// 判定实体是否满足条件
    ///
    /// 字段缺失按 null 处理
    pub fn matches(condition: &Condition, entity: &CrmEntity) -> bool {
        let field_value = entity.field(&condition.field).unwrap_or(&JsonValue::Null);
        match Self::try_match(condition.operator, &condition.value, field_value) {
            Ok(matched) => matched,
            Err(ConditionFault::NotNumeric(raw)) => {
                tracing::debug!(
                    field = %condition.field,
                    operator = %condition.operator,
                    "数值比较跳过: {}",
                    raw
                );
                false
            }
            Err(fault) => {
                tracing::warn!(
                    field = %condition.field,
                    entity_type = %entity.entity_type,
                    entity_id = entity.entity_id,
                    "条件评估失败,按不匹配处理: {}",
                    fault
                );
                false
            }
        }
    }

    pub(crate) fn try_match(
        operator: ConditionOperator,
        expected: &ConditionValue,
        actual: &JsonValue,
    ) -> Result<bool, ConditionFault> {
        match (operator, expected) {
            (ConditionOperator::Equals, ConditionValue::Scalar(v)) => Ok(actual == v),
            (ConditionOperator::NotEquals, ConditionValue::Scalar(v)) => Ok(actual != v),
            (ConditionOperator::Contains, ConditionValue::Scalar(v)) => {
                let haystack = stringify(actual).to_lowercase();
                let needle = stringify(v).to_lowercase();
                Ok(haystack.contains(&needle))
            }
            (ConditionOperator::GreaterThan, ConditionValue::Scalar(v)) => {
                Ok(as_number(actual)? > as_number(v)?)
            }
            (ConditionOperator::LessThan, ConditionValue::Scalar(v)) => {
                Ok(as_number(actual)? < as_number(v)?)
            }
            (ConditionOperator::Between, ConditionValue::Range(low, high)) => {
                let n = as_number(actual)?;
                Ok(n >= as_number(low)? && n <= as_number(high)?)
            }
            (ConditionOperator::In, ConditionValue::List(items)) => {
                Ok(items.iter().any(|item| item == actual))
            }
            (operator, _) => Err(ConditionFault::ShapeMismatch { operator }),
        }
    }
}

/// 字段值字符串化（字符串不带引号,null 为空串）
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// 数字或数字字符串 → f64
fn as_number(value: &JsonValue) -> Result<f64, ConditionFault> {
    match value {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| ConditionFault::NotNumeric(n.to_string())),
        JsonValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| ConditionFault::NotNumeric(s.clone())),
        other => Err(ConditionFault::NotNumeric(other.to_string())),
    }
}
