// ==========================================
// CRM 自动分配系统 - 分配规则领域模型
// ==========================================
// 职责: 规则 / 条件 / 规则草稿 / 分配结果
// 红线: 规则按 (priority ASC, rule_id ASC) 全序排列
// ==========================================

use crate::domain::types::{ConditionOperator, EntityType, FallbackStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

// ==========================================
// AssignmentRule - 分配规则
// ==========================================
// 对齐: assignment_rule 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub rule_id: i64,
    pub name: String,
    pub entity_type: EntityType,
    pub is_active: bool,
    pub priority: i32, // 越小越先评估
    pub conditions: Vec<Condition>,
    pub fallback_strategy: FallbackStrategy, // 仅持久化,不参与兜底计算
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssignmentRule {
    /// 规则评估顺序: priority 升序,同优先级按 rule_id 升序
    pub fn evaluation_order(a: &AssignmentRule, b: &AssignmentRule) -> Ordering {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    }

    /// 分配原因文本（写入分配历史）
    pub fn reason(&self) -> String {
        format!("rule:{}", self.name)
    }
}

// ==========================================
// Condition - 规则条件
// ==========================================
// 一条规则内的条件按声明顺序评估,每个条件自带目标成员
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: ConditionValue,
    pub target_member_id: i64,
}

/// 条件比较值
///
/// - `Scalar`: equals / not_equals / contains / greater_than / less_than
/// - `Range`: between（闭区间）
/// - `List`: in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConditionValue {
    Scalar(JsonValue),
    Range(JsonValue, JsonValue),
    List(Vec<JsonValue>),
}

impl ConditionValue {
    /// 按运算符将原始 JSON 值整形为比较值
    ///
    /// # 返回
    /// - None: 值的形状与运算符不匹配
    pub fn shape_for(operator: ConditionOperator, raw: &JsonValue) -> Option<Self> {
        match operator {
            ConditionOperator::Between => match raw {
                JsonValue::Array(items) if items.len() == 2 => {
                    Some(ConditionValue::Range(items[0].clone(), items[1].clone()))
                }
                _ => None,
            },
            ConditionOperator::In => match raw {
                JsonValue::Array(items) => Some(ConditionValue::List(items.clone())),
                _ => None,
            },
            _ => match raw {
                JsonValue::Array(_) | JsonValue::Object(_) => None,
                other => Some(ConditionValue::Scalar(other.clone())),
            },
        }
    }
}

// ==========================================
// RuleDraft - 规则草稿（创建/更新入参）
// ==========================================
// 来自调用方的原始输入,所有字段可缺失,由 RuleStore::validate 统一校验
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub conditions: Vec<ConditionDraft>,
    #[serde(default)]
    pub fallback_strategy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionDraft {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<JsonValue>,
    #[serde(default)]
    pub target_member_id: Option<i64>,
}

impl ConditionDraft {
    /// 便捷构造（测试与种子数据使用）
    pub fn new(field: &str, operator: ConditionOperator, value: JsonValue, target: i64) -> Self {
        Self {
            field: Some(field.to_string()),
            operator: Some(operator.as_str().to_string()),
            value: Some(value),
            target_member_id: Some(target),
        }
    }
}

// ==========================================
// AssignmentOutcome - 分配结果
// ==========================================
// rule_id 为 None 表示兜底分配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub assigned_to: i64,
    pub reason: String,
    pub rule_id: Option<i64>,
}
