// ==========================================
// CRM 自动分配系统 - 规则存储与校验
// ==========================================
// 职责: 规则草稿校验、草稿 → 规则转换、按优先级排序的活跃规则快照
// 红线: 校验失败时返回完整错误列表,不做任何部分写入
// ==========================================

use crate::domain::rule::{AssignmentRule, Condition, ConditionDraft, ConditionValue, RuleDraft};
use crate::domain::types::{ConditionOperator, EntityType, FallbackStrategy};
use crate::i18n::{t, t_with_args};
use crate::repository::error::RepositoryResult;
use crate::repository::rule_repo::RuleRepository;
use std::sync::Arc;

/// 校验通过的规则内容（尚未分配 rule_id）
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRule {
    pub name: String,
    pub entity_type: EntityType,
    pub is_active: bool,
    pub priority: Option<i32>, // None = 排到该实体类型末尾
    pub conditions: Vec<Condition>,
    pub fallback_strategy: FallbackStrategy,
}

// ==========================================
// RuleStore - 规则存储
// ==========================================
pub struct RuleStore {
    repo: Arc<dyn RuleRepository>,
}

impl RuleStore {
    pub fn new(repo: Arc<dyn RuleRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn RuleRepository> {
        &self.repo
    }

    /// 活跃规则快照（priority ASC, rule_id ASC）
    ///
    /// 单条 SQL 读取,保证一次评估看到一致的规则集合
    pub fn active_rules(&self, entity_type: EntityType) -> RepositoryResult<Vec<AssignmentRule>> {
        let mut rules = self.repo.list_active(entity_type)?;
        rules.sort_by(AssignmentRule::evaluation_order);
        Ok(rules)
    }

    /// 新规则的默认优先级: 当前最大值 + 1
    pub fn next_priority(&self, entity_type: EntityType) -> RepositoryResult<i32> {
        Ok(self
            .repo
            .max_priority(entity_type)?
            .map(|p| p.saturating_add(1))
            .unwrap_or(1))
    }

    // ==========================================
    // 校验
    // ==========================================

    /// 校验规则草稿
    ///
    /// # 返回
    /// 错误消息列表,空列表表示合法
    pub fn validate(draft: &RuleDraft) -> Vec<String> {
        match Self::compile(draft) {
            Ok(_) => Vec::new(),
            Err(errors) => errors,
        }
    }

    /// 校验并转换规则草稿
    pub fn compile(draft: &RuleDraft) -> Result<ValidatedRule, Vec<String>> {
        let mut errors = Vec::new();

        let name = draft
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if name.is_none() {
            errors.push(t("rule.validation.name_required"));
        }

        let entity_type = match draft.entity_type.as_deref() {
            None => {
                errors.push(t("rule.validation.entity_type_required"));
                None
            }
            Some(raw) => {
                let parsed = EntityType::parse(raw);
                if parsed.is_none() {
                    errors.push(t_with_args("rule.validation.entity_type_invalid", &[("value", raw)]));
                }
                parsed
            }
        };

        if draft.conditions.is_empty() {
            errors.push(t("rule.validation.conditions_empty"));
        }

        let mut conditions = Vec::with_capacity(draft.conditions.len());
        for (idx, cond) in draft.conditions.iter().enumerate() {
            if let Some(c) = Self::compile_condition(idx + 1, cond, &mut errors) {
                conditions.push(c);
            }
        }

        let fallback_strategy = match draft.fallback_strategy.as_deref() {
            None => FallbackStrategy::default(),
            Some(raw) => FallbackStrategy::parse(raw).unwrap_or_else(|| {
                errors.push(t_with_args(
                    "rule.validation.fallback_strategy_invalid",
                    &[("value", raw)],
                ));
                FallbackStrategy::default()
            }),
        };

        match (name, entity_type) {
            (Some(name), Some(entity_type)) if errors.is_empty() => Ok(ValidatedRule {
                name: name.to_string(),
                entity_type,
                is_active: draft.is_active.unwrap_or(true),
                priority: draft.priority,
                conditions,
                fallback_strategy,
            }),
            _ => Err(errors),
        }
    }

    fn compile_condition(
        index: usize,
        draft: &ConditionDraft,
        errors: &mut Vec<String>,
    ) -> Option<Condition> {
        let idx = index.to_string();
        let before = errors.len();

        let field = draft
            .field
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());
        if field.is_none() {
            errors.push(t_with_args("rule.validation.condition_field_required", &[("index", &idx)]));
        }

        let operator = match draft.operator.as_deref() {
            None => {
                errors.push(t_with_args(
                    "rule.validation.condition_operator_required",
                    &[("index", &idx)],
                ));
                None
            }
            Some(raw) => {
                let parsed = ConditionOperator::parse(raw);
                if parsed.is_none() {
                    errors.push(t_with_args(
                        "rule.validation.condition_operator_invalid",
                        &[("index", &idx), ("value", raw)],
                    ));
                }
                parsed
            }
        };

        let raw_value = draft.value.as_ref().filter(|v| !v.is_null());
        if raw_value.is_none() {
            errors.push(t_with_args("rule.validation.condition_value_required", &[("index", &idx)]));
        }

        let value = match (operator, raw_value) {
            (Some(op), Some(raw)) => {
                let shaped = ConditionValue::shape_for(op, raw);
                if shaped.is_none() {
                    errors.push(t_with_args(
                        "rule.validation.condition_value_shape",
                        &[("index", &idx), ("operator", op.as_str())],
                    ));
                }
                shaped
            }
            _ => None,
        };

        if draft.target_member_id.is_none() {
            errors.push(t_with_args("rule.validation.condition_target_required", &[("index", &idx)]));
        }

        if errors.len() > before {
            return None;
        }

        Some(Condition {
            field: field?.to_string(),
            operator: operator?,
            value: value?,
            target_member_id: draft.target_member_id?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::rule_repo::SqliteRuleRepository;
    use serde_json::json;
    use std::sync::Mutex;

    fn valid_draft() -> RuleDraft {
        RuleDraft {
            name: Some("Web leads".to_string()),
            entity_type: Some("lead".to_string()),
            is_active: None,
            priority: Some(3),
            conditions: vec![ConditionDraft::new(
                "source",
                ConditionOperator::Equals,
                json!("website"),
                2,
            )],
            fallback_strategy: None,
        }
    }

    #[test]
    fn test_valid_draft_compiles() {
        let rule = RuleStore::compile(&valid_draft()).unwrap();
        assert_eq!(rule.name, "Web leads");
        assert_eq!(rule.entity_type, EntityType::Lead);
        assert!(rule.is_active);
        assert_eq!(rule.priority, Some(3));
        assert_eq!(rule.fallback_strategy, FallbackStrategy::LeastWorkload);
        assert_eq!(rule.conditions[0].target_member_id, 2);
        assert!(RuleStore::validate(&valid_draft()).is_empty());
    }

    #[test]
    fn test_collects_every_error() {
        let draft = RuleDraft {
            name: Some("   ".to_string()),
            entity_type: Some("opportunity".to_string()),
            conditions: vec![],
            ..Default::default()
        };
        let errors = RuleStore::validate(&draft);
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_condition_errors_each_reported() {
        let mut draft = valid_draft();
        draft.conditions = vec![
            ConditionDraft::default(),
            ConditionDraft::new("value", ConditionOperator::Between, json!(5), 1),
        ];
        let errors = RuleStore::validate(&draft);
        // 条件1: field/operator/value/target 各一条; 条件2: 形状错误
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_unknown_operator_and_strategy_rejected() {
        let mut draft = valid_draft();
        draft.conditions[0].operator = Some("regex".to_string());
        draft.fallback_strategy = Some("random".to_string());
        assert_eq!(RuleStore::validate(&draft).len(), 2);
    }

    #[test]
    fn test_named_strategies_accepted() {
        for name in ["round_robin", "least_workload", "availability_based", "expertise_based"] {
            let mut draft = valid_draft();
            draft.fallback_strategy = Some(name.to_string());
            assert!(RuleStore::validate(&draft).is_empty(), "{}", name);
        }
    }

    #[test]
    fn test_next_priority_defaults() {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()));
        let store = RuleStore::new(Arc::new(SqliteRuleRepository::new(conn)));
        assert_eq!(store.next_priority(EntityType::Deal).unwrap(), 1);
    }
}
