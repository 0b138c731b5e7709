// ==========================================
// CRM 自动分配系统 - 分配规则 API
// ==========================================
// 职责: 规则增删改查、启停、校验
// 红线: 校验失败返回完整错误列表,不做部分写入
// ==========================================

use std::sync::Arc;

use chrono::Utc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::rule::{AssignmentRule, RuleDraft};
use crate::domain::types::{Actor, EntityType};
use crate::engine::rule_store::RuleStore;

// ==========================================
// RuleApi - 分配规则 API
// ==========================================
pub struct RuleApi {
    store: Arc<RuleStore>,
}

impl RuleApi {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store }
    }

    /// 校验规则草稿（空列表表示合法）
    pub fn validate(&self, draft: &RuleDraft) -> Vec<String> {
        RuleStore::validate(draft)
    }

    /// 创建规则
    ///
    /// 未指定优先级时排在该实体类型现有规则之后
    pub fn create(&self, draft: &RuleDraft, actor: &Actor) -> ApiResult<AssignmentRule> {
        let validated = RuleStore::compile(draft).map_err(ApiError::ValidationError)?;

        let priority = match validated.priority {
            Some(p) => p,
            None => self.store.next_priority(validated.entity_type)?,
        };

        let now = Utc::now();
        let mut rule = AssignmentRule {
            rule_id: 0,
            name: validated.name,
            entity_type: validated.entity_type,
            is_active: validated.is_active,
            priority,
            conditions: validated.conditions,
            fallback_strategy: validated.fallback_strategy,
            created_by: actor.to_string(),
            created_at: now,
            updated_at: now,
        };

        rule.rule_id = self.store.repository().insert(&rule)?;

        tracing::info!(
            rule_id = rule.rule_id,
            name = %rule.name,
            entity_type = %rule.entity_type,
            priority = rule.priority,
            actor = %actor,
            "创建分配规则"
        );
        Ok(rule)
    }

    /// 更新规则（整体替换内容,保留创建人与创建时间）
    pub fn update(&self, rule_id: i64, draft: &RuleDraft, actor: &Actor) -> ApiResult<AssignmentRule> {
        let existing = self.get(rule_id)?;
        let validated = RuleStore::compile(draft).map_err(ApiError::ValidationError)?;

        let rule = AssignmentRule {
            rule_id,
            name: validated.name,
            entity_type: validated.entity_type,
            is_active: validated.is_active,
            priority: validated.priority.unwrap_or(existing.priority),
            conditions: validated.conditions,
            fallback_strategy: validated.fallback_strategy,
            created_by: existing.created_by,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        self.store.repository().update(&rule)?;

        tracing::info!(rule_id, actor = %actor, "更新分配规则");
        Ok(rule)
    }

    /// 删除规则
    pub fn delete(&self, rule_id: i64, actor: &Actor) -> ApiResult<()> {
        self.store.repository().delete(rule_id)?;
        tracing::info!(rule_id, actor = %actor, "删除分配规则");
        Ok(())
    }

    /// 切换启用状态
    ///
    /// # 返回
    /// 切换后的 is_active
    pub fn toggle_active(&self, rule_id: i64, actor: &Actor) -> ApiResult<bool> {
        let rule = self.get(rule_id)?;
        let is_active = !rule.is_active;
        self.store
            .repository()
            .set_active(rule_id, is_active, Utc::now())?;
        tracing::info!(rule_id, is_active, actor = %actor, "切换规则启用状态");
        Ok(is_active)
    }

    /// 查询规则列表（priority ASC, rule_id ASC）
    pub fn list(&self, entity_type: Option<EntityType>) -> ApiResult<Vec<AssignmentRule>> {
        self.store
            .repository()
            .list(entity_type)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }

    /// 查询单条规则
    pub fn get(&self, rule_id: i64) -> ApiResult<AssignmentRule> {
        self.store
            .repository()
            .find_by_id(rule_id)?
            .ok_or_else(|| ApiError::NotFound(format!("AssignmentRule(id={})不存在", rule_id)))
    }
}
