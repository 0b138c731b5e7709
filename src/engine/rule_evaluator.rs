// ==========================================
// CRM 自动分配系统 - 规则评估器
// ==========================================
// 职责: 按优先级顺序匹配活跃规则,产出分配结果
// 红线: 首个命中即返回 (first-match wins),不做最佳匹配
// 红线: 任何内部错误都降级为"未命中",不向调用方传播
// ==========================================

use crate::domain::entity::CrmEntity;
use crate::domain::rule::{AssignmentOutcome, AssignmentRule};
use crate::engine::condition::ConditionMatcher;
use crate::engine::rule_store::RuleStore;
use crate::repository::team_repo::TeamDirectory;
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// RuleEvaluator - 规则评估器
// ==========================================
pub struct RuleEvaluator {
    rules: Arc<RuleStore>,
    team: Arc<dyn TeamDirectory>,
}

impl RuleEvaluator {
    pub fn new(rules: Arc<RuleStore>, team: Arc<dyn TeamDirectory>) -> Self {
        Self { rules, team }
    }

    /// 评估实体,返回首个可用的规则命中结果
    ///
    /// # 返回
    /// - `Some(outcome)`: 规则命中且目标成员当前可用
    /// - `None`: 无规则命中,调用方应转兜底分配
    #[instrument(skip(self, entity), fields(entity_type = %entity.entity_type, entity_id = entity.entity_id))]
    pub fn evaluate(&self, entity: &CrmEntity) -> Option<AssignmentOutcome> {
        let rules = match self.rules.active_rules(entity.entity_type) {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!("读取活跃规则失败,按未命中处理: {}", e);
                return None;
            }
        };

        self.evaluate_with(&rules, entity)
    }

    /// 对给定的规则快照评估（规则须已按评估顺序排列）
    pub fn evaluate_with(
        &self,
        rules: &[AssignmentRule],
        entity: &CrmEntity,
    ) -> Option<AssignmentOutcome> {
        for rule in rules {
            if rule.entity_type != entity.entity_type || !rule.is_active {
                continue;
            }

            for condition in &rule.conditions {
                if !ConditionMatcher::matches(condition, entity) {
                    continue;
                }

                if self.is_member_available(condition.target_member_id) {
                    tracing::info!(
                        rule_id = rule.rule_id,
                        rule_name = %rule.name,
                        assigned_to = condition.target_member_id,
                        "规则命中"
                    );
                    return Some(AssignmentOutcome {
                        assigned_to: condition.target_member_id,
                        reason: rule.reason(),
                        rule_id: Some(rule.rule_id),
                    });
                }

                tracing::debug!(
                    rule_id = rule.rule_id,
                    target = condition.target_member_id,
                    "条件命中但目标成员不可用,继续评估"
                );
            }
        }

        tracing::debug!("无规则命中");
        None
    }

    fn is_member_available(&self, member_id: i64) -> bool {
        match self.team.get_by_id(member_id) {
            Ok(Some(member)) => member.is_available(),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(member_id, "查询成员可用性失败,按不可用处理: {}", e);
                false
            }
        }
    }
}
