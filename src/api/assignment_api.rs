// ==========================================
// CRM 自动分配系统 - 分配 API
// ==========================================
// 职责: 自动分配（规则 → 兜底）、人工分配、批量分配、分配历史查询与导出
// 红线: 每次分配决定都追加一条分配历史;历史只追加
// 红线: 批量分配逐条执行,失败项跳过并报告,已成功项保持提交
// ==========================================

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::lead_api::{score_reasons, LeadApi};
use crate::config::config_manager::ConfigManager;
use crate::domain::assignment::{
    AssignmentRecord, AssignmentStats, BulkAssignFailure, BulkAssignResult,
};
use crate::domain::entity::CrmEntity;
use crate::domain::rule::AssignmentOutcome;
use crate::domain::types::{Actor, AssignmentMethod, EntityType};
use crate::engine::fallback::FallbackAllocator;
use crate::engine::rule_evaluator::RuleEvaluator;
use crate::repository::assignment_history_repo::AssignmentHistoryRepository;
use crate::repository::entity_repo::CrmEntityRepository;
use crate::repository::team_repo::TeamDirectory;

/// 人工/批量分配的原因文本
pub mod assign_reasons {
    pub const MANUAL: &str = "manual";
    pub const MANUAL_UNASSIGN: &str = "manual:unassign";
    pub const BULK: &str = "bulk";
}

// ==========================================
// AssignmentApi - 分配 API
// ==========================================
pub struct AssignmentApi {
    entity_repo: Arc<dyn CrmEntityRepository>,
    history_repo: Arc<AssignmentHistoryRepository>,
    team: Arc<dyn TeamDirectory>,
    evaluator: Arc<RuleEvaluator>,
    fallback: Arc<FallbackAllocator>,
    lead_api: Arc<LeadApi>,
    config: Arc<ConfigManager>,
}

impl AssignmentApi {
    pub fn new(
        entity_repo: Arc<dyn CrmEntityRepository>,
        history_repo: Arc<AssignmentHistoryRepository>,
        team: Arc<dyn TeamDirectory>,
        evaluator: Arc<RuleEvaluator>,
        fallback: Arc<FallbackAllocator>,
        lead_api: Arc<LeadApi>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            entity_repo,
            history_repo,
            team,
            evaluator,
            fallback,
            lead_api,
            config,
        }
    }

    fn load_entity(&self, entity_type: EntityType, entity_id: i64) -> ApiResult<CrmEntity> {
        self.entity_repo
            .find(entity_type, entity_id)?
            .ok_or_else(|| ApiError::NotFound(format!("{}(id={})不存在", entity_type, entity_id)))
    }

    // ==========================================
    // 自动分配
    // ==========================================

    /// 计算分配结果（不落库）: 规则优先,未命中转兜底
    pub fn decide(&self, entity: &CrmEntity) -> Option<AssignmentOutcome> {
        if let Some(outcome) = self.evaluator.evaluate(entity) {
            return Some(outcome);
        }

        let fallback_enabled = self.config.is_fallback_enabled().unwrap_or_else(|e| {
            tracing::warn!("读取兜底开关失败，按启用处理: {}", e);
            true
        });
        if !fallback_enabled {
            tracing::info!(entity_id = entity.entity_id, "兜底分配已关闭");
            return None;
        }

        self.fallback.allocate(entity)
    }

    /// 评估并分配
    ///
    /// # 返回
    /// - `Ok(Some(outcome))`: 已分配并写入分配历史
    /// - `Ok(None)`: 无规则命中且无可用成员,需人工分配
    pub fn evaluate_and_assign(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        actor: &Actor,
    ) -> ApiResult<Option<AssignmentOutcome>> {
        let _perf = crate::perf::PerfGuard::new("api.evaluate_and_assign");

        let entity = self.load_entity(entity_type, entity_id)?;
        self.assign_entity(&entity, actor)
    }

    /// 对已加载的实体执行自动分配
    pub(crate) fn assign_entity(
        &self,
        entity: &CrmEntity,
        actor: &Actor,
    ) -> ApiResult<Option<AssignmentOutcome>> {
        let outcome = match self.decide(entity) {
            Some(outcome) => outcome,
            None => {
                tracing::info!(
                    entity_type = %entity.entity_type,
                    entity_id = entity.entity_id,
                    "{}",
                    crate::i18n::t("assignment.manual_required")
                );
                return Ok(None);
            }
        };

        self.entity_repo.update_assignment(
            entity.entity_type,
            entity.entity_id,
            Some(outcome.assigned_to),
            Some(Utc::now()),
        )?;

        let record = AssignmentRecord::from_outcome(entity.entity_type, entity.entity_id, &outcome, actor);
        self.history_repo.append(&record)?;

        tracing::info!(
            entity_type = %entity.entity_type,
            entity_id = entity.entity_id,
            assigned_to = outcome.assigned_to,
            reason = %outcome.reason,
            "自动分配完成"
        );
        Ok(Some(outcome))
    }

    // ==========================================
    // 人工分配
    // ==========================================

    /// 人工指定（member_id 为 None 表示取消分配）
    ///
    /// 人工分配不校验成员可用性,仅要求成员存在
    pub fn assign_manually(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        member_id: Option<i64>,
        actor: &Actor,
        reason: Option<&str>,
    ) -> ApiResult<AssignmentRecord> {
        self.load_entity(entity_type, entity_id)?;

        if let Some(id) = member_id {
            let member = self
                .team
                .get_by_id(id)?
                .ok_or_else(|| ApiError::NotFound(format!("TeamMember(id={})不存在", id)))?;
            if !member.is_available() {
                tracing::warn!(
                    member_id = id,
                    "{}",
                    crate::i18n::t_with_args("assignment.member_unavailable", &[("member_id", &id.to_string())])
                );
            }
        }

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(match member_id {
                Some(_) => assign_reasons::MANUAL,
                None => assign_reasons::MANUAL_UNASSIGN,
            });

        let assigned_at = member_id.map(|_| Utc::now());
        self.entity_repo
            .update_assignment(entity_type, entity_id, member_id, assigned_at)?;

        let record = AssignmentRecord::new(
            entity_type,
            entity_id,
            member_id,
            actor,
            AssignmentMethod::Manual,
            reason,
        );
        self.history_repo.append(&record)?;

        tracing::info!(
            entity_type = %entity_type,
            entity_id,
            assigned_to = ?member_id,
            actor = %actor,
            "人工分配完成"
        );
        Ok(record)
    }

    /// 批量分配给同一成员
    ///
    /// 逐条执行,非事务;线索在分配后重新评分
    pub fn bulk_assign(
        &self,
        entity_type: EntityType,
        entity_ids: &[i64],
        member_id: i64,
        actor: &Actor,
    ) -> ApiResult<BulkAssignResult> {
        let _perf = crate::perf::PerfGuard::new("api.bulk_assign");

        if self.team.get_by_id(member_id)?.is_none() {
            return Err(ApiError::NotFound(format!("TeamMember(id={})不存在", member_id)));
        }

        let mut result = BulkAssignResult {
            total: entity_ids.len(),
            ..Default::default()
        };

        for &entity_id in entity_ids {
            match self.bulk_assign_one(entity_type, entity_id, member_id, actor) {
                Ok(()) => result.updated += 1,
                Err(e) => {
                    tracing::warn!(entity_type = %entity_type, entity_id, "批量分配跳过: {}", e);
                    result.failures.push(BulkAssignFailure {
                        entity_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            entity_type = %entity_type,
            member_id,
            updated = result.updated,
            total = result.total,
            actor = %actor,
            "批量分配完成"
        );
        Ok(result)
    }

    fn bulk_assign_one(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        member_id: i64,
        actor: &Actor,
    ) -> ApiResult<()> {
        self.entity_repo
            .update_assignment(entity_type, entity_id, Some(member_id), Some(Utc::now()))?;

        let record = AssignmentRecord::new(
            entity_type,
            entity_id,
            Some(member_id),
            actor,
            AssignmentMethod::Bulk,
            assign_reasons::BULK,
        );
        self.history_repo.append(&record)?;

        if entity_type == EntityType::Lead {
            // 分配已提交,评分失败不回滚
            if let Err(e) = self.lead_api.recalculate_score(entity_id, score_reasons::BULK_ASSIGN) {
                tracing::warn!(lead_id = entity_id, "批量分配后重新评分失败: {}", e);
            }
        }
        Ok(())
    }

    // ==========================================
    // 分配历史
    // ==========================================

    /// 实体的分配历史（旧 → 新）
    pub fn history(&self, entity_type: EntityType, entity_id: i64) -> ApiResult<Vec<AssignmentRecord>> {
        self.history_repo
            .find_by_entity(entity_type, entity_id)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }

    /// 实体当前归属（最新一条分配记录）
    pub fn current_assignment(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> ApiResult<Option<AssignmentRecord>> {
        self.history_repo
            .latest_for_entity(entity_type, entity_id)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }

    /// 分配历史汇总统计
    pub fn history_stats(&self) -> ApiResult<AssignmentStats> {
        self.history_repo
            .stats()
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }

    /// 最近的分配记录（新 → 旧）
    pub fn recent_history(&self, limit: usize) -> ApiResult<Vec<AssignmentRecord>> {
        if limit == 0 {
            return Err(ApiError::InvalidInput("limit 必须大于 0".to_string()));
        }
        self.history_repo
            .find_recent(limit)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }

    /// 导出全部分配历史为 CSV
    ///
    /// # 返回
    /// 导出的记录数
    pub fn export_history_csv<W: Write>(&self, writer: W) -> ApiResult<usize> {
        let _perf = crate::perf::PerfGuard::new("api.export_history_csv");

        let records = self
            .history_repo
            .find_all()
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

        let mut wtr = csv::Writer::from_writer(writer);
        for record in &records {
            wtr.serialize(HistoryCsvRow::from(record))
                .map_err(|e| ApiError::InternalError(format!("CSV 写入失败: {}", e)))?;
        }
        wtr.flush()
            .map_err(|e| ApiError::InternalError(format!("CSV 写入失败: {}", e)))?;

        Ok(records.len())
    }
}

/// CSV 导出行（扁平结构）
#[derive(Debug, Serialize)]
struct HistoryCsvRow<'a> {
    record_id: &'a str,
    entity_type: &'static str,
    entity_id: i64,
    assigned_to: Option<i64>,
    assigned_by: &'a str,
    method: &'static str,
    reason: &'a str,
    rule_id: Option<i64>,
    created_at: String,
}

impl<'a> From<&'a AssignmentRecord> for HistoryCsvRow<'a> {
    fn from(r: &'a AssignmentRecord) -> Self {
        Self {
            record_id: &r.record_id,
            entity_type: r.entity_type.to_db_str(),
            entity_id: r.entity_id,
            assigned_to: r.assigned_to,
            assigned_by: &r.assigned_by,
            method: r.method.to_db_str(),
            reason: &r.reason,
            rule_id: r.rule_id,
            created_at: r.created_at.to_rfc3339(),
        }
    }
}
