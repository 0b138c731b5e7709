// ==========================================
// CRM 自动分配系统 - 实体生命周期 API
// ==========================================
// 职责: 实体创建/更新钩子,串联自动分配、线索评分、商机阶段
// 规则:
// - 创建: 落库 → (线索)评分 / (商机)开启首个阶段 → 自动分配
// - 更新: 落库 → (线索)重新评分 / (商机)阶段变化时切换 → 仅未分配实体重新分配
// - 线索/商机数据先按类型化视图校验,校验失败时不落库
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::api::assignment_api::AssignmentApi;
use crate::api::deal_api::DealApi;
use crate::api::error::{ApiError, ApiResult};
use crate::api::lead_api::{score_reasons, LeadApi};
use crate::domain::deal::{Deal, StageHistoryEntry};
use crate::domain::entity::CrmEntity;
use crate::domain::lead::{Lead, LeadScoreState};
use crate::domain::rule::AssignmentOutcome;
use crate::domain::types::{Actor, EntityType};
use crate::repository::entity_repo::CrmEntityRepository;

/// 创建/更新结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityChangeResult {
    pub entity: CrmEntity,
    /// 本次触发的自动分配（None: 未触发或需人工分配）
    pub assignment: Option<AssignmentOutcome>,
    pub score: Option<LeadScoreState>,
    pub stage_history: Option<Vec<StageHistoryEntry>>,
}

// ==========================================
// CrmEntityApi - 实体生命周期 API
// ==========================================
pub struct CrmEntityApi {
    entity_repo: Arc<dyn CrmEntityRepository>,
    assignment_api: Arc<AssignmentApi>,
    lead_api: Arc<LeadApi>,
    deal_api: Arc<DealApi>,
}

impl CrmEntityApi {
    pub fn new(
        entity_repo: Arc<dyn CrmEntityRepository>,
        assignment_api: Arc<AssignmentApi>,
        lead_api: Arc<LeadApi>,
        deal_api: Arc<DealApi>,
    ) -> Self {
        Self {
            entity_repo,
            assignment_api,
            lead_api,
            deal_api,
        }
    }

    fn require_object(data: &JsonValue) -> ApiResult<()> {
        if data.is_object() {
            Ok(())
        } else {
            Err(ApiError::InvalidInput("实体数据必须为 JSON 对象".to_string()))
        }
    }

    /// 线索/商机的 data 必须能解析为类型化视图
    fn validate_typed_view(entity_type: EntityType, entity_id: i64, data: &JsonValue) -> ApiResult<()> {
        let parsed = match entity_type {
            EntityType::Lead => serde_json::from_value::<Lead>(data.clone())
                .map(|_| ())
                .map_err(|e| format!("线索数据格式错误 (id={}): {}", entity_id, e)),
            EntityType::Deal => serde_json::from_value::<Deal>(data.clone())
                .map(|_| ())
                .map_err(|e| format!("商机数据格式错误 (id={}): {}", entity_id, e)),
            EntityType::Contact | EntityType::Task => Ok(()),
        };
        parsed.map_err(|msg| {
            tracing::warn!(entity_type = %entity_type, entity_id, "{}", msg);
            ApiError::InvalidInput(msg)
        })
    }

    fn reload(&self, entity_type: EntityType, entity_id: i64) -> ApiResult<CrmEntity> {
        self.entity_repo
            .find(entity_type, entity_id)?
            .ok_or_else(|| ApiError::NotFound(format!("{}(id={})不存在", entity_type, entity_id)))
    }

    /// 创建实体
    pub fn create(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        data: JsonValue,
        actor: &Actor,
    ) -> ApiResult<EntityChangeResult> {
        Self::require_object(&data)?;
        Self::validate_typed_view(entity_type, entity_id, &data)?;

        let stage = data
            .get("stage")
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        self.entity_repo
            .insert(&CrmEntity::new(entity_type, entity_id, data))?;
        tracing::info!(entity_type = %entity_type, entity_id, actor = %actor, "实体已创建");

        let mut score = None;
        let mut stage_history = None;
        match entity_type {
            EntityType::Lead => {
                score = Some(self.lead_api.recalculate_score(entity_id, score_reasons::CREATED)?);
            }
            EntityType::Deal => {
                if let Some(stage) = stage {
                    stage_history = Some(self.deal_api.transition_stage(entity_id, &stage, actor)?);
                }
            }
            EntityType::Contact | EntityType::Task => {}
        }

        let entity = self.reload(entity_type, entity_id)?;
        let assignment = self.assignment_api.assign_entity(&entity, actor)?;

        Ok(EntityChangeResult {
            entity: self.reload(entity_type, entity_id)?,
            assignment,
            score,
            stage_history,
        })
    }

    /// 更新实体业务字段（整体替换 data）
    pub fn update(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        data: JsonValue,
        actor: &Actor,
    ) -> ApiResult<EntityChangeResult> {
        Self::require_object(&data)?;
        Self::validate_typed_view(entity_type, entity_id, &data)?;
        let existing = self.reload(entity_type, entity_id)?;

        let new_stage = data
            .get("stage")
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        self.entity_repo
            .update_data(entity_type, entity_id, &data, Utc::now())?;
        tracing::info!(entity_type = %entity_type, entity_id, actor = %actor, "实体已更新");

        let mut score = None;
        let mut stage_history = None;
        match entity_type {
            EntityType::Lead => {
                score = Some(self.lead_api.recalculate_score(entity_id, score_reasons::UPDATED)?);
            }
            EntityType::Deal => {
                let current = existing
                    .stage_history
                    .last()
                    .filter(|e| e.is_open())
                    .map(|e| e.stage.as_str());
                if let Some(stage) = new_stage.as_deref().filter(|s| Some(*s) != current) {
                    stage_history = Some(self.deal_api.transition_stage(entity_id, stage, actor)?);
                }
            }
            EntityType::Contact | EntityType::Task => {}
        }

        let entity = self.reload(entity_type, entity_id)?;
        let assignment = if entity.assigned_to.is_none() {
            self.assignment_api.assign_entity(&entity, actor)?
        } else {
            None
        };

        Ok(EntityChangeResult {
            entity: self.reload(entity_type, entity_id)?,
            assignment,
            score,
            stage_history,
        })
    }

    /// 设置实体是否计入负载（关闭/归档）
    pub fn set_active(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        is_active: bool,
        actor: &Actor,
    ) -> ApiResult<()> {
        self.entity_repo.set_active(entity_type, entity_id, is_active)?;
        tracing::info!(entity_type = %entity_type, entity_id, is_active, actor = %actor, "实体活跃状态已更新");
        Ok(())
    }

    pub fn get(&self, entity_type: EntityType, entity_id: i64) -> ApiResult<CrmEntity> {
        self.reload(entity_type, entity_id)
    }
}
