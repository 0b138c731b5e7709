// ==========================================
// CRM 自动分配系统 - 线索评分 API
// ==========================================
// 职责: 单条/全量线索重新评分,回写评分字段
// 说明: 每次计算都从 config_kv 读取评分参数,配置变更即时生效
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::config::scoring_profile::ScoringProfile;
use crate::domain::entity::CrmEntity;
use crate::domain::lead::{Lead, LeadScoreState};
use crate::domain::types::EntityType;
use crate::engine::scoring::LeadScoringEngine;
use crate::repository::entity_repo::CrmEntityRepository;

/// 评分原因
pub mod score_reasons {
    pub const CREATED: &str = "lead_created";
    pub const UPDATED: &str = "lead_updated";
    pub const BULK_ASSIGN: &str = "bulk_assign";
    pub const RECALCULATE: &str = "recalculate";
}

// ==========================================
// LeadApi - 线索评分 API
// ==========================================
pub struct LeadApi {
    entity_repo: Arc<dyn CrmEntityRepository>,
    config: Arc<ConfigManager>,
}

impl LeadApi {
    pub fn new(entity_repo: Arc<dyn CrmEntityRepository>, config: Arc<ConfigManager>) -> Self {
        Self { entity_repo, config }
    }

    fn engine(&self) -> LeadScoringEngine {
        let profile = self.config.load_scoring_profile().unwrap_or_else(|e| {
            tracing::warn!("读取评分配置失败，使用默认参数: {}", e);
            ScoringProfile::default()
        });
        LeadScoringEngine::new(profile)
    }

    /// 重新计算单条线索评分
    pub fn recalculate_score(&self, lead_id: i64, reason: &str) -> ApiResult<LeadScoreState> {
        let entity = self
            .entity_repo
            .find(EntityType::Lead, lead_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Lead(id={})不存在", lead_id)))?;

        self.rescore_entity(&self.engine(), &entity, reason)
    }

    /// 重新计算全部线索评分
    ///
    /// 单条失败（数据无法解析等）跳过并记录 warn,不中断整体
    pub fn recalculate_all_scores(&self) -> ApiResult<Vec<LeadScoreState>> {
        let _perf = crate::perf::PerfGuard::new("api.recalculate_all_scores");

        let leads = self
            .entity_repo
            .list(EntityType::Lead)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

        let engine = self.engine();
        let mut scores = Vec::with_capacity(leads.len());
        for entity in &leads {
            match self.rescore_entity(&engine, entity, score_reasons::RECALCULATE) {
                Ok(state) => scores.push(state),
                Err(e) => tracing::warn!(lead_id = entity.entity_id, "线索重新评分失败，跳过: {}", e),
            }
        }

        tracing::info!(total = leads.len(), scored = scores.len(), "全量重新评分完成");
        Ok(scores)
    }

    /// 查询当前评分（未评分返回 None）
    pub fn get_score(&self, lead_id: i64) -> ApiResult<Option<LeadScoreState>> {
        let entity = self
            .entity_repo
            .find(EntityType::Lead, lead_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Lead(id={})不存在", lead_id)))?;
        Ok(entity.score)
    }

    /// 对已加载的线索实体评分并回写
    pub(crate) fn rescore_entity(
        &self,
        engine: &LeadScoringEngine,
        entity: &CrmEntity,
        reason: &str,
    ) -> ApiResult<LeadScoreState> {
        if entity.entity_type != EntityType::Lead {
            return Err(ApiError::InvalidInput(format!(
                "仅线索可评分: {}(id={})",
                entity.entity_type, entity.entity_id
            )));
        }

        let lead = Lead::from_entity(entity).map_err(|e| {
            ApiError::InvalidInput(format!("线索数据格式错误 (id={}): {}", entity.entity_id, e))
        })?;

        let state = engine.score(&lead, entity.score.as_ref(), reason);
        self.entity_repo.save_score(entity.entity_id, &state)?;

        tracing::debug!(lead_id = entity.entity_id, total = state.total, reason, "线索评分已回写");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::entity_repo::SqliteCrmEntityRepository;
    use serde_json::json;
    use std::sync::Mutex;

    fn setup() -> (LeadApi, Arc<SqliteCrmEntityRepository>, Arc<ConfigManager>) {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()));
        let repo = Arc::new(SqliteCrmEntityRepository::new(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn).unwrap());
        (LeadApi::new(repo.clone(), config.clone()), repo, config)
    }

    #[test]
    fn test_recalculate_persists_and_is_idempotent() {
        let (api, repo, _) = setup();
        repo.insert(&CrmEntity::new(
            EntityType::Lead,
            1,
            json!({"name": "Ada", "value": 30000, "stage": "qualified"}),
        ))
        .unwrap();

        let first = api.recalculate_score(1, score_reasons::CREATED).unwrap();
        let second = api.recalculate_score(1, score_reasons::UPDATED).unwrap();
        assert_eq!(first.total, second.total);
        assert_eq!(second.history.len(), 1);
        assert_eq!(api.get_score(1).unwrap().unwrap().total, first.total);
    }

    #[test]
    fn test_config_weights_take_effect() {
        let (api, repo, config) = setup();
        repo.insert(&CrmEntity::new(EntityType::Lead, 1, json!({"value": 0})))
            .unwrap();
        let before = api.recalculate_score(1, "x").unwrap();

        config
            .set_config_value(crate::config::config_keys::WEIGHT_VALUE, "1.0")
            .unwrap();
        let after = api.recalculate_score(1, "y").unwrap();
        assert!(after.total > before.total);
        assert_eq!(after.history.len(), 2);
        assert_eq!(after.history[1].previous_score, Some(before.total));
    }

    #[test]
    fn test_missing_lead_and_bad_data() {
        let (api, repo, _) = setup();
        assert!(matches!(api.recalculate_score(9, "x"), Err(ApiError::NotFound(_))));

        repo.insert(&CrmEntity::new(EntityType::Lead, 2, json!({"value": "lots"})))
            .unwrap();
        repo.insert(&CrmEntity::new(EntityType::Lead, 3, json!({"value": 500})))
            .unwrap();
        assert!(matches!(api.recalculate_score(2, "x"), Err(ApiError::InvalidInput(_))));

        let all = api.recalculate_all_scores().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].lead_id, 3);
    }
}
