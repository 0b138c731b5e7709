// ==========================================
// CRM 自动分配系统 - 商机阶段 API
// ==========================================
// 职责: 商机阶段切换、阶段历史查询、阶段时长统计
// ==========================================

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::deal::{Deal, StageDurationStat, StageHistoryEntry};
use crate::domain::types::{Actor, EntityType};
use crate::engine::stage_tracker::StageDurationTracker;
use crate::repository::entity_repo::CrmEntityRepository;

// ==========================================
// DealApi - 商机阶段 API
// ==========================================
pub struct DealApi {
    entity_repo: Arc<dyn CrmEntityRepository>,
}

impl DealApi {
    pub fn new(entity_repo: Arc<dyn CrmEntityRepository>) -> Self {
        Self { entity_repo }
    }

    /// 阶段切换（以当前时间为准）
    pub fn transition_stage(
        &self,
        deal_id: i64,
        new_stage: &str,
        actor: &Actor,
    ) -> ApiResult<Vec<StageHistoryEntry>> {
        self.transition_stage_at(deal_id, new_stage, actor, Utc::now())
    }

    /// 阶段切换
    ///
    /// # 返回
    /// 更新后的完整阶段历史（新阶段与当前相同时原样返回,不落库）
    pub fn transition_stage_at(
        &self,
        deal_id: i64,
        new_stage: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ApiResult<Vec<StageHistoryEntry>> {
        let new_stage = new_stage.trim();
        if new_stage.is_empty() {
            return Err(ApiError::InvalidInput("阶段名称不能为空".to_string()));
        }

        let entity = self
            .entity_repo
            .find(EntityType::Deal, deal_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Deal(id={})不存在", deal_id)))?;

        let history = StageDurationTracker::transition(&entity.stage_history, new_stage, now);
        if history == entity.stage_history {
            tracing::debug!(deal_id, stage = new_stage, "阶段未变化");
            return Ok(history);
        }

        self.entity_repo
            .save_stage_history(deal_id, new_stage, &history)?;

        tracing::info!(
            deal_id,
            stage = new_stage,
            entries = history.len(),
            actor = %actor,
            "商机阶段切换"
        );
        Ok(history)
    }

    /// 阶段历史
    pub fn stage_history(&self, deal_id: i64) -> ApiResult<Vec<StageHistoryEntry>> {
        let entity = self
            .entity_repo
            .find(EntityType::Deal, deal_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Deal(id={})不存在", deal_id)))?;
        Ok(entity.stage_history)
    }

    /// 阶段时长统计（当前停留时长实时计算）
    pub fn duration_analytics(&self) -> ApiResult<Vec<StageDurationStat>> {
        self.duration_analytics_at(Utc::now())
    }

    pub fn duration_analytics_at(&self, now: DateTime<Utc>) -> ApiResult<Vec<StageDurationStat>> {
        let _perf = crate::perf::PerfGuard::new("api.duration_analytics");

        let entities = self
            .entity_repo
            .list(EntityType::Deal)
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

        let deals: Vec<Deal> = entities
            .iter()
            .filter_map(|entity| match Deal::from_entity(entity) {
                Ok(deal) => Some(deal),
                Err(e) => {
                    tracing::warn!(deal_id = entity.entity_id, "商机数据格式错误，跳过统计: {}", e);
                    None
                }
            })
            .collect();

        Ok(StageDurationTracker::duration_analytics(&deals, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::CrmEntity;
    use crate::repository::entity_repo::SqliteCrmEntityRepository;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::sync::Mutex;

    fn setup() -> (DealApi, Arc<SqliteCrmEntityRepository>) {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()));
        let repo = Arc::new(SqliteCrmEntityRepository::new(conn));
        (DealApi::new(repo.clone()), repo)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_transition_persists_and_syncs_stage_field() {
        let (api, repo) = setup();
        repo.insert(&CrmEntity::new(EntityType::Deal, 1, json!({"title": "Big"})))
            .unwrap();

        api.transition_stage_at(1, "proposal", &Actor::User(3), t0()).unwrap();
        let history = api
            .transition_stage_at(1, "negotiation", &Actor::User(3), t0() + Duration::days(5))
            .unwrap();
        assert_eq!(history[0].duration_ms, 432_000_000);

        let stored = repo.find(EntityType::Deal, 1).unwrap().unwrap();
        assert_eq!(stored.stage_history, history);
        assert_eq!(stored.str_field("stage"), Some("negotiation"));
        assert_eq!(stored.str_field("title"), Some("Big"));
    }

    #[test]
    fn test_invalid_inputs() {
        let (api, _) = setup();
        assert!(matches!(
            api.transition_stage(1, "  ", &Actor::System),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.transition_stage(1, "won", &Actor::System),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_duration_analytics_over_deals() {
        let (api, repo) = setup();
        for id in 1..=2 {
            repo.insert(&CrmEntity::new(EntityType::Deal, id, json!({}))).unwrap();
            api.transition_stage_at(id, "proposal", &Actor::System, t0()).unwrap();
        }
        api.transition_stage_at(1, "won", &Actor::System, t0() + Duration::days(2))
            .unwrap();

        let stats = api.duration_analytics_at(t0() + Duration::days(3)).unwrap();
        let proposal = stats.iter().find(|s| s.stage == "proposal").unwrap();
        assert_eq!(proposal.closed_count, 1);
        assert_eq!(proposal.current_count, 1);
        assert_eq!(
            proposal.avg_current_ms,
            Some(Duration::days(3).num_milliseconds() as f64)
        );
    }
}
