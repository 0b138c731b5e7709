// ==========================================
// CRM 自动分配系统 - 商机领域模型
// ==========================================
// 职责: 商机视图、阶段历史条目、阶段时长统计
// 红线: 阶段历史最后一条 exited_at 为 None（同一时刻仅一条未关闭）
// ==========================================

use crate::domain::entity::CrmEntity;
use crate::domain::lenient::{lenient_f64, null_as_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Deal - 商机（CrmEntity.data 的类型化视图）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deal {
    #[serde(skip)]
    pub deal_id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stage: String,
    #[serde(skip)]
    pub stage_history: Vec<StageHistoryEntry>,
}

impl Deal {
    pub fn from_entity(entity: &CrmEntity) -> Result<Self, serde_json::Error> {
        let mut deal: Deal = serde_json::from_value(entity.data.clone())?;
        deal.deal_id = entity.entity_id;
        deal.stage_history = entity.stage_history.clone();
        Ok(deal)
    }

    /// 当前未关闭的阶段条目
    pub fn open_entry(&self) -> Option<&StageHistoryEntry> {
        self.stage_history.last().filter(|e| e.is_open())
    }
}

// ==========================================
// StageHistoryEntry - 阶段历史条目
// ==========================================
// duration_ms: 未关闭时为 0;关闭时恰为 exited_at - entered_at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageHistoryEntry {
    pub stage: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
}

impl StageHistoryEntry {
    pub fn open(stage: &str, entered_at: DateTime<Utc>) -> Self {
        Self {
            stage: stage.to_string(),
            entered_at,
            exited_at: None,
            duration_ms: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }
}

// ==========================================
// StageDurationStat - 阶段时长统计
// ==========================================
// 当前停留时长按需实时计算,不持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDurationStat {
    pub stage: String,
    pub avg_historical_ms: Option<f64>, // 已关闭条目平均时长
    pub closed_count: usize,
    pub avg_current_ms: Option<f64>,    // 当前处于该阶段的商机平均停留
    pub current_count: usize,
}
