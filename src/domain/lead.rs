// ==========================================
// CRM 自动分配系统 - 线索领域模型
// ==========================================
// 职责: 线索视图、资格标准、评分状态与评分历史
// 红线: total ∈ [1,100];评分历史最多保留 history_cap 条
// ==========================================

use crate::domain::entity::CrmEntity;
use crate::domain::lenient::{lenient_f64, null_as_default};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Lead - 线索（CrmEntity.data 的类型化视图）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    #[serde(skip)]
    pub lead_id: i64,

    // ===== 完整度统计字段 (9个) =====
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,

    // ===== 评分输入 =====
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stage: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub qualification: QualificationCriteria,

    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// 从通用实体记录解析线索
    pub fn from_entity(entity: &CrmEntity) -> Result<Self, serde_json::Error> {
        let mut lead: Lead = serde_json::from_value(entity.data.clone())?;
        lead.lead_id = entity.entity_id;
        lead.updated_at = Some(entity.updated_at);
        Ok(lead)
    }

    /// 完整度统计字段（固定顺序）
    pub fn tracked_fields(&self) -> [Option<&str>; 9] {
        [
            self.name.as_deref(),
            self.email.as_deref(),
            self.phone.as_deref(),
            self.company.as_deref(),
            self.title.as_deref(),
            self.source.as_deref(),
            self.industry.as_deref(),
            self.website.as_deref(),
            self.notes.as_deref(),
        ]
    }
}

// ==========================================
// QualificationCriteria - 销售资格标准 (7项)
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualificationCriteria {
    #[serde(default)]
    pub budget: bool,
    #[serde(default)]
    pub authority: bool,
    #[serde(default)]
    pub need: bool,
    #[serde(default)]
    pub timeline: bool,
    #[serde(default, alias = "decisionProcess")]
    pub decision_process: bool,
    #[serde(default)]
    pub competition: bool,
    #[serde(default)]
    pub fit: bool,
}

impl QualificationCriteria {
    pub fn all_met() -> Self {
        Self {
            budget: true,
            authority: true,
            need: true,
            timeline: true,
            decision_process: true,
            competition: true,
            fit: true,
        }
    }
}

// ==========================================
// LeadScoreState - 线索评分状态
// ==========================================
// 对齐: crm_entity.score_json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScoreState {
    pub lead_id: i64,
    pub value_score: f64,
    pub engagement_score: f64,
    pub completeness_score: f64,
    pub recency_score: f64,
    pub qualification_score: f64,
    pub total: i32,
    pub history: Vec<ScoreHistoryEntry>,
    pub calculated_at: DateTime<Utc>,
}

/// 评分变更历史（仅在总分变化时追加）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub score: i32,
    pub previous_score: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}
