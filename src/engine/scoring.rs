// ==========================================
// CRM 自动分配系统 - 线索评分引擎
// ==========================================
// 职责: 五项子分加权计算线索总分,维护评分变更历史
// 红线: total ∈ [1,100];仅在总分变化时追加历史;历史超出上限丢弃最旧
// ==========================================
// 子分:
// - 金额 (value): 5 档分段
// - 参与度 (engagement): 阶段映射表
// - 完整度 (completeness): 9 个字段填写比例
// - 时效 (recency): 距最近更新天数线性衰减
// - 资格 (qualification): 7 项资格标准累加
// ==========================================

use crate::config::scoring_profile::ScoringProfile;
use crate::domain::lead::{Lead, LeadScoreState, QualificationCriteria, ScoreHistoryEntry};
use chrono::{DateTime, Utc};
use tracing::instrument;

/// 金额分段（上界含）
const VALUE_BUCKETS: [(f64, f64); 4] = [
    (10_000.0, 20.0),
    (25_000.0, 40.0),
    (50_000.0, 60.0),
    (100_000.0, 80.0),
];
const VALUE_TOP_SCORE: f64 = 100.0;

/// 阶段 → 参与度
const ENGAGEMENT_TABLE: [(&str, f64); 8] = [
    ("new", 20.0),
    ("contacted", 40.0),
    ("qualified", 70.0),
    ("proposal", 85.0),
    ("negotiation", 90.0),
    ("closed-won", 100.0),
    ("unqualified", 10.0),
    ("closed-lost", 5.0),
];

const TRACKED_FIELD_COUNT: f64 = 9.0;

// ==========================================
// LeadScoringEngine - 线索评分引擎
// ==========================================
pub struct LeadScoringEngine {
    profile: ScoringProfile,
}

impl LeadScoringEngine {
    pub fn new(profile: ScoringProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &ScoringProfile {
        &self.profile
    }

    /// 计算评分（以当前时间为基准）
    pub fn score(&self, lead: &Lead, previous: Option<&LeadScoreState>, reason: &str) -> LeadScoreState {
        self.score_at(lead, previous, reason, Utc::now())
    }

    /// 计算评分
    ///
    /// # 参数
    /// - `previous`: 上一次的评分状态（携带历史）
    /// - `reason`: 写入历史的原因（仅总分变化时使用）
    /// - `now`: 计算基准时间
    #[instrument(skip(self, lead, previous), fields(lead_id = lead.lead_id))]
    pub fn score_at(
        &self,
        lead: &Lead,
        previous: Option<&LeadScoreState>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> LeadScoreState {
        let value_score = Self::value_score(lead.value);
        let engagement_score = Self::engagement_score(&lead.stage);
        let completeness_score = Self::completeness_score(lead);
        let recency_score = self.recency_score(lead.updated_at, now);
        let qualification_score = Self::qualification_score(&lead.qualification);

        let w = &self.profile.weights;
        let weighted = value_score * w.value
            + engagement_score * w.engagement
            + completeness_score * w.completeness
            + recency_score * w.recency
            + qualification_score * w.qualification;
        let total = Self::finalize_total(weighted);

        let mut history = previous.map(|p| p.history.clone()).unwrap_or_default();
        let previous_total = previous.map(|p| p.total);

        if previous_total != Some(total) {
            history.push(ScoreHistoryEntry {
                score: total,
                previous_score: previous_total,
                timestamp: now,
                reason: reason.to_string(),
            });
            let cap = self.profile.history_cap.max(1);
            if history.len() > cap {
                let overflow = history.len() - cap;
                history.drain(..overflow);
            }
            tracing::debug!(total, ?previous_total, "评分变化");
        }

        LeadScoreState {
            lead_id: lead.lead_id,
            value_score,
            engagement_score,
            completeness_score,
            recency_score,
            qualification_score,
            total,
            history,
            calculated_at: now,
        }
    }

    // ==========================================
    // 子分计算
    // ==========================================

    pub fn value_score(value: f64) -> f64 {
        if !value.is_finite() {
            return VALUE_BUCKETS[0].1;
        }
        VALUE_BUCKETS
            .iter()
            .find(|(upper, _)| value <= *upper)
            .map(|(_, score)| *score)
            .unwrap_or(VALUE_TOP_SCORE)
    }

    /// 阶段名大小写不敏感,下划线视同连字符（closed_won == closed-won）
    pub fn engagement_score(stage: &str) -> f64 {
        let normalized = stage.trim().to_lowercase().replace('_', "-");
        ENGAGEMENT_TABLE
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, score)| *score)
            .unwrap_or(0.0)
    }

    pub fn completeness_score(lead: &Lead) -> f64 {
        let filled = lead
            .tracked_fields()
            .iter()
            .filter(|f| f.map_or(false, |s| !s.trim().is_empty()))
            .count();
        filled as f64 / TRACKED_FIELD_COUNT * 100.0
    }

    /// 按整天计算;未知更新时间视为刚更新
    pub fn recency_score(&self, updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        let days = updated_at
            .map(|ts| (now - ts).num_days().max(0))
            .unwrap_or(0) as f64;
        let window = self.profile.recency_window_days.max(1) as f64;
        (100.0 - days / window * 100.0).max(0.0)
    }

    pub fn qualification_score(q: &QualificationCriteria) -> f64 {
        let points = [
            (q.budget, 15.0),
            (q.authority, 15.0),
            (q.need, 20.0),
            (q.timeline, 15.0),
            (q.decision_process, 10.0),
            (q.competition, 10.0),
            (q.fit, 15.0),
        ];
        let sum: f64 = points.iter().filter(|(met, _)| *met).map(|(_, p)| p).sum();
        sum.min(100.0)
    }

    /// 加权和 → 总分: 先规整到 2 位小数（消除浮点误差）,再四舍五入,最后截断到 [1,100]
    fn finalize_total(weighted: f64) -> i32 {
        if !weighted.is_finite() {
            return 1;
        }
        let normalized = (weighted * 100.0).round() / 100.0;
        (normalized.round() as i64).clamp(1, 100) as i32
    }
}
