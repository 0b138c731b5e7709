use serde::{Deserialize, Serialize};

/// 线索评分参数
///
/// 存储位置：config_kv（scope_id='global'，key='scoring.*'）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringProfile {
    /// 五项子分权重
    #[serde(default)]
    pub weights: ScoringWeights,

    /// 时效窗口（天），超过即时效分为 0
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,

    /// 评分历史上限（超出丢弃最旧）
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_recency_window_days() -> i64 {
    30
}

fn default_history_cap() -> usize {
    50
}

impl Default for ScoringProfile {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            recency_window_days: default_recency_window_days(),
            history_cap: default_history_cap(),
        }
    }
}

/// 子分权重（默认合计 1.0）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub value: f64,
    pub engagement: f64,
    pub completeness: f64,
    pub recency: f64,
    pub qualification: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            value: 0.30,
            engagement: 0.25,
            completeness: 0.15,
            recency: 0.10,
            qualification: 0.20,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.value + self.engagement + self.completeness + self.recency + self.qualification
    }
}
