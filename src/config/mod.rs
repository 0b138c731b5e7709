// ==========================================
// CRM 自动分配系统 - 配置层
// ==========================================
// 职责: 系统配置管理（评分权重、兜底开关）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod scoring_profile;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use scoring_profile::{ScoringProfile, ScoringWeights};
