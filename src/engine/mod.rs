// ==========================================
// CRM 自动分配系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 不拼 SQL, 所有分配结果必须输出 reason
// ==========================================

pub mod condition;
pub mod fallback;
pub mod rule_evaluator;
pub mod rule_store;
pub mod scoring;
pub mod stage_tracker;

// 重导出核心引擎
pub use condition::ConditionMatcher;
pub use fallback::FallbackAllocator;
pub use rule_evaluator::RuleEvaluator;
pub use rule_store::{RuleStore, ValidatedRule};
pub use scoring::LeadScoringEngine;
pub use stage_tracker::StageDurationTracker;
