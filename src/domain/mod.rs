// ==========================================
// CRM 自动分配系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod assignment;
pub mod deal;
pub mod entity;
pub mod lead;
mod lenient;
pub mod member;
pub mod rule;
pub mod types;

// 重导出核心类型
pub use assignment::{AssignmentRecord, AssignmentStats, BulkAssignFailure, BulkAssignResult};
pub use deal::{Deal, StageDurationStat, StageHistoryEntry};
pub use entity::CrmEntity;
pub use lead::{Lead, LeadScoreState, QualificationCriteria, ScoreHistoryEntry};
pub use member::{MemberWithWorkload, MemberWorkload, TeamMember};
pub use rule::{AssignmentOutcome, AssignmentRule, Condition, ConditionDraft, ConditionValue, RuleDraft};
pub use types::{
    Actor, AssignmentMethod, Availability, ConditionOperator, EntityType, FallbackStrategy,
};
