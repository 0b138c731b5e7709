// ==========================================
// CRM 自动分配系统 - API层
// ==========================================
// 职责: 面向调用方的业务接口
// 约束: 所有写操作显式携带 Actor
// ==========================================

pub mod assignment_api;
pub mod deal_api;
pub mod entity_api;
pub mod error;
pub mod lead_api;
pub mod rule_api;
pub mod team_api;

// 重导出核心类型
pub use assignment_api::AssignmentApi;
pub use deal_api::DealApi;
pub use entity_api::{CrmEntityApi, EntityChangeResult};
pub use error::{ApiError, ApiResult};
pub use lead_api::LeadApi;
pub use rule_api::RuleApi;
pub use team_api::TeamApi;
