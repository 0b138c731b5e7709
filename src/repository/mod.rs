// ==========================================
// CRM 自动分配系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod assignment_history_repo;
pub mod entity_repo;
pub mod error;
pub mod row_utils;
pub mod rule_repo;
pub mod team_repo;

// 重导出核心仓储
pub use assignment_history_repo::AssignmentHistoryRepository;
pub use entity_repo::{CrmEntityRepository, SqliteCrmEntityRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use rule_repo::{RuleRepository, SqliteRuleRepository};
pub use team_repo::{SqliteTeamDirectory, TeamDirectory};
