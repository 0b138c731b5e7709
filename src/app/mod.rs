// ==========================================
// CRM 自动分配系统 - 应用层
// ==========================================
// 职责: 装配仓储/引擎/API,提供默认数据库路径
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
