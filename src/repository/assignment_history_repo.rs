// ==========================================
// CRM 自动分配系统 - 分配历史数据仓储
// ==========================================
// 红线: 只追加 (append-only),不提供更新/删除
// 说明: seq 自增,同一实体的记录按 seq 升序即为时间顺序
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::AssignmentHistoryRepository;
