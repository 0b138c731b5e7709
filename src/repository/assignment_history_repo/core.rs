use crate::domain::assignment::AssignmentRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::ts_to_db;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// AssignmentHistoryRepository - 分配历史仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct AssignmentHistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentHistoryRepository {
    /// 创建新的分配历史仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作（仅追加）
    // ==========================================

    /// 追加分配记录
    ///
    /// # 返回
    /// - `Ok(seq)`: 追加成功,返回自增序号
    /// - `Err(...)`: 数据库错误（不会留下半条记录）
    pub fn append(&self, record: &AssignmentRecord) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO assignment_history (
                record_id, entity_type, entity_id, assigned_to, assigned_by,
                method, reason, rule_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.record_id,
                record.entity_type.to_db_str(),
                record.entity_id,
                record.assigned_to,
                record.assigned_by,
                record.method.to_db_str(),
                record.reason,
                record.rule_id,
                ts_to_db(&record.created_at),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }
}
