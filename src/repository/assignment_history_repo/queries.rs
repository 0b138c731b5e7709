use super::core::AssignmentHistoryRepository;
use crate::domain::assignment::{AssignmentRecord, AssignmentStats};
use crate::domain::types::{AssignmentMethod, EntityType};
use crate::repository::error::RepositoryResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Result as SqliteResult, Row};

const SELECT_COLUMNS: &str = r#"
    SELECT record_id, entity_type, entity_id, assigned_to, assigned_by,
           method, reason, rule_id, created_at
    FROM assignment_history
"#;

impl AssignmentHistoryRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询实体的全部分配记录（按追加顺序）
    pub fn find_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> RepositoryResult<Vec<AssignmentRecord>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "{} WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY seq ASC",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let records = stmt
            .query_map(params![entity_type.to_db_str(), entity_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(records)
    }

    /// 查询实体的当前分配（最新一条记录）
    pub fn latest_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: i64,
    ) -> RepositoryResult<Option<AssignmentRecord>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "{} WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY seq DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![entity_type.to_db_str(), entity_id], |row| self.map_row(row)) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询最近的分配记录（新 → 旧）
    pub fn find_recent(&self, limit: usize) -> RepositoryResult<Vec<AssignmentRecord>> {
        let conn = self.get_conn()?;

        let sql = format!("{} ORDER BY seq DESC LIMIT ?1", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let records = stmt
            .query_map(params![limit as i64], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(records)
    }

    /// 查询全部分配记录（旧 → 新，用于导出）
    pub fn find_all(&self) -> RepositoryResult<Vec<AssignmentRecord>> {
        let conn = self.get_conn()?;

        let sql = format!("{} ORDER BY seq ASC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        let records = stmt
            .query_map([], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(records)
    }

    /// 记录总数
    pub fn count(&self) -> RepositoryResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM assignment_history", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    // ==========================================
    // 统计
    // ==========================================

    /// 汇总统计（总数 / 按方式 / 按实体类型 / 按成员）
    pub fn stats(&self) -> RepositoryResult<AssignmentStats> {
        let conn = self.get_conn()?;
        let mut stats = AssignmentStats::default();

        let mut stmt = conn.prepare("SELECT method, COUNT(*) FROM assignment_history GROUP BY method")?;
        let by_method = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<SqliteResult<Vec<_>>>()?;
        for (method, count) in by_method {
            let count = count.max(0) as u64;
            stats.total += count;
            match AssignmentMethod::from_db_str(&method) {
                Some(AssignmentMethod::Rule) => stats.rule_based += count,
                Some(AssignmentMethod::Fallback) => stats.fallback += count,
                Some(AssignmentMethod::Manual) => stats.manual += count,
                Some(AssignmentMethod::Bulk) => stats.bulk += count,
                None => tracing::warn!("分配历史中存在未知分配方式: {}", method),
            }
        }

        let mut stmt =
            conn.prepare("SELECT entity_type, COUNT(*) FROM assignment_history GROUP BY entity_type")?;
        let by_type = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<SqliteResult<Vec<_>>>()?;
        for (entity_type, count) in by_type {
            stats.by_entity_type.insert(entity_type, count.max(0) as u64);
        }

        let mut stmt = conn.prepare(
            "SELECT assigned_to, COUNT(*) FROM assignment_history GROUP BY assigned_to",
        )?;
        let by_member = stmt
            .query_map([], |row| Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<SqliteResult<Vec<_>>>()?;
        for (member, count) in by_member {
            let count = count.max(0) as u64;
            match member {
                Some(member_id) => {
                    stats.by_member.insert(member_id, count);
                }
                None => stats.unassigned += count,
            }
        }

        Ok(stats)
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_row(&self, row: &Row) -> SqliteResult<AssignmentRecord> {
        let record_id: String = row.get(0)?;
        let entity_type_str: String = row.get(1)?;
        let entity_id: i64 = row.get(2)?;
        let assigned_to: Option<i64> = row.get(3)?;
        let assigned_by: String = row.get(4)?;
        let method_str: String = row.get(5)?;
        let reason: String = row.get(6)?;
        let rule_id: Option<i64> = row.get(7)?;
        let created_at_str: String = row.get(8)?;

        let entity_type = EntityType::parse(&entity_type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("未知实体类型: {}", entity_type_str).into(),
            )
        })?;

        let method = AssignmentMethod::from_db_str(&method_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("未知分配方式: {}", method_str).into(),
            )
        })?;

        // 解析时间戳
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(AssignmentRecord {
            record_id,
            entity_type,
            entity_id,
            assigned_to,
            assigned_by,
            method,
            reason,
            rule_id,
            created_at,
        })
    }
}
