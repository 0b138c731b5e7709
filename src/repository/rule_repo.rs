// ==========================================
// CRM 自动分配系统 - 分配规则数据仓储
// ==========================================
// 红线: Repository 不含业务规则，只做数据 CRUD
// 约束: 列表查询一律按 (priority ASC, rule_id ASC) 返回
// ==========================================

use crate::domain::rule::{AssignmentRule, Condition};
use crate::domain::types::{EntityType, FallbackStrategy};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{ts_from_db, ts_to_db};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// RuleRepository Trait
// ==========================================
// 实现者: SqliteRuleRepository（使用 rusqlite）
pub trait RuleRepository: Send + Sync {
    /// 查询规则（可按实体类型过滤）
    fn list(&self, entity_type: Option<EntityType>) -> RepositoryResult<Vec<AssignmentRule>>;

    /// 查询某实体类型的启用规则（一次查询，保证快照一致）
    fn list_active(&self, entity_type: EntityType) -> RepositoryResult<Vec<AssignmentRule>>;

    fn find_by_id(&self, rule_id: i64) -> RepositoryResult<Option<AssignmentRule>>;

    /// 插入规则（忽略 rule.rule_id），返回新 rule_id
    fn insert(&self, rule: &AssignmentRule) -> RepositoryResult<i64>;

    /// 整体覆盖规则定义
    fn update(&self, rule: &AssignmentRule) -> RepositoryResult<()>;

    fn delete(&self, rule_id: i64) -> RepositoryResult<()>;

    fn set_active(&self, rule_id: i64, is_active: bool, updated_at: DateTime<Utc>) -> RepositoryResult<()>;

    /// 某实体类型下的最大优先级（无规则时 None）
    fn max_priority(&self, entity_type: EntityType) -> RepositoryResult<Option<i32>>;
}

// ==========================================
// SqliteRuleRepository - 规则仓储
// ==========================================
pub struct SqliteRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT rule_id, name, entity_type, is_active, priority,
           conditions_json, fallback_strategy, created_by, created_at, updated_at
    FROM assignment_rule
"#;

/// 原始行（解析 JSON / 时间前）
struct RuleRow {
    rule_id: i64,
    name: String,
    entity_type: String,
    is_active: bool,
    priority: i32,
    conditions_json: String,
    fallback_strategy: String,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl RuleRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            rule_id: row.get(0)?,
            name: row.get(1)?,
            entity_type: row.get(2)?,
            is_active: row.get::<_, i64>(3)? != 0,
            priority: row.get(4)?,
            conditions_json: row.get(5)?,
            fallback_strategy: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_rule(self) -> RepositoryResult<AssignmentRule> {
        let entity_type = EntityType::parse(&self.entity_type).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "entity_type".to_string(),
                message: format!("未知实体类型: {}", self.entity_type),
            }
        })?;
        let conditions: Vec<Condition> = serde_json::from_str(&self.conditions_json)?;

        Ok(AssignmentRule {
            rule_id: self.rule_id,
            name: self.name,
            entity_type,
            is_active: self.is_active,
            priority: self.priority,
            conditions,
            // 历史数据中的未知策略名按默认值读取
            fallback_strategy: FallbackStrategy::parse(&self.fallback_strategy).unwrap_or_default(),
            created_by: self.created_by,
            created_at: ts_from_db("created_at", &self.created_at)?,
            updated_at: ts_from_db("updated_at", &self.updated_at)?,
        })
    }
}

impl SqliteRuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn query_rules(
        &self,
        where_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<Vec<AssignmentRule>> {
        let conn = self.get_conn()?;
        let sql = format!("{} {} ORDER BY priority ASC, rule_id ASC", SELECT_COLUMNS, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, RuleRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(RuleRow::into_rule).collect()
    }
}

impl RuleRepository for SqliteRuleRepository {
    fn list(&self, entity_type: Option<EntityType>) -> RepositoryResult<Vec<AssignmentRule>> {
        match entity_type {
            Some(t) => self.query_rules("WHERE entity_type = ?1", params![t.to_db_str()]),
            None => self.query_rules("", params![]),
        }
    }

    fn list_active(&self, entity_type: EntityType) -> RepositoryResult<Vec<AssignmentRule>> {
        self.query_rules(
            "WHERE entity_type = ?1 AND is_active = 1",
            params![entity_type.to_db_str()],
        )
    }

    fn find_by_id(&self, rule_id: i64) -> RepositoryResult<Option<AssignmentRule>> {
        let row = {
            let conn = self.get_conn()?;
            let sql = format!("{} WHERE rule_id = ?1", SELECT_COLUMNS);
            conn.query_row(&sql, params![rule_id], RuleRow::from_row)
                .optional()?
        };
        row.map(RuleRow::into_rule).transpose()
    }

    fn insert(&self, rule: &AssignmentRule) -> RepositoryResult<i64> {
        let conditions_json = serde_json::to_string(&rule.conditions)?;
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO assignment_rule (
                name, entity_type, is_active, priority, conditions_json,
                fallback_strategy, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                rule.name,
                rule.entity_type.to_db_str(),
                rule.is_active as i64,
                rule.priority,
                conditions_json,
                rule.fallback_strategy.as_str(),
                rule.created_by,
                ts_to_db(&rule.created_at),
                ts_to_db(&rule.updated_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, rule: &AssignmentRule) -> RepositoryResult<()> {
        let conditions_json = serde_json::to_string(&rule.conditions)?;
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE assignment_rule
            SET name = ?1, entity_type = ?2, is_active = ?3, priority = ?4,
                conditions_json = ?5, fallback_strategy = ?6, updated_at = ?7
            WHERE rule_id = ?8
            "#,
            params![
                rule.name,
                rule.entity_type.to_db_str(),
                rule.is_active as i64,
                rule.priority,
                conditions_json,
                rule.fallback_strategy.as_str(),
                ts_to_db(&rule.updated_at),
                rule.rule_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AssignmentRule", rule.rule_id));
        }
        Ok(())
    }

    fn delete(&self, rule_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM assignment_rule WHERE rule_id = ?1", params![rule_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AssignmentRule", rule_id));
        }
        Ok(())
    }

    fn set_active(&self, rule_id: i64, is_active: bool, updated_at: DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE assignment_rule SET is_active = ?1, updated_at = ?2 WHERE rule_id = ?3",
            params![is_active as i64, ts_to_db(&updated_at), rule_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AssignmentRule", rule_id));
        }
        Ok(())
    }

    fn max_priority(&self, entity_type: EntityType) -> RepositoryResult<Option<i32>> {
        let conn = self.get_conn()?;
        let max: Option<i32> = conn.query_row(
            "SELECT MAX(priority) FROM assignment_rule WHERE entity_type = ?1",
            params![entity_type.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(max)
    }
}
