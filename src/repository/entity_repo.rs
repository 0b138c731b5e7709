// ==========================================
// CRM 自动分配系统 - 实体记录数据仓储
// ==========================================
// 职责: 读取实体当前状态;回写分配字段、评分字段、阶段历史字段
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::deal::StageHistoryEntry;
use crate::domain::entity::CrmEntity;
use crate::domain::lead::LeadScoreState;
use crate::domain::types::EntityType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{opt_ts_from_db, ts_from_db, ts_to_db};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// CrmEntityRepository Trait
// ==========================================
// 实现者: SqliteCrmEntityRepository（使用 rusqlite）
pub trait CrmEntityRepository: Send + Sync {
    fn find(&self, entity_type: EntityType, entity_id: i64) -> RepositoryResult<Option<CrmEntity>>;

    fn list(&self, entity_type: EntityType) -> RepositoryResult<Vec<CrmEntity>>;

    /// 插入新实体（主键冲突返回 UniqueConstraintViolation）
    fn insert(&self, entity: &CrmEntity) -> RepositoryResult<()>;

    /// 覆盖业务字段
    fn update_data(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        data: &JsonValue,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// 回写分配字段（assigned_to / assigned_at）
    fn update_assignment(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        assigned_to: Option<i64>,
        assigned_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()>;

    /// 回写线索评分
    fn save_score(&self, lead_id: i64, score: &LeadScoreState) -> RepositoryResult<()>;

    /// 回写商机阶段（当前阶段 + 阶段历史）
    fn save_stage_history(
        &self,
        deal_id: i64,
        stage: &str,
        history: &[StageHistoryEntry],
    ) -> RepositoryResult<()>;

    /// 设置是否计入负载（关闭/归档的记录不计入）
    fn set_active(&self, entity_type: EntityType, entity_id: i64, is_active: bool) -> RepositoryResult<()>;
}

// ==========================================
// SqliteCrmEntityRepository - 实体记录仓储
// ==========================================
pub struct SqliteCrmEntityRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT entity_type, entity_id, data_json, assigned_to, assigned_at,
           is_active, score_json, stage_history_json, updated_at
    FROM crm_entity
"#;

struct EntityRow {
    entity_type: String,
    entity_id: i64,
    data_json: String,
    assigned_to: Option<i64>,
    assigned_at: Option<String>,
    is_active: bool,
    score_json: Option<String>,
    stage_history_json: Option<String>,
    updated_at: String,
}

impl EntityRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            entity_type: row.get(0)?,
            entity_id: row.get(1)?,
            data_json: row.get(2)?,
            assigned_to: row.get(3)?,
            assigned_at: row.get(4)?,
            is_active: row.get::<_, i64>(5)? != 0,
            score_json: row.get(6)?,
            stage_history_json: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_entity(self) -> RepositoryResult<CrmEntity> {
        let entity_type = EntityType::parse(&self.entity_type).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "entity_type".to_string(),
                message: format!("未知实体类型: {}", self.entity_type),
            }
        })?;
        let score = match self.score_json {
            Some(raw) => Some(serde_json::from_str::<LeadScoreState>(&raw)?),
            None => None,
        };
        let stage_history = match self.stage_history_json {
            Some(raw) => serde_json::from_str::<Vec<StageHistoryEntry>>(&raw)?,
            None => Vec::new(),
        };

        Ok(CrmEntity {
            entity_type,
            entity_id: self.entity_id,
            data: serde_json::from_str(&self.data_json)?,
            assigned_to: self.assigned_to,
            assigned_at: opt_ts_from_db("assigned_at", self.assigned_at)?,
            is_active: self.is_active,
            score,
            stage_history,
            updated_at: ts_from_db("updated_at", &self.updated_at)?,
        })
    }
}

impl SqliteCrmEntityRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn expect_one(rows: usize, entity_type: EntityType, entity_id: i64) -> RepositoryResult<()> {
        if rows == 0 {
            return Err(RepositoryError::not_found(
                &format!("CrmEntity({})", entity_type),
                entity_id,
            ));
        }
        Ok(())
    }
}

impl CrmEntityRepository for SqliteCrmEntityRepository {
    fn find(&self, entity_type: EntityType, entity_id: i64) -> RepositoryResult<Option<CrmEntity>> {
        let row = {
            let conn = self.get_conn()?;
            let sql = format!("{} WHERE entity_type = ?1 AND entity_id = ?2", SELECT_COLUMNS);
            conn.query_row(&sql, params![entity_type.to_db_str(), entity_id], EntityRow::from_row)
                .optional()?
        };
        row.map(EntityRow::into_entity).transpose()
    }

    fn list(&self, entity_type: EntityType) -> RepositoryResult<Vec<CrmEntity>> {
        let rows = {
            let conn = self.get_conn()?;
            let sql = format!("{} WHERE entity_type = ?1 ORDER BY entity_id ASC", SELECT_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![entity_type.to_db_str()], EntityRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };
        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    fn insert(&self, entity: &CrmEntity) -> RepositoryResult<()> {
        let data_json = serde_json::to_string(&entity.data)?;
        let score_json = entity.score.as_ref().map(serde_json::to_string).transpose()?;
        let stage_history_json = if entity.stage_history.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&entity.stage_history)?)
        };

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO crm_entity (
                entity_type, entity_id, data_json, assigned_to, assigned_at,
                is_active, score_json, stage_history_json, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                entity.entity_type.to_db_str(),
                entity.entity_id,
                data_json,
                entity.assigned_to,
                entity.assigned_at.as_ref().map(ts_to_db),
                entity.is_active as i64,
                score_json,
                stage_history_json,
                ts_to_db(&entity.updated_at),
            ],
        )?;
        Ok(())
    }

    fn update_data(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        data: &JsonValue,
        updated_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let data_json = serde_json::to_string(data)?;
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE crm_entity SET data_json = ?1, updated_at = ?2 WHERE entity_type = ?3 AND entity_id = ?4",
            params![data_json, ts_to_db(&updated_at), entity_type.to_db_str(), entity_id],
        )?;
        Self::expect_one(rows, entity_type, entity_id)
    }

    fn update_assignment(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        assigned_to: Option<i64>,
        assigned_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE crm_entity SET assigned_to = ?1, assigned_at = ?2 WHERE entity_type = ?3 AND entity_id = ?4",
            params![
                assigned_to,
                assigned_at.as_ref().map(ts_to_db),
                entity_type.to_db_str(),
                entity_id
            ],
        )?;
        Self::expect_one(rows, entity_type, entity_id)
    }

    fn save_score(&self, lead_id: i64, score: &LeadScoreState) -> RepositoryResult<()> {
        let score_json = serde_json::to_string(score)?;
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE crm_entity SET score_json = ?1 WHERE entity_type = 'lead' AND entity_id = ?2",
            params![score_json, lead_id],
        )?;
        Self::expect_one(rows, EntityType::Lead, lead_id)
    }

    fn save_stage_history(
        &self,
        deal_id: i64,
        stage: &str,
        history: &[StageHistoryEntry],
    ) -> RepositoryResult<()> {
        let history_json = serde_json::to_string(history)?;
        let conn = self.get_conn()?;
        // 当前阶段同步写入 data_json.stage，保持规则条件可读
        let rows = conn.execute(
            r#"
            UPDATE crm_entity
            SET stage_history_json = ?1,
                data_json = json_set(data_json, '$.stage', ?2)
            WHERE entity_type = 'deal' AND entity_id = ?3
            "#,
            params![history_json, stage, deal_id],
        )?;
        Self::expect_one(rows, EntityType::Deal, deal_id)
    }

    fn set_active(&self, entity_type: EntityType, entity_id: i64, is_active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE crm_entity SET is_active = ?1 WHERE entity_type = ?2 AND entity_id = ?3",
            params![is_active as i64, entity_type.to_db_str(), entity_id],
        )?;
        Self::expect_one(rows, entity_type, entity_id)
    }
}
