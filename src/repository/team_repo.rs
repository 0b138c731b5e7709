// ==========================================
// CRM 自动分配系统 - 团队目录
// ==========================================
// 职责: 成员信息、可用性、实时负载快照
// 说明: 负载 = crm_entity 中分配给该成员且 is_active=1 的记录数
// ==========================================

use crate::domain::member::{MemberWorkload, TeamMember};
use crate::domain::types::{Availability, EntityType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// TeamDirectory Trait
// ==========================================
// 外部协作方接口;分配引擎只依赖此 trait
pub trait TeamDirectory: Send + Sync {
    fn get_all(&self) -> RepositoryResult<Vec<TeamMember>>;

    fn get_by_id(&self, member_id: i64) -> RepositoryResult<Option<TeamMember>>;

    /// 实时计算成员负载
    fn get_workload(&self, member_id: i64) -> RepositoryResult<MemberWorkload>;

    fn get_available_members(&self) -> RepositoryResult<Vec<TeamMember>>;
}

// ==========================================
// SqliteTeamDirectory - 团队目录（SQLite 实现）
// ==========================================
pub struct SqliteTeamDirectory {
    conn: Arc<Mutex<Connection>>,
}

fn map_member(row: &Row) -> rusqlite::Result<TeamMember> {
    let availability: String = row.get(4)?;
    Ok(TeamMember {
        member_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        availability: Availability::from_db_str(&availability),
    })
}

impl SqliteTeamDirectory {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增或覆盖成员
    pub fn upsert(&self, member: &TeamMember) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO team_member (member_id, name, email, role, availability)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(member_id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                role = excluded.role,
                availability = excluded.availability
            "#,
            params![
                member.member_id,
                member.name,
                member.email,
                member.role,
                member.availability.to_db_str(),
            ],
        )?;
        Ok(())
    }

    /// 设置成员可用性
    pub fn set_availability(&self, member_id: i64, availability: Availability) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE team_member SET availability = ?1 WHERE member_id = ?2",
            params![availability.to_db_str(), member_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("TeamMember", member_id));
        }
        Ok(())
    }

    fn query_members(&self, where_clause: &str) -> RepositoryResult<Vec<TeamMember>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT member_id, name, email, role, availability FROM team_member {} ORDER BY member_id ASC",
            where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let members = stmt
            .query_map([], map_member)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(members)
    }
}

impl TeamDirectory for SqliteTeamDirectory {
    fn get_all(&self) -> RepositoryResult<Vec<TeamMember>> {
        self.query_members("")
    }

    fn get_by_id(&self, member_id: i64) -> RepositoryResult<Option<TeamMember>> {
        let conn = self.get_conn()?;
        let member = conn
            .query_row(
                "SELECT member_id, name, email, role, availability FROM team_member WHERE member_id = ?1",
                params![member_id],
                map_member,
            )
            .optional()?;
        Ok(member)
    }

    fn get_workload(&self, member_id: i64) -> RepositoryResult<MemberWorkload> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT entity_type, COUNT(*)
            FROM crm_entity
            WHERE assigned_to = ?1 AND is_active = 1
            GROUP BY entity_type
            "#,
        )?;
        let counts = stmt
            .query_map(params![member_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut workload = MemberWorkload::empty(member_id);
        for (entity_type, count) in counts {
            match EntityType::parse(&entity_type) {
                Some(t) => workload.add(t, count.max(0) as u32),
                None => tracing::warn!(
                    "负载统计跳过未知实体类型: member_id={}, entity_type={}",
                    member_id,
                    entity_type
                ),
            }
        }
        Ok(workload)
    }

    fn get_available_members(&self) -> RepositoryResult<Vec<TeamMember>> {
        self.query_members("WHERE availability = 'available'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::CrmEntity;
    use crate::repository::entity_repo::{CrmEntityRepository, SqliteCrmEntityRepository};
    use serde_json::json;

    fn setup() -> (SqliteTeamDirectory, SqliteCrmEntityRepository) {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()));
        (
            SqliteTeamDirectory::new(conn.clone()),
            SqliteCrmEntityRepository::new(conn),
        )
    }

    #[test]
    fn test_available_members_filter() {
        let (team, _) = setup();
        team.upsert(&TeamMember::new(1, "Ann", Availability::Available)).unwrap();
        team.upsert(&TeamMember::new(2, "Bob", Availability::Unavailable)).unwrap();
        team.upsert(&TeamMember::new(3, "Cid", Availability::Available)).unwrap();

        let ids: Vec<i64> = team
            .get_available_members()
            .unwrap()
            .iter()
            .map(|m| m.member_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);

        team.set_availability(3, Availability::Unavailable).unwrap();
        assert_eq!(team.get_available_members().unwrap().len(), 1);
        assert!(team.set_availability(99, Availability::Available).is_err());
    }

    #[test]
    fn test_workload_counts_active_assignments_only() {
        let (team, entities) = setup();
        team.upsert(&TeamMember::new(1, "Ann", Availability::Available)).unwrap();

        for (i, t) in [EntityType::Lead, EntityType::Lead, EntityType::Task].iter().enumerate() {
            let mut e = CrmEntity::new(*t, i as i64 + 1, json!({}));
            e.assigned_to = Some(1);
            entities.insert(&e).unwrap();
        }
        entities.set_active(EntityType::Task, 3, false).unwrap();

        let workload = team.get_workload(1).unwrap();
        assert_eq!(workload.leads, 2);
        assert_eq!(workload.tasks, 0);
        assert_eq!(workload.total(), 2);
        assert_eq!(team.get_workload(42).unwrap().total(), 0);
    }
}
