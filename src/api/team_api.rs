// ==========================================
// CRM 自动分配系统 - 团队成员 API
// ==========================================
// 职责: 成员维护、可用性切换、成员负载查询
// ==========================================

use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::member::{MemberWithWorkload, TeamMember};
use crate::domain::types::{Actor, Availability};
use crate::repository::team_repo::{SqliteTeamDirectory, TeamDirectory};

pub struct TeamApi {
    team: Arc<SqliteTeamDirectory>,
}

impl TeamApi {
    pub fn new(team: Arc<SqliteTeamDirectory>) -> Self {
        Self { team }
    }

    /// 新增或更新成员
    pub fn upsert_member(&self, member: &TeamMember, actor: &Actor) -> ApiResult<()> {
        if member.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("成员姓名不能为空".to_string()));
        }
        self.team.upsert(member)?;
        tracing::info!(member_id = member.member_id, actor = %actor, "成员已保存");
        Ok(())
    }

    /// 切换成员可用性
    pub fn set_availability(
        &self,
        member_id: i64,
        availability: Availability,
        actor: &Actor,
    ) -> ApiResult<()> {
        self.team.set_availability(member_id, availability)?;
        tracing::info!(member_id, %availability, actor = %actor, "成员可用性已更新");
        Ok(())
    }

    /// 全部成员及实时负载
    pub fn list_members_with_workload(&self) -> ApiResult<Vec<MemberWithWorkload>> {
        let members = self
            .team
            .get_all()
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

        members
            .into_iter()
            .map(|member| -> ApiResult<MemberWithWorkload> {
                let workload = self.team.get_workload(member.member_id)?;
                Ok(MemberWithWorkload { member, workload })
            })
            .collect()
    }

    pub fn available_members(&self) -> ApiResult<Vec<TeamMember>> {
        self.team
            .get_available_members()
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn setup() -> TeamApi {
        let conn = Arc::new(Mutex::new(crate::db::open_in_memory_with_schema().unwrap()));
        TeamApi::new(Arc::new(SqliteTeamDirectory::new(conn)))
    }

    #[test]
    fn test_upsert_and_toggle() {
        let api = setup();
        api.upsert_member(&TeamMember::new(1, "Ann", Availability::Available), &Actor::System)
            .unwrap();
        api.upsert_member(&TeamMember::new(2, "Bob", Availability::Available), &Actor::System)
            .unwrap();
        api.set_availability(2, Availability::Unavailable, &Actor::User(1))
            .unwrap();

        assert_eq!(api.available_members().unwrap().len(), 1);
        let listed = api.list_members_with_workload().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].workload.total(), 0);
    }

    #[test]
    fn test_invalid_member() {
        let api = setup();
        assert!(matches!(
            api.upsert_member(&TeamMember::new(1, " ", Availability::Available), &Actor::System),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.set_availability(5, Availability::Available, &Actor::System),
            Err(ApiError::NotFound(_))
        ));
    }
}
