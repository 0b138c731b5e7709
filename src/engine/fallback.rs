// ==========================================
// CRM 自动分配系统 - 兜底分配器
// ==========================================
// 职责: 规则未命中时,选择负载最小的可用成员
// 规则: 负载相同按 member_id 最小者优先（确定性）
// 兼容说明: 规则上的 fallback_strategy 仅持久化,此处一律按最小负载执行
// ==========================================

use crate::domain::entity::CrmEntity;
use crate::domain::rule::AssignmentOutcome;
use crate::domain::types::FallbackStrategy;
use crate::repository::team_repo::TeamDirectory;
use std::sync::Arc;
use tracing::instrument;

// ==========================================
// FallbackAllocator - 兜底分配器
// ==========================================
pub struct FallbackAllocator {
    team: Arc<dyn TeamDirectory>,
}

impl FallbackAllocator {
    pub fn new(team: Arc<dyn TeamDirectory>) -> Self {
        Self { team }
    }

    /// 兜底原因文本
    pub fn reason() -> String {
        format!("fallback:{}", FallbackStrategy::LeastWorkload.as_str())
    }

    /// 选择负载最小的可用成员
    ///
    /// # 返回
    /// - `Some(outcome)`: rule_id 为 None
    /// - `None`: 无可用成员（或目录读取失败）,需人工分配
    #[instrument(skip(self, entity), fields(entity_type = %entity.entity_type, entity_id = entity.entity_id))]
    pub fn allocate(&self, entity: &CrmEntity) -> Option<AssignmentOutcome> {
        let members = match self.team.get_available_members() {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!("读取可用成员失败,跳过兜底分配: {}", e);
                return None;
            }
        };

        let mut best: Option<(u32, i64)> = None;
        for member in members.iter().filter(|m| m.is_available()) {
            let load = match self.team.get_workload(member.member_id) {
                Ok(w) => w.total(),
                Err(e) => {
                    tracing::warn!(member_id = member.member_id, "读取成员负载失败,跳过该成员: {}", e);
                    continue;
                }
            };
            let candidate = (load, member.member_id);
            if best.map_or(true, |b| candidate < b) {
                best = Some(candidate);
            }
        }

        match best {
            Some((load, member_id)) => {
                tracing::info!(assigned_to = member_id, workload = load, "兜底分配");
                Some(AssignmentOutcome {
                    assigned_to: member_id,
                    reason: Self::reason(),
                    rule_id: None,
                })
            }
            None => {
                tracing::info!("无可用成员,需人工分配");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::member::{MemberWorkload, TeamMember};
    use crate::domain::types::{Availability, EntityType};
    use crate::repository::error::RepositoryResult;
    use serde_json::json;
    use std::collections::HashMap;

    struct StubTeam {
        members: Vec<TeamMember>,
        loads: HashMap<i64, u32>,
    }

    impl StubTeam {
        fn new(entries: &[(i64, Availability, u32)]) -> Self {
            Self {
                members: entries
                    .iter()
                    .map(|(id, a, _)| TeamMember::new(*id, "m", *a))
                    .collect(),
                loads: entries.iter().map(|(id, _, l)| (*id, *l)).collect(),
            }
        }
    }

    impl TeamDirectory for StubTeam {
        fn get_all(&self) -> RepositoryResult<Vec<TeamMember>> {
            Ok(self.members.clone())
        }
        fn get_by_id(&self, member_id: i64) -> RepositoryResult<Option<TeamMember>> {
            Ok(self.members.iter().find(|m| m.member_id == member_id).cloned())
        }
        fn get_workload(&self, member_id: i64) -> RepositoryResult<MemberWorkload> {
            let mut w = MemberWorkload::empty(member_id);
            w.add(EntityType::Lead, self.loads.get(&member_id).copied().unwrap_or(0));
            Ok(w)
        }
        fn get_available_members(&self) -> RepositoryResult<Vec<TeamMember>> {
            Ok(self.members.iter().filter(|m| m.is_available()).cloned().collect())
        }
    }

    fn entity() -> CrmEntity {
        CrmEntity::new(EntityType::Lead, 1, json!({}))
    }

    #[test]
    fn test_least_workload_lowest_id_tiebreak() {
        let team = StubTeam::new(&[
            (10, Availability::Available, 5),
            (12, Availability::Available, 3),
            (11, Availability::Available, 3),
        ]);
        let outcome = FallbackAllocator::new(Arc::new(team)).allocate(&entity()).unwrap();
        assert_eq!(outcome.assigned_to, 11);
        assert_eq!(outcome.rule_id, None);
        assert_eq!(outcome.reason, "fallback:least_workload");
    }

    #[test]
    fn test_unavailable_members_excluded() {
        let team = StubTeam::new(&[
            (1, Availability::Unavailable, 0),
            (2, Availability::Available, 7),
        ]);
        let outcome = FallbackAllocator::new(Arc::new(team)).allocate(&entity()).unwrap();
        assert_eq!(outcome.assigned_to, 2);
    }

    #[test]
    fn test_no_available_members() {
        let team = StubTeam::new(&[(1, Availability::Unavailable, 0)]);
        assert!(FallbackAllocator::new(Arc::new(team)).allocate(&entity()).is_none());
        let empty = StubTeam::new(&[]);
        assert!(FallbackAllocator::new(Arc::new(empty)).allocate(&entity()).is_none());
    }
}
