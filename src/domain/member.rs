// ==========================================
// CRM 自动分配系统 - 团队成员领域模型
// ==========================================
// 职责: 成员信息与负载快照
// 红线: 负载快照按需实时计算,不做持久化缓存
// ==========================================

use crate::domain::types::{Availability, EntityType};
use serde::{Deserialize, Serialize};

// ==========================================
// TeamMember - 团队成员
// ==========================================
// 对齐: team_member 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub member_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub availability: Availability,
}

impl TeamMember {
    pub fn new(member_id: i64, name: &str, availability: Availability) -> Self {
        Self {
            member_id,
            name: name.to_string(),
            email: None,
            role: None,
            availability,
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}

// ==========================================
// MemberWorkload - 成员负载快照
// ==========================================
// 统计口径: 当前分配给该成员且仍处于活跃状态的记录数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberWorkload {
    pub member_id: i64,
    pub contacts: u32,
    pub leads: u32,
    pub deals: u32,
    pub tasks: u32,
}

impl MemberWorkload {
    pub fn empty(member_id: i64) -> Self {
        Self {
            member_id,
            ..Default::default()
        }
    }

    /// 按实体类型累加
    pub fn add(&mut self, entity_type: EntityType, count: u32) {
        match entity_type {
            EntityType::Contact => self.contacts += count,
            EntityType::Lead => self.leads += count,
            EntityType::Deal => self.deals += count,
            EntityType::Task => self.tasks += count,
        }
    }

    /// 跨实体类型的总负载
    pub fn total(&self) -> u32 {
        self.contacts + self.leads + self.deals + self.tasks
    }
}

/// 成员 + 实时负载（列表展示用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberWithWorkload {
    pub member: TeamMember,
    pub workload: MemberWorkload,
}
