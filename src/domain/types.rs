// ==========================================
// CRM 自动分配系统 - 领域类型定义
// ==========================================
// 职责: 实体类型、成员可用性、条件运算符、兜底策略等枚举
// 红线: 运算符为封闭枚举,未知运算符在反序列化阶段即被拒绝
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 实体类型 (Entity Type)
// ==========================================
// 序列化格式: snake_case (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Contact, // 联系人
    Lead,    // 线索
    Deal,    // 商机
    Task,    // 任务
}

impl EntityType {
    /// 全部实体类型（固定顺序，用于统计输出）
    pub const ALL: [EntityType; 4] = [
        EntityType::Contact,
        EntityType::Lead,
        EntityType::Deal,
        EntityType::Task,
    ];

    /// 从字符串解析（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "contact" => Some(EntityType::Contact),
            "lead" => Some(EntityType::Lead),
            "deal" => Some(EntityType::Deal),
            "task" => Some(EntityType::Task),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            EntityType::Contact => "contact",
            EntityType::Lead => "lead",
            EntityType::Deal => "deal",
            EntityType::Task => "task",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 成员可用性 (Availability)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,   // 可接单
    Unavailable, // 休假/停用
}

impl Availability {
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "available" => Availability::Available,
            _ => Availability::Unavailable,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

// ==========================================
// 条件运算符 (Condition Operator)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    Between,
    In,
}

impl ConditionOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "equals" => Some(ConditionOperator::Equals),
            "not_equals" => Some(ConditionOperator::NotEquals),
            "contains" => Some(ConditionOperator::Contains),
            "greater_than" => Some(ConditionOperator::GreaterThan),
            "less_than" => Some(ConditionOperator::LessThan),
            "between" => Some(ConditionOperator::Between),
            "in" => Some(ConditionOperator::In),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::GreaterThan => "greater_than",
            ConditionOperator::LessThan => "less_than",
            ConditionOperator::Between => "between",
            ConditionOperator::In => "in",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 兜底策略 (Fallback Strategy)
// ==========================================
// 兼容说明: 四种策略名均被接受并持久化,
// 但兜底分配一律按最小负载执行（见 FallbackAllocator）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    RoundRobin,
    #[default]
    LeastWorkload,
    AvailabilityBased,
    ExpertiseBased,
}

impl FallbackStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "round_robin" => Some(FallbackStrategy::RoundRobin),
            "least_workload" => Some(FallbackStrategy::LeastWorkload),
            "availability_based" => Some(FallbackStrategy::AvailabilityBased),
            "expertise_based" => Some(FallbackStrategy::ExpertiseBased),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackStrategy::RoundRobin => "round_robin",
            FallbackStrategy::LeastWorkload => "least_workload",
            FallbackStrategy::AvailabilityBased => "availability_based",
            FallbackStrategy::ExpertiseBased => "expertise_based",
        }
    }
}

// ==========================================
// 分配方式 (Assignment Method)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    Manual,   // 人工指定
    Rule,     // 规则命中
    Fallback, // 兜底最小负载
    Bulk,     // 批量分配
}

impl AssignmentMethod {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(AssignmentMethod::Manual),
            "rule" => Some(AssignmentMethod::Rule),
            "fallback" => Some(AssignmentMethod::Fallback),
            "bulk" => Some(AssignmentMethod::Bulk),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssignmentMethod::Manual => "manual",
            AssignmentMethod::Rule => "rule",
            AssignmentMethod::Fallback => "fallback",
            AssignmentMethod::Bulk => "bulk",
        }
    }
}

// ==========================================
// 操作人 (Actor)
// ==========================================
// 所有写操作显式携带操作人,不存在隐式的"当前用户"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    User(i64),
}

impl Actor {
    pub fn from_db_str(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(id) => Actor::User(id),
            Err(_) => Actor::System,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::User(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_parse() {
        assert_eq!(EntityType::parse("Lead"), Some(EntityType::Lead));
        assert_eq!(EntityType::parse(" task "), Some(EntityType::Task));
        assert_eq!(EntityType::parse("opportunity"), None);
    }

    #[test]
    fn test_operator_serde_rejects_unknown() {
        let op: ConditionOperator = serde_json::from_str("\"greater_than\"").unwrap();
        assert_eq!(op, ConditionOperator::GreaterThan);
        assert!(serde_json::from_str::<ConditionOperator>("\"regex\"").is_err());
    }

    #[test]
    fn test_actor_roundtrip_db_str() {
        assert_eq!(Actor::System.to_string(), "system");
        assert_eq!(Actor::User(7).to_string(), "7");
        assert_eq!(Actor::from_db_str("7"), Actor::User(7));
        assert_eq!(Actor::from_db_str("system"), Actor::System);
    }
}
