// ==========================================
// CRM 自动分配系统 - 分配历史领域模型
// ==========================================
// 红线: 分配历史只追加,不修改、不删除
// 用途: 审计追踪,当前归属 = 该实体最新一条记录
// ==========================================

use crate::domain::rule::AssignmentOutcome;
use crate::domain::types::{Actor, AssignmentMethod, EntityType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// AssignmentRecord - 分配记录
// ==========================================
// 对齐: assignment_history 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub record_id: String,             // UUID
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub assigned_to: Option<i64>,      // None = 取消分配
    pub assigned_by: String,           // 操作人ID 或 "system"
    pub method: AssignmentMethod,
    pub reason: String,
    pub rule_id: Option<i64>,          // None = 兜底或人工
    pub created_at: DateTime<Utc>,
}

impl AssignmentRecord {
    /// 创建新的分配记录
    ///
    /// # 参数
    /// - `entity_type` / `entity_id`: 被分配的实体
    /// - `assigned_to`: 目标成员（None 表示取消分配）
    /// - `actor`: 操作人
    /// - `method`: 分配方式
    /// - `reason`: 原因文本
    pub fn new(
        entity_type: EntityType,
        entity_id: i64,
        assigned_to: Option<i64>,
        actor: &Actor,
        method: AssignmentMethod,
        reason: &str,
    ) -> Self {
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            entity_type,
            entity_id,
            assigned_to,
            assigned_by: actor.to_string(),
            method,
            reason: reason.to_string(),
            rule_id: None,
            created_at: Utc::now(),
        }
    }

    /// 由自动分配结果构造（规则命中或兜底）
    pub fn from_outcome(
        entity_type: EntityType,
        entity_id: i64,
        outcome: &AssignmentOutcome,
        actor: &Actor,
    ) -> Self {
        let method = if outcome.rule_id.is_some() {
            AssignmentMethod::Rule
        } else {
            AssignmentMethod::Fallback
        };
        let mut record = Self::new(
            entity_type,
            entity_id,
            Some(outcome.assigned_to),
            actor,
            method,
            &outcome.reason,
        );
        record.rule_id = outcome.rule_id;
        record
    }
}

// ==========================================
// AssignmentStats - 分配历史汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub total: u64,
    pub rule_based: u64,
    pub fallback: u64,
    pub manual: u64,
    pub bulk: u64,
    pub by_entity_type: BTreeMap<String, u64>,
    pub by_member: BTreeMap<i64, u64>, // 仅统计有目标成员的记录
    pub unassigned: u64,
}

// ==========================================
// BulkAssignResult - 批量分配结果
// ==========================================
// 非事务: 失败项跳过并计数,已成功项保持提交
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkAssignResult {
    pub updated: usize,
    pub total: usize,
    pub failures: Vec<BulkAssignFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAssignFailure {
    pub entity_id: i64,
    pub reason: String,
}
