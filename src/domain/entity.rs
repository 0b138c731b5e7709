// ==========================================
// CRM 自动分配系统 - 通用实体记录
// ==========================================
// 职责: 外部仓储提供的实体快照（联系人/线索/商机/任务）
// 说明: 业务字段保存在 data (JSON 对象) 中,规则条件按字段名读取
// ==========================================

use crate::domain::deal::StageHistoryEntry;
use crate::domain::lead::LeadScoreState;
use crate::domain::types::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// CrmEntity - 实体记录
// ==========================================
// 对齐: crm_entity 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmEntity {
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub data: JsonValue,
    pub assigned_to: Option<i64>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub is_active: bool, // 计入成员负载
    pub score: Option<LeadScoreState>,
    pub stage_history: Vec<StageHistoryEntry>,
    pub updated_at: DateTime<Utc>,
}

impl CrmEntity {
    /// 创建新实体（未分配、活跃）
    pub fn new(entity_type: EntityType, entity_id: i64, data: JsonValue) -> Self {
        Self {
            entity_type,
            entity_id,
            data,
            assigned_to: None,
            assigned_at: None,
            is_active: true,
            score: None,
            stage_history: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// 读取业务字段（缺失返回 None）
    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.data.get(name)
    }

    /// 读取字符串字段
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|v| v.as_str())
    }
}
