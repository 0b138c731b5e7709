// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

use crm_assign::domain::rule::{ConditionDraft, RuleDraft};
use crm_assign::domain::types::{ConditionOperator, EntityType};
use serde_json::{json, Map, Value as JsonValue};

// ==========================================
// Lead 数据构建器
// ==========================================

pub struct LeadBuilder {
    data: Map<String, JsonValue>,
}

impl LeadBuilder {
    pub fn new(name: &str) -> Self {
        let mut data = Map::new();
        data.insert("name".to_string(), json!(name));
        Self { data }
    }

    pub fn field(mut self, key: &str, value: JsonValue) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn value(self, value: f64) -> Self {
        self.field("value", json!(value))
    }

    pub fn stage(self, stage: &str) -> Self {
        self.field("stage", json!(stage))
    }

    pub fn source(self, source: &str) -> Self {
        self.field("source", json!(source))
    }

    pub fn industry(self, industry: &str) -> Self {
        self.field("industry", json!(industry))
    }

    /// 9 个完整度字段全部填写
    pub fn complete_profile(self) -> Self {
        self.field("email", json!("lead@example.com"))
            .field("phone", json!("555-0100"))
            .field("company", json!("Acme"))
            .field("title", json!("CTO"))
            .field("source", json!("web"))
            .field("industry", json!("software"))
            .field("website", json!("https://acme.example"))
            .field("notes", json!("warm intro"))
    }

    pub fn fully_qualified(self) -> Self {
        self.field(
            "qualification",
            json!({
                "budget": true,
                "authority": true,
                "need": true,
                "timeline": true,
                "decision_process": true,
                "competition": true,
                "fit": true
            }),
        )
    }

    pub fn build(self) -> JsonValue {
        JsonValue::Object(self.data)
    }
}

// ==========================================
// Deal 数据构建器
// ==========================================

pub fn deal_data(title: &str, value: f64, stage: &str) -> JsonValue {
    json!({ "title": title, "value": value, "stage": stage })
}

// ==========================================
// RuleDraft 构建器
// ==========================================

pub struct RuleBuilder {
    draft: RuleDraft,
}

impl RuleBuilder {
    pub fn new(name: &str, entity_type: EntityType) -> Self {
        Self {
            draft: RuleDraft {
                name: Some(name.to_string()),
                entity_type: Some(entity_type.to_db_str().to_string()),
                ..Default::default()
            },
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.draft.priority = Some(priority);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.draft.is_active = Some(false);
        self
    }

    pub fn fallback_strategy(mut self, strategy: &str) -> Self {
        self.draft.fallback_strategy = Some(strategy.to_string());
        self
    }

    pub fn condition(
        mut self,
        field: &str,
        operator: ConditionOperator,
        value: JsonValue,
        target_member_id: i64,
    ) -> Self {
        self.draft
            .conditions
            .push(ConditionDraft::new(field, operator, value, target_member_id));
        self
    }

    pub fn build(self) -> RuleDraft {
        self.draft
    }
}
