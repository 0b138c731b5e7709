// ==========================================
// 人工分配 / 批量分配集成测试
// ==========================================


mod helpers;

#[cfg(test)]
mod manual_bulk_assignment_test {
    use crm_assign::api::ApiError;
    use crm_assign::domain::types::{Actor, AssignmentMethod, EntityType};
    use serde_json::json;

    use crate::helpers::test_data_builder::LeadBuilder;
    use crate::test_helpers::{create_test_state, seed_members};

    #[test]
    fn test_manual_assign_and_unassign() {
        let (_tmp, state) = create_test_state();
        seed_members(&state, &[(1, "Ann", true), (2, "Bob", false)]);

        state
            .entity_api
            .create(EntityType::Contact, 10, json!({ "name": "Kim" }), &Actor::System)
            .unwrap();

        // 人工分配不校验可用性
        let record = state
            .assignment_api
            .assign_manually(EntityType::Contact, 10, Some(2), &Actor::User(5), Some("客户指定"))
            .unwrap();
        assert_eq!(record.method, AssignmentMethod::Manual);
        assert_eq!(record.reason, "客户指定");
        assert_eq!(record.assigned_by, "5");
        assert_eq!(state.entity_api.get(EntityType::Contact, 10).unwrap().assigned_to, Some(2));

        let record = state
            .assignment_api
            .assign_manually(EntityType::Contact, 10, None, &Actor::User(5), None)
            .unwrap();
        assert_eq!(record.assigned_to, None);
        assert_eq!(record.reason, "manual:unassign");

        let entity = state.entity_api.get(EntityType::Contact, 10).unwrap();
        assert_eq!(entity.assigned_to, None);
        assert_eq!(entity.assigned_at, None);

        // 创建时兜底 + 两次人工
        let history = state.assignment_api.history(EntityType::Contact, 10).unwrap();
        let methods: Vec<_> = history.iter().map(|r| r.method).collect();
        assert_eq!(
            methods,
            vec![AssignmentMethod::Fallback, AssignmentMethod::Manual, AssignmentMethod::Manual]
        );
    }

    #[test]
    fn test_manual_assign_rejects_unknown_member_or_entity() {
        let (_tmp, state) = create_test_state();
        seed_members(&state, &[(1, "Ann", true)]);
        state
            .entity_api
            .create(EntityType::Task, 1, json!({}), &Actor::System)
            .unwrap();

        assert!(matches!(
            state.assignment_api.assign_manually(EntityType::Task, 1, Some(99), &Actor::System, None),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            state.assignment_api.assign_manually(EntityType::Task, 404, Some(1), &Actor::System, None),
            Err(ApiError::NotFound(_))
        ));

        // 失败的人工分配不写历史
        assert_eq!(state.assignment_api.history(EntityType::Task, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_bulk_assign_partial_failure() {
        let (_tmp, state) = create_test_state();
        seed_members(&state, &[(1, "Ann", true), (2, "Bob", true)]);

        for id in [1, 2, 3] {
            state
                .entity_api
                .create(EntityType::Deal, id, json!({ "title": format!("deal {}", id) }), &Actor::System)
                .unwrap();
        }

        let result = state
            .assignment_api
            .bulk_assign(EntityType::Deal, &[1, 2, 777, 3], 2, &Actor::User(8))
            .unwrap();
        assert_eq!(result.total, 4);
        assert_eq!(result.updated, 3);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].entity_id, 777);

        for id in [1, 2, 3] {
            let entity = state.entity_api.get(EntityType::Deal, id).unwrap();
            assert_eq!(entity.assigned_to, Some(2));
            let last = state
                .assignment_api
                .current_assignment(EntityType::Deal, id)
                .unwrap()
                .unwrap();
            assert_eq!(last.method, AssignmentMethod::Bulk);
            assert_eq!(last.reason, "bulk");
        }
    }

    #[test]
    fn test_bulk_assign_unknown_member_fails_whole_call() {
        let (_tmp, state) = create_test_state();
        seed_members(&state, &[(1, "Ann", true)]);
        state
            .entity_api
            .create(EntityType::Task, 1, json!({}), &Actor::System)
            .unwrap();

        assert!(matches!(
            state.assignment_api.bulk_assign(EntityType::Task, &[1], 50, &Actor::System),
            Err(ApiError::NotFound(_))
        ));
        assert_eq!(state.entity_api.get(EntityType::Task, 1).unwrap().assigned_to, Some(1));
    }

    #[test]
    fn test_bulk_assign_rescores_leads() {
        let (_tmp, state) = create_test_state();
        seed_members(&state, &[(1, "Ann", true), (2, "Bob", true)]);

        state
            .entity_api
            .create(EntityType::Lead, 1, LeadBuilder::new("L").stage("new").build(), &Actor::System)
            .unwrap();
        let before = state.lead_api.get_score(1).unwrap().unwrap();

        let result = state
            .assignment_api
            .bulk_assign(EntityType::Lead, &[1], 2, &Actor::System)
            .unwrap();
        assert_eq!(result.updated, 1);

        let after = state.lead_api.get_score(1).unwrap().unwrap();
        assert_eq!(after.total, before.total);
        assert!(after.calculated_at >= before.calculated_at);
    }

    #[test]
    fn test_bulk_assign_empty_list() {
        let (_tmp, state) = create_test_state();
        seed_members(&state, &[(1, "Ann", true)]);

        let result = state
            .assignment_api
            .bulk_assign(EntityType::Lead, &[], 1, &Actor::System)
            .unwrap();
        assert_eq!(result.total, 0);
        assert_eq!(result.updated, 0);
        assert!(result.failures.is_empty());
    }
}
