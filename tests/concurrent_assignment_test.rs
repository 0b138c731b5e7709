// ==========================================
// 并发分配测试
// ==========================================
// 职责: 多线程共享同一 AppState 时分配与历史保持一致
// ==========================================


#[cfg(test)]
mod concurrent_assignment_test {
    use crm_assign::domain::types::{Actor, EntityType};
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    use crate::test_helpers::{create_test_state, seed_members};

    const THREADS: i64 = 4;
    const PER_THREAD: i64 = 10;

    #[test]
    fn test_concurrent_creates_keep_history_consistent() {
        let (_tmp, state) = create_test_state();
        seed_members(&state, &[(1, "Ann", true), (2, "Bob", true)]);
        let state = Arc::new(state);

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        let id = t * PER_THREAD + i;
                        let created = state
                            .entity_api
                            .create(EntityType::Task, id, json!({ "n": id }), &Actor::User(t))
                            .unwrap();
                        assert!(created.assignment.is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let total = (THREADS * PER_THREAD) as u64;
        let stats = state.assignment_api.history_stats().unwrap();
        assert_eq!(stats.total, total);
        assert_eq!(stats.fallback, total);

        // 每个实体恰有一条分配历史
        for id in 0..THREADS * PER_THREAD {
            assert_eq!(state.assignment_api.history(EntityType::Task, id).unwrap().len(), 1);
        }

        let listed = state.team_api.list_members_with_workload().unwrap();
        let sum: u32 = listed.iter().map(|m| m.workload.total()).sum();
        assert_eq!(sum as u64, total);
    }

    #[test]
    fn test_concurrent_bulk_and_manual_assignments() {
        let (_tmp, state) = create_test_state();
        seed_members(&state, &[(1, "Ann", true), (2, "Bob", true)]);
        for id in 0..20 {
            state
                .entity_api
                .create(EntityType::Contact, id, json!({}), &Actor::System)
                .unwrap();
        }
        let state = Arc::new(state);

        let bulk = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                let ids: Vec<i64> = (0..10).collect();
                state
                    .assignment_api
                    .bulk_assign(EntityType::Contact, &ids, 2, &Actor::User(1))
                    .unwrap()
            })
        };
        let manual = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for id in 10..20 {
                    state
                        .assignment_api
                        .assign_manually(EntityType::Contact, id, Some(1), &Actor::User(2), None)
                        .unwrap();
                }
            })
        };

        let result = bulk.join().unwrap();
        manual.join().unwrap();
        assert_eq!(result.updated, 10);

        for id in 0..10 {
            assert_eq!(state.entity_api.get(EntityType::Contact, id).unwrap().assigned_to, Some(2));
        }
        for id in 10..20 {
            assert_eq!(state.entity_api.get(EntityType::Contact, id).unwrap().assigned_to, Some(1));
        }

        let stats = state.assignment_api.history_stats().unwrap();
        assert_eq!(stats.total, 40);
        assert_eq!(stats.bulk, 10);
        assert_eq!(stats.manual, 10);
    }
}
