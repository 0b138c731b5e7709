use super::AssignmentHistoryRepository;
use crate::domain::assignment::AssignmentRecord;
use crate::domain::types::{Actor, AssignmentMethod, EntityType};
use std::sync::{Arc, Mutex};

fn setup_repo() -> AssignmentHistoryRepository {
    let conn = crate::db::open_in_memory_with_schema().unwrap();
    AssignmentHistoryRepository::new(Arc::new(Mutex::new(conn)))
}

fn make_record(
    entity_type: EntityType,
    entity_id: i64,
    assigned_to: Option<i64>,
    method: AssignmentMethod,
) -> AssignmentRecord {
    AssignmentRecord::new(
        entity_type,
        entity_id,
        assigned_to,
        &Actor::System,
        method,
        "test",
    )
}

#[test]
fn test_append_and_find_by_entity_in_order() {
    let repo = setup_repo();

    let first = make_record(EntityType::Lead, 1, Some(10), AssignmentMethod::Rule);
    let second = make_record(EntityType::Lead, 1, Some(11), AssignmentMethod::Manual);
    let other = make_record(EntityType::Lead, 2, Some(10), AssignmentMethod::Fallback);

    let seq1 = repo.append(&first).unwrap();
    repo.append(&other).unwrap();
    let seq2 = repo.append(&second).unwrap();
    assert!(seq2 > seq1);

    let records = repo.find_by_entity(EntityType::Lead, 1).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].record_id, first.record_id);
    assert_eq!(records[1].record_id, second.record_id);
    assert_eq!(records[1].method, AssignmentMethod::Manual);

    let latest = repo.latest_for_entity(EntityType::Lead, 1).unwrap().unwrap();
    assert_eq!(latest.assigned_to, Some(11));
}

#[test]
fn test_find_by_entity_empty() {
    let repo = setup_repo();
    assert!(repo.find_by_entity(EntityType::Deal, 99).unwrap().is_empty());
    assert!(repo.latest_for_entity(EntityType::Deal, 99).unwrap().is_none());
}

#[test]
fn test_same_id_different_type_is_separate() {
    let repo = setup_repo();
    repo.append(&make_record(EntityType::Lead, 5, Some(1), AssignmentMethod::Rule))
        .unwrap();
    repo.append(&make_record(EntityType::Task, 5, Some(2), AssignmentMethod::Rule))
        .unwrap();

    assert_eq!(repo.find_by_entity(EntityType::Lead, 5).unwrap().len(), 1);
    assert_eq!(repo.find_by_entity(EntityType::Task, 5).unwrap().len(), 1);
}

#[test]
fn test_find_recent_newest_first() {
    let repo = setup_repo();
    for id in 1..=5 {
        repo.append(&make_record(EntityType::Contact, id, Some(1), AssignmentMethod::Fallback))
            .unwrap();
    }

    let recent = repo.find_recent(3).unwrap();
    let ids: Vec<i64> = recent.iter().map(|r| r.entity_id).collect();
    assert_eq!(ids, vec![5, 4, 3]);
    assert_eq!(repo.find_all().unwrap().len(), 5);
    assert_eq!(repo.count().unwrap(), 5);
}

#[test]
fn test_stats() {
    let repo = setup_repo();
    repo.append(&make_record(EntityType::Lead, 1, Some(10), AssignmentMethod::Rule))
        .unwrap();
    repo.append(&make_record(EntityType::Lead, 2, Some(10), AssignmentMethod::Fallback))
        .unwrap();
    repo.append(&make_record(EntityType::Deal, 3, Some(11), AssignmentMethod::Bulk))
        .unwrap();
    repo.append(&make_record(EntityType::Deal, 3, None, AssignmentMethod::Manual))
        .unwrap();

    let stats = repo.stats().unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.rule_based, 1);
    assert_eq!(stats.fallback, 1);
    assert_eq!(stats.bulk, 1);
    assert_eq!(stats.manual, 1);
    assert_eq!(stats.by_entity_type.get("lead"), Some(&2));
    assert_eq!(stats.by_entity_type.get("deal"), Some(&2));
    assert_eq!(stats.by_member.get(&10), Some(&2));
    assert_eq!(stats.by_member.get(&11), Some(&1));
    assert_eq!(stats.unassigned, 1);
}

#[test]
fn test_duplicate_record_id_rejected() {
    let repo = setup_repo();
    let record = make_record(EntityType::Lead, 1, Some(1), AssignmentMethod::Rule);
    repo.append(&record).unwrap();
    assert!(repo.append(&record).is_err());
    assert_eq!(repo.count().unwrap(), 1);
}
