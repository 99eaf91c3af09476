mod support;

use recordstore_core::{
    Conditions, FieldValue, Record, RecordRepository, RecordService, StoreError, UpsertOutcome,
};
use support::{department, employee, ids, open_store, seeded_store, DEPARTMENTS, EMPLOYEES};

#[test]
fn insert_or_ignore_skips_duplicates() {
    let mut service = RecordService::new(seeded_store());

    let skipped = service
        .insert_or_ignore(EMPLOYEES, employee(1, "Other", "Person", "Ops"))
        .unwrap();
    assert_eq!(skipped, None);

    let inserted = service
        .insert_or_ignore(EMPLOYEES, employee(4, "Bob", "Brown", "Ops"))
        .unwrap();
    assert_eq!(inserted, Some(FieldValue::Integer(4)));

    let all = service.repository().read_all(EMPLOYEES).unwrap();
    assert_eq!(ids(&all), vec![1, 2, 3, 4]);
    assert_eq!(all[0].value("first_name"), &FieldValue::from("John"));
}

#[test]
fn insert_or_ignore_passes_other_errors_through() {
    let mut service = RecordService::new(open_store());

    let err = service
        .insert_or_ignore("projects", Record::new().with("id", 1))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownCollection(_)));
}

#[test]
fn upsert_inserts_then_updates_by_key() {
    let mut service = RecordService::new(open_store());

    let first = service
        .upsert(EMPLOYEES, employee(1, "John", "Doe", "Engineering"))
        .unwrap();
    assert_eq!(first, UpsertOutcome::Inserted(FieldValue::Integer(1)));

    let second = service
        .upsert(
            EMPLOYEES,
            Record::new().with("id", 1).with("department", "Sales"),
        )
        .unwrap();
    assert_eq!(second, UpsertOutcome::Updated(FieldValue::Integer(1)));

    let stored = service
        .repository()
        .read(EMPLOYEES, &Conditions::new().eq("id", 1))
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value("department"), &FieldValue::from("Sales"));
    assert_eq!(stored[0].value("first_name"), &FieldValue::from("John"));
}

#[test]
fn upsert_with_only_existing_key_is_an_update() {
    let mut service = RecordService::new(seeded_store());

    let outcome = service
        .upsert(EMPLOYEES, Record::new().with("id", 2))
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated(FieldValue::Integer(2)));
}

#[test]
fn upsert_reports_unique_collision_on_other_record() {
    let mut service = RecordService::new(open_store());
    service
        .repository_mut()
        .insert(DEPARTMENTS, department(1, "Engineering", "Building A"))
        .unwrap();

    let err = service
        .upsert(DEPARTMENTS, department(2, "Engineering", "Building B"))
        .unwrap_err();
    assert!(err.is_duplicate_key());

    let stored = service.into_inner().read_all(DEPARTMENTS).unwrap();
    assert_eq!(ids(&stored), vec![1]);
}

#[test]
fn upsert_update_path_can_still_hit_unique_collision() {
    let mut service = RecordService::new(open_store());
    service
        .upsert(DEPARTMENTS, department(1, "Engineering", "Building A"))
        .unwrap();
    service
        .upsert(DEPARTMENTS, department(2, "Marketing", "Building B"))
        .unwrap();

    let err = service
        .upsert(DEPARTMENTS, department(2, "Engineering", "Building C"))
        .unwrap_err();
    assert!(err.is_duplicate_key());

    let marketing = service
        .repository()
        .read(DEPARTMENTS, &Conditions::new().eq("id", 2))
        .unwrap();
    assert_eq!(marketing[0].value("name"), &FieldValue::from("Marketing"));
}
