mod support;

use recordstore_core::{
    ConditionError, Conditions, Criterion, FieldValue, Record, RecordRepository, StoreError,
};
use serde_json::json;
use support::{employee, ids, open_store, seed_employees, seeded_store, DEPARTMENTS, EMPLOYEES};

#[test]
fn insert_then_read_all_roundtrip() {
    let store = seeded_store();

    let all = store.read_all(EMPLOYEES).unwrap();
    assert_eq!(all, seed_employees());
}

#[test]
fn read_filters_by_equality_on_several_attributes() {
    let store = seeded_store();

    let engineering = store
        .read(EMPLOYEES, &Conditions::new().eq("department", "Engineering"))
        .unwrap();
    assert_eq!(ids(&engineering), vec![1, 3]);

    let alice = store
        .read(
            EMPLOYEES,
            &Conditions::new()
                .eq("first_name", "Alice")
                .eq("department", "Engineering"),
        )
        .unwrap();
    assert_eq!(ids(&alice), vec![3]);
}

#[test]
fn read_supports_every_operator() {
    let store = seeded_store();
    let cases = [
        (json!({"id": {"gt": 1}}), vec![2, 3]),
        (json!({"id": {"lt": 2}}), vec![1]),
        (json!({"id": {"lte": 3}}), vec![1, 2, 3]),
        (json!({"id": {"gte": 3}}), vec![3]),
        (json!({"id": {"neq": 2}}), vec![1, 3]),
        (json!({"first_name": {"contains": "Jane"}}), vec![2]),
        (json!({"id": {"in_": [1, 3]}}), vec![1, 3]),
        (json!({"email": {"regex": ".*@example.com"}}), vec![1, 2, 3]),
    ];

    for (description, expected) in cases {
        let conditions = Conditions::from_json(&description).unwrap();
        let records = store.read(EMPLOYEES, &conditions).unwrap();
        assert_eq!(ids(&records), expected, "conditions {description}");
    }
}

#[test]
fn real_operands_compare_numerically_against_integer_keys() {
    let store = seeded_store();

    let below = store
        .read(
            EMPLOYEES,
            &Conditions::from_json(&json!({"id": {"lt": 2.5}})).unwrap(),
        )
        .unwrap();
    assert_eq!(ids(&below), vec![1, 2]);

    let exact = store
        .read(EMPLOYEES, &Conditions::from_json(&json!({"id": 1.0})).unwrap())
        .unwrap();
    assert_eq!(ids(&exact), vec![1]);
}

#[test]
fn insert_still_rejects_real_value_for_integer_key() {
    let mut store = open_store();

    let err = store
        .insert(EMPLOYEES, Record::new().with("id", 1.5))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord { .. }));
}

#[test]
fn in_with_empty_list_matches_nothing() {
    let store = seeded_store();

    let none = store
        .read(EMPLOYEES, &Conditions::new().with("id", Criterion::In(Vec::new())))
        .unwrap();
    assert!(none.is_empty());

    let one = store
        .read(
            EMPLOYEES,
            &Conditions::new().with(
                "id",
                Criterion::In(vec![FieldValue::Integer(2), FieldValue::Integer(99)]),
            ),
        )
        .unwrap();
    assert_eq!(ids(&one), vec![2]);
}

#[test]
fn contains_matches_substring_in_the_middle() {
    let store = seeded_store();

    let records = store
        .read(
            EMPLOYEES,
            &Conditions::new().with("email", Criterion::Contains(FieldValue::from("johnson@exa"))),
        )
        .unwrap();
    assert_eq!(ids(&records), vec![3]);
}

#[test]
fn contains_does_not_treat_like_wildcards_specially() {
    let store = seeded_store();

    let records = store
        .read(
            EMPLOYEES,
            &Conditions::new().with("email", Criterion::Contains(FieldValue::from("%"))),
        )
        .unwrap();
    assert!(records.is_empty());
}

#[test]
fn regex_uses_search_semantics() {
    let store = seeded_store();

    let middle = store
        .read(
            EMPLOYEES,
            &Conditions::new().with("email", Criterion::Regex("e\\.sm".to_string())),
        )
        .unwrap();
    assert_eq!(ids(&middle), vec![2]);

    let anchored = store
        .read(
            EMPLOYEES,
            &Conditions::new().with("email", Criterion::Regex("^smith".to_string())),
        )
        .unwrap();
    assert!(anchored.is_empty());
}

#[test]
fn read_with_unknown_attribute_fails_before_execution() {
    let store = seeded_store();

    let err = store
        .read(EMPLOYEES, &Conditions::new().with("salary", Criterion::In(Vec::new())))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Condition(ConditionError::UnknownAttribute { ref attribute, .. })
            if attribute == "salary"
    ));
}

#[test]
fn duplicate_primary_key_is_reported_and_rolled_back() {
    let mut store = open_store();
    let first = employee(1, "John", "Doe", "Engineering");
    store.insert(EMPLOYEES, first.clone()).unwrap();

    let err = store
        .insert(EMPLOYEES, employee(1, "Johnny", "Other", "Sales"))
        .unwrap_err();
    assert!(err.is_duplicate_key());
    assert!(err.is_recoverable());

    assert_eq!(store.read_all(EMPLOYEES).unwrap(), vec![first]);
}

#[test]
fn duplicate_unique_attribute_is_a_duplicate_key() {
    let mut store = open_store();
    store
        .insert(DEPARTMENTS, support::department(1, "Engineering", "Building A"))
        .unwrap();

    let err = store
        .insert(DEPARTMENTS, support::department(2, "Engineering", "Building B"))
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { ref collection, .. } if collection == DEPARTMENTS));
    assert_eq!(store.read_all(DEPARTMENTS).unwrap().len(), 1);
}

#[test]
fn omitted_integer_key_is_generated() {
    let mut store = open_store();
    store
        .insert(EMPLOYEES, employee(7, "Seed", "Row", "Ops"))
        .unwrap();

    let id = store
        .insert(EMPLOYEES, Record::new().with("first_name", "Auto"))
        .unwrap();
    assert_eq!(id, FieldValue::Integer(8));

    let loaded = store.read(EMPLOYEES, &Conditions::new().eq("id", 8)).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].value("first_name"), &FieldValue::from("Auto"));
    assert_eq!(loaded[0].value("email"), &FieldValue::Null);
}

#[test]
fn insert_rejects_records_that_do_not_fit_schema() {
    let mut store = open_store();

    let unknown = store
        .insert(EMPLOYEES, Record::new().with("id", 1).with("salary", 10))
        .unwrap_err();
    assert!(matches!(unknown, StoreError::InvalidRecord { .. }));

    let mistyped = store
        .insert(EMPLOYEES, Record::new().with("id", "one"))
        .unwrap_err();
    assert!(matches!(mistyped, StoreError::InvalidRecord { .. }));

    assert!(store.read_all(EMPLOYEES).unwrap().is_empty());
}

#[test]
fn update_changes_only_matching_records() {
    let mut store = seeded_store();
    let before = store.read_all(EMPLOYEES).unwrap();

    let changed = store
        .update(
            EMPLOYEES,
            &Conditions::new().eq("id", 1),
            &Record::new().with("email", "x@y.com"),
        )
        .unwrap();
    assert_eq!(changed, 1);

    let updated = store.read(EMPLOYEES, &Conditions::new().eq("id", 1)).unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].value("email"), &FieldValue::from("x@y.com"));

    let after = store.read_all(EMPLOYEES).unwrap();
    assert_eq!(after[1..], before[1..]);
}

#[test]
fn update_with_operator_conditions_reports_affected_rows() {
    let mut store = seeded_store();

    let changed = store
        .update(
            EMPLOYEES,
            &Conditions::from_json(&json!({"id": {"gte": 2}})).unwrap(),
            &Record::new().with("department", "Sales"),
        )
        .unwrap();
    assert_eq!(changed, 2);

    let sales = store
        .read(EMPLOYEES, &Conditions::new().eq("department", "Sales"))
        .unwrap();
    assert_eq!(ids(&sales), vec![2, 3]);
}

#[test]
fn update_matching_nothing_is_a_successful_noop() {
    let mut store = seeded_store();

    let changed = store
        .update(
            EMPLOYEES,
            &Conditions::new().eq("id", 42),
            &Record::new().with("email", "nobody@example.com"),
        )
        .unwrap();
    assert_eq!(changed, 0);
    assert_eq!(store.read_all(EMPLOYEES).unwrap(), seed_employees());
}

#[test]
fn update_into_existing_key_is_duplicate_and_leaves_data_intact() {
    let mut store = seeded_store();

    let err = store
        .update(
            EMPLOYEES,
            &Conditions::new().eq("id", 3),
            &Record::new().with("id", 1),
        )
        .unwrap_err();
    assert!(err.is_duplicate_key());
    assert_eq!(store.read_all(EMPLOYEES).unwrap(), seed_employees());
}

#[test]
fn update_rejects_null_primary_key_and_unknown_fields() {
    let mut store = seeded_store();

    let null_key = store
        .update(
            EMPLOYEES,
            &Conditions::new().eq("id", 1),
            &Record::new().with("id", FieldValue::Null),
        )
        .unwrap_err();
    assert!(matches!(null_key, StoreError::InvalidRecord { .. }));

    let unknown = store
        .update(
            EMPLOYEES,
            &Conditions::new().eq("id", 1),
            &Record::new().with("salary", 1),
        )
        .unwrap_err();
    assert!(matches!(unknown, StoreError::InvalidRecord { .. }));
}

#[test]
fn empty_patch_touches_nothing() {
    let mut store = seeded_store();

    let changed = store
        .update(EMPLOYEES, &Conditions::new(), &Record::new())
        .unwrap();
    assert_eq!(changed, 0);
}

#[test]
fn delete_removes_matches_and_reports_count() {
    let mut store = seeded_store();

    let removed = store
        .delete(EMPLOYEES, &Conditions::new().eq("id", 1))
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(ids(&store.read_all(EMPLOYEES).unwrap()), vec![2, 3]);
}

#[test]
fn delete_matching_nothing_leaves_contents_unchanged() {
    let mut store = seeded_store();

    let removed = store
        .delete(EMPLOYEES, &Conditions::new().eq("last_name", "Nobody"))
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(store.read_all(EMPLOYEES).unwrap(), seed_employees());
}

#[test]
fn delete_with_empty_conditions_clears_collection() {
    let mut store = seeded_store();

    assert_eq!(store.delete(EMPLOYEES, &Conditions::new()).unwrap(), 3);
    assert!(store.read_all(EMPLOYEES).unwrap().is_empty());
}

#[test]
fn unknown_collection_is_rejected() {
    let mut store = open_store();

    let err = store.insert("projects", Record::new().with("id", 1)).unwrap_err();
    assert!(matches!(err, StoreError::UnknownCollection(ref name) if name == "projects"));
}

#[test]
fn operations_after_close_fail_with_closed() {
    let mut store = seeded_store();
    store.close().unwrap();

    assert!(matches!(store.read_all(EMPLOYEES), Err(StoreError::Closed)));
    assert!(matches!(
        store.insert(EMPLOYEES, employee(4, "Late", "Comer", "Ops")),
        Err(StoreError::Closed)
    ));
    assert!(matches!(
        store.update(EMPLOYEES, &Conditions::new(), &Record::new().with("email", "x")),
        Err(StoreError::Closed)
    ));
    assert!(matches!(
        store.delete(EMPLOYEES, &Conditions::new()),
        Err(StoreError::Closed)
    ));
    assert!(matches!(store.close(), Err(StoreError::Closed)));
}
