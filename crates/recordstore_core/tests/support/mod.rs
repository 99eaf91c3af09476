use recordstore_core::{AttributeType, EntitySchema, Record, RecordRepository, SqliteRecordStore};

pub const EMPLOYEES: &str = "employees";
pub const DEPARTMENTS: &str = "departments";

pub fn employees_schema() -> EntitySchema {
    EntitySchema::builder(EMPLOYEES)
        .primary_key("id", AttributeType::Integer)
        .attribute("first_name", AttributeType::Text)
        .attribute("last_name", AttributeType::Text)
        .attribute("email", AttributeType::Text)
        .attribute("department", AttributeType::Text)
        .build()
        .unwrap()
}

pub fn departments_schema() -> EntitySchema {
    EntitySchema::builder(DEPARTMENTS)
        .primary_key("id", AttributeType::Integer)
        .unique("name", AttributeType::Text)
        .attribute("location", AttributeType::Text)
        .build()
        .unwrap()
}

pub fn employee(id: i64, first: &str, last: &str, department: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("first_name", first)
        .with("last_name", last)
        .with(
            "email",
            format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
        )
        .with("department", department)
}

pub fn department(id: i64, name: &str, location: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("name", name)
        .with("location", location)
}

pub fn open_store() -> SqliteRecordStore {
    SqliteRecordStore::open_in_memory([employees_schema(), departments_schema()]).unwrap()
}

/// Store holding John (1), Jane (2) and Alice (3).
pub fn seeded_store() -> SqliteRecordStore {
    let mut store = open_store();
    for record in seed_employees() {
        store.insert(EMPLOYEES, record).unwrap();
    }
    store
}

pub fn seed_employees() -> Vec<Record> {
    vec![
        employee(1, "John", "Doe", "Engineering"),
        employee(2, "Jane", "Smith", "Marketing"),
        employee(3, "Alice", "Johnson", "Engineering"),
    ]
}

pub fn ids(records: &[Record]) -> Vec<i64> {
    records
        .iter()
        .map(|record| record.value("id").as_integer().unwrap())
        .collect()
}
