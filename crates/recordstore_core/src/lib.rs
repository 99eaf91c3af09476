//! Condition-scoped record storage over SQLite.
//!
//! Callers declare collections as `EntitySchema`s, describe filters as
//! `Conditions`, and run CRUD through a `RecordRepository`. Conditions are
//! translated into typed predicates before any SQL is executed.

pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use db::{ConnectionOptions, DbError, DbLocation, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::record::{Patch, Record};
pub use model::schema::{Attribute, AttributeId, AttributeType, EntitySchema, SchemaError};
pub use model::value::FieldValue;
pub use query::condition::{ConditionError, Conditions, Criterion, Operator};
pub use query::translate::{matches_all, render_where, translate, Comparison, Predicate};
pub use repo::record_repo::{RecordRepository, SqliteRecordStore, StoreError, StoreResult};
pub use service::record_service::{RecordService, UpsertOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
