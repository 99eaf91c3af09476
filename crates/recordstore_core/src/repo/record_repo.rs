//! Record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/read/update/delete over declared collections.
//! - Scope reads and writes with translated condition predicates.
//! - Wrap every write in one transaction and classify its failures.
//!
//! # Invariants
//! - Condition and record validation happen before the connection is touched.
//! - A failed write is rolled back before its error is returned.
//! - Uniqueness collisions surface as `DuplicateKey`, never as `Storage`.
//! - Nothing is retried; nothing is swallowed.

use crate::db::schema::ensure_collection;
use crate::db::{open_location, ConnectionOptions, DbError, DbLocation};
use crate::model::record::{Patch, Record};
use crate::model::schema::{AttributeType, EntitySchema};
use crate::model::value::FieldValue;
use crate::query::condition::{ConditionError, Conditions};
use crate::query::translate::{quote_identifier, render_where, translate};
use log::{debug, error, info, warn};
use rusqlite::types::ValueRef;
use rusqlite::{ffi, params_from_iter, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error for record store operations.
#[derive(Debug)]
pub enum StoreError {
    /// The condition description could not be translated.
    Condition(ConditionError),
    /// A primary-key or unique constraint rejected the write. Recoverable.
    DuplicateKey {
        collection: String,
        message: String,
    },
    /// Generic storage failure carrying the underlying cause.
    Storage(DbError),
    /// The store was closed before this call.
    Closed,
    UnknownCollection(String),
    DuplicateCollection(String),
    /// A record or patch does not fit the collection schema.
    InvalidRecord {
        collection: String,
        message: String,
    },
    /// Persisted data does not fit the declared schema.
    InvalidData(String),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    /// Whether the caller can reasonably continue with the same store.
    ///
    /// Only uniqueness collisions qualify; every other failure means the
    /// call itself, the store state or the environment must be fixed.
    pub fn is_recoverable(&self) -> bool {
        self.is_duplicate_key()
    }

    /// Stable code used in log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Condition(ConditionError::UnknownAttribute { .. }) => "unknown_attribute",
            Self::Condition(ConditionError::UnsupportedOperator { .. }) => "unsupported_operator",
            Self::Condition(ConditionError::MalformedCondition { .. }) => "malformed_condition",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::Storage(_) => "storage_failed",
            Self::Closed => "store_closed",
            Self::UnknownCollection(_) => "unknown_collection",
            Self::DuplicateCollection(_) => "duplicate_collection",
            Self::InvalidRecord { .. } => "invalid_record",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Condition(err) => write!(f, "{err}"),
            Self::DuplicateKey {
                collection,
                message,
            } => write!(f, "duplicate key in `{collection}`: {message}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Closed => write!(f, "record store is closed"),
            Self::UnknownCollection(name) => write!(f, "unknown collection `{name}`"),
            Self::DuplicateCollection(name) => write!(f, "collection `{name}` declared twice"),
            Self::InvalidRecord {
                collection,
                message,
            } => write!(f, "invalid record for `{collection}`: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Condition(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::DuplicateKey { .. }
            | Self::Closed
            | Self::UnknownCollection(_)
            | Self::DuplicateCollection(_)
            | Self::InvalidRecord { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<ConditionError> for StoreError {
    fn from(value: ConditionError) -> Self {
        Self::Condition(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}

/// Repository interface for condition-scoped record CRUD.
pub trait RecordRepository {
    /// Returns the declared schema of `collection`.
    fn schema(&self, collection: &str) -> StoreResult<&EntitySchema>;

    /// Persists `record` and returns its primary identifier.
    fn insert(&mut self, collection: &str, record: Record) -> StoreResult<FieldValue>;

    /// Returns every record matching `conditions`; empty conditions match all.
    fn read(&self, collection: &str, conditions: &Conditions) -> StoreResult<Vec<Record>>;

    /// Applies `patch` to every match and returns the affected-row count.
    fn update(
        &mut self,
        collection: &str,
        conditions: &Conditions,
        patch: &Patch,
    ) -> StoreResult<usize>;

    /// Removes every match and returns the affected-row count.
    fn delete(&mut self, collection: &str, conditions: &Conditions) -> StoreResult<usize>;

    /// Releases the connection. Every later call fails with `Closed`.
    fn close(&mut self) -> StoreResult<()>;

    fn read_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.read(collection, &Conditions::new())
    }
}

/// SQLite-backed record store owning one connection.
///
/// Not internally synchronized: calls are expected from one logical owner.
pub struct SqliteRecordStore {
    location: DbLocation,
    options: ConnectionOptions,
    collections: BTreeMap<String, EntitySchema>,
    conn: Option<Connection>,
}

impl SqliteRecordStore {
    /// Opens `location` and prepares every declared collection.
    ///
    /// # Errors
    /// - `DuplicateCollection` when two schemas share a name.
    /// - `Storage` when opening or collection setup fails.
    pub fn open(
        location: DbLocation,
        options: ConnectionOptions,
        schemas: impl IntoIterator<Item = EntitySchema>,
    ) -> StoreResult<Self> {
        let mut collections = BTreeMap::new();
        for schema in schemas {
            let name = schema.name().to_string();
            if collections.insert(name.clone(), schema).is_some() {
                return Err(StoreError::DuplicateCollection(name));
            }
        }

        let conn = connect(&location, &options, &collections)?;
        info!(
            "event=store_open module=repo status=ok mode={} collections={}",
            location.mode(),
            collections.len()
        );
        Ok(Self {
            location,
            options,
            collections,
            conn: Some(conn),
        })
    }

    /// Opens a private in-memory store with default options.
    pub fn open_in_memory(schemas: impl IntoIterator<Item = EntitySchema>) -> StoreResult<Self> {
        Self::open(DbLocation::Memory, ConnectionOptions::default(), schemas)
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Replaces the connection with a freshly bootstrapped one.
    ///
    /// The old connection stays in place when the new one cannot be opened.
    /// An in-memory store starts over empty.
    pub fn reconnect(&mut self) -> StoreResult<()> {
        if self.conn.is_none() {
            return Err(StoreError::Closed);
        }

        let fresh = connect(&self.location, &self.options, &self.collections)?;
        if let Some(previous) = self.conn.replace(fresh) {
            if let Err((_, err)) = previous.close() {
                warn!(
                    "event=store_reconnect module=repo status=warn error_code=close_failed error={}",
                    err
                );
            }
        }
        info!(
            "event=store_reconnect module=repo status=ok mode={}",
            self.location.mode()
        );
        Ok(())
    }
}

impl RecordRepository for SqliteRecordStore {
    fn schema(&self, collection: &str) -> StoreResult<&EntitySchema> {
        lookup(&self.collections, collection)
    }

    fn insert(&mut self, collection: &str, record: Record) -> StoreResult<FieldValue> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<FieldValue> {
            let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
            let schema = lookup(&self.collections, collection)?;
            let plan = plan_insert(schema, &record)?;

            run_in_transaction(conn, collection, |tx| {
                tx.execute(&plan.sql, params_from_iter(plan.values.iter()))?;
                Ok(plan
                    .primary_key
                    .clone()
                    .unwrap_or_else(|| FieldValue::Integer(tx.last_insert_rowid())))
            })
        })();

        log_write("record_insert", collection, started_at, result.as_ref().map(|_| 1));
        result
    }

    fn read(&self, collection: &str, conditions: &Conditions) -> StoreResult<Vec<Record>> {
        let started_at = Instant::now();
        let conn = self.conn.as_ref().ok_or(StoreError::Closed)?;
        let schema = lookup(&self.collections, collection)?;
        let predicates = translate(schema, conditions)?;
        let (where_sql, binds) = render_where(&predicates);

        let columns = schema
            .attributes()
            .iter()
            .map(|attribute| quote_identifier(&attribute.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM {}{where_sql} ORDER BY {} ASC;",
            quote_identifier(schema.name()),
            quote_identifier(&schema.primary_key().name)
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(schema, row)?);
        }

        debug!(
            "event=record_read module=repo status=ok collection={} predicates={} rows={} duration_ms={}",
            collection,
            predicates.len(),
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(records)
    }

    fn update(
        &mut self,
        collection: &str,
        conditions: &Conditions,
        patch: &Patch,
    ) -> StoreResult<usize> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<usize> {
            let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
            let schema = lookup(&self.collections, collection)?;
            let predicates = translate(schema, conditions)?;
            let assignments = admit_patch(schema, patch)?;
            if assignments.is_empty() {
                return Ok(0);
            }

            let set_sql = assignments
                .iter()
                .map(|(column, _)| format!("{} = ?", quote_identifier(column)))
                .collect::<Vec<_>>()
                .join(", ");
            let (where_sql, where_binds) = render_where(&predicates);
            let sql = format!(
                "UPDATE {} SET {set_sql}{where_sql};",
                quote_identifier(schema.name())
            );
            let binds = assignments
                .into_iter()
                .map(|(_, value)| value)
                .chain(where_binds)
                .collect::<Vec<_>>();

            run_in_transaction(conn, collection, |tx| {
                tx.execute(&sql, params_from_iter(binds.iter()))
            })
        })();

        log_write("record_update", collection, started_at, result.as_ref().copied());
        result
    }

    fn delete(&mut self, collection: &str, conditions: &Conditions) -> StoreResult<usize> {
        let started_at = Instant::now();
        let result = (|| -> StoreResult<usize> {
            let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
            let schema = lookup(&self.collections, collection)?;
            let predicates = translate(schema, conditions)?;
            let (where_sql, binds) = render_where(&predicates);
            let sql = format!("DELETE FROM {}{where_sql};", quote_identifier(schema.name()));

            run_in_transaction(conn, collection, |tx| {
                tx.execute(&sql, params_from_iter(binds.iter()))
            })
        })();

        log_write("record_delete", collection, started_at, result.as_ref().copied());
        result
    }

    fn close(&mut self) -> StoreResult<()> {
        let conn = self.conn.take().ok_or(StoreError::Closed)?;
        match conn.close() {
            Ok(()) => {
                info!("event=store_close module=repo status=ok");
                Ok(())
            }
            Err((_, err)) => {
                error!(
                    "event=store_close module=repo status=error error_code=close_failed error={}",
                    err
                );
                Err(err.into())
            }
        }
    }
}

struct InsertPlan {
    sql: String,
    values: Vec<FieldValue>,
    /// `None` when the key is generated by SQLite.
    primary_key: Option<FieldValue>,
}

fn connect(
    location: &DbLocation,
    options: &ConnectionOptions,
    collections: &BTreeMap<String, EntitySchema>,
) -> StoreResult<Connection> {
    let conn = open_location(location, options)?;
    for schema in collections.values() {
        ensure_collection(&conn, schema, options.create_missing_collections)?;
    }
    Ok(conn)
}

fn lookup<'a>(
    collections: &'a BTreeMap<String, EntitySchema>,
    collection: &str,
) -> StoreResult<&'a EntitySchema> {
    collections
        .get(collection)
        .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
}

fn plan_insert(schema: &EntitySchema, record: &Record) -> StoreResult<InsertPlan> {
    let key_name = schema.primary_key().name.as_str();
    let mut columns = Vec::new();
    let mut values = Vec::new();
    let mut primary_key = None;

    for (name, value) in admit_fields(schema, record)? {
        if name == key_name {
            if value.is_null() {
                continue;
            }
            primary_key = Some(value.clone());
        }
        columns.push(quote_identifier(name));
        values.push(value);
    }

    if primary_key.is_none() && schema.primary_key().kind != AttributeType::Integer {
        return Err(StoreError::InvalidRecord {
            collection: schema.name().to_string(),
            message: format!("primary key `{key_name}` is required"),
        });
    }

    let table = quote_identifier(schema.name());
    let sql = if columns.is_empty() {
        format!("INSERT INTO {table} DEFAULT VALUES;")
    } else {
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders});",
            columns.join(", ")
        )
    };

    Ok(InsertPlan {
        sql,
        values,
        primary_key,
    })
}

fn admit_patch<'a>(schema: &'a EntitySchema, patch: &Patch) -> StoreResult<Vec<(&'a str, FieldValue)>> {
    let assignments = admit_fields(schema, patch)?;
    let key_name = schema.primary_key().name.as_str();
    if assignments
        .iter()
        .any(|(name, value)| *name == key_name && value.is_null())
    {
        return Err(StoreError::InvalidRecord {
            collection: schema.name().to_string(),
            message: format!("primary key `{key_name}` cannot be set to null"),
        });
    }
    Ok(assignments)
}

/// Resolves every field of `record` against `schema` and coerces its value.
fn admit_fields<'a>(
    schema: &'a EntitySchema,
    record: &Record,
) -> StoreResult<Vec<(&'a str, FieldValue)>> {
    record
        .iter()
        .map(|(name, value)| -> StoreResult<(&'a str, FieldValue)> {
            let id = schema.resolve(name).ok_or_else(|| StoreError::InvalidRecord {
                collection: schema.name().to_string(),
                message: format!("unknown attribute `{name}`"),
            })?;
            let attribute = schema.attribute(id);
            let admitted = attribute
                .kind
                .admit(value)
                .ok_or_else(|| StoreError::InvalidRecord {
                    collection: schema.name().to_string(),
                    message: format!(
                        "{} value does not fit {} attribute `{name}`",
                        value.kind_name(),
                        attribute.kind.as_str()
                    ),
                })?;
            Ok((attribute.name.as_str(), admitted))
        })
        .collect()
}

fn run_in_transaction<T>(
    conn: &mut Connection,
    collection: &str,
    op: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>,
) -> StoreResult<T> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match op(&tx) {
        Ok(value) => {
            tx.commit()
                .map_err(|err| classify_write_error(err, collection))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(
                    "event=tx_rollback module=repo status=error collection={} error={}",
                    collection, rollback_err
                );
            }
            Err(classify_write_error(err, collection))
        }
    }
}

fn classify_write_error(err: rusqlite::Error, collection: &str) -> StoreError {
    if is_uniqueness_violation(&err) {
        return StoreError::DuplicateKey {
            collection: collection.to_string(),
            message: err.to_string(),
        };
    }
    StoreError::Storage(DbError::Sqlite(err))
}

fn is_uniqueness_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

fn parse_record_row(schema: &EntitySchema, row: &Row<'_>) -> StoreResult<Record> {
    let mut record = Record::new();
    for (index, attribute) in schema.attributes().iter().enumerate() {
        let raw = row.get_ref(index)?;
        let value = match (attribute.kind, raw) {
            (_, ValueRef::Null) => FieldValue::Null,
            (AttributeType::Integer, ValueRef::Integer(number)) => FieldValue::Integer(number),
            (AttributeType::Real, ValueRef::Real(number)) => FieldValue::Real(number),
            (AttributeType::Real, ValueRef::Integer(number)) => FieldValue::Real(number as f64),
            (AttributeType::Text, ValueRef::Text(bytes)) => {
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    StoreError::InvalidData(format!(
                        "non UTF-8 text in {}.{}",
                        schema.name(),
                        attribute.name
                    ))
                })?;
                FieldValue::Text(text.to_string())
            }
            (AttributeType::Boolean, ValueRef::Integer(0)) => FieldValue::Boolean(false),
            (AttributeType::Boolean, ValueRef::Integer(1)) => FieldValue::Boolean(true),
            (kind, other) => {
                return Err(StoreError::InvalidData(format!(
                    "{} value in {}.{} does not fit {}",
                    other.data_type(),
                    schema.name(),
                    attribute.name,
                    kind.as_str()
                )));
            }
        };
        record.set(attribute.name.clone(), value);
    }
    Ok(record)
}

fn log_write(
    event: &'static str,
    collection: &str,
    started_at: Instant,
    outcome: Result<usize, &StoreError>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match outcome {
        Ok(rows) => info!(
            "event={event} module=repo status=ok collection={collection} rows={rows} duration_ms={duration_ms}"
        ),
        Err(err) if err.is_duplicate_key() => warn!(
            "event={event} module=repo status=duplicate collection={collection} duration_ms={duration_ms} error_code={} error={err}",
            err.error_code()
        ),
        Err(err) => error!(
            "event={event} module=repo status=error collection={collection} duration_ms={duration_ms} error_code={} error={err}",
            err.error_code()
        ),
    }
}
