//! SQLite connection bootstrap and collection setup.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the record store.
//! - Install connection-scoped SQL functions the predicate language relies on.
//! - Create or verify the tables backing declared collections.
//!
//! # Invariants
//! - Every connection handed out, including reconnects, carries `regexp`.
//! - Core code must not read/write records before collection setup succeeds.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

mod functions;
mod open;
pub mod schema;

pub use functions::register_functions;
pub use open::{open_db, open_db_in_memory, open_location};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    MissingRequiredTable(String),
    MissingRequiredColumn { table: String, column: String },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::MissingRequiredTable(_) | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Where a store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Private in-memory database; contents die with the connection.
    Memory,
}

impl DbLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Logging label for this location kind.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Per-connection settings applied at open and on every reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Duration,
    pub foreign_keys: bool,
    /// Create tables for declared collections that do not exist yet.
    pub create_missing_collections: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
            create_missing_collections: true,
        }
    }
}
