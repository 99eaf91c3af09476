//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure pragmas and timeouts from `ConnectionOptions`.
//! - Install custom SQL functions before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `regexp` registered.
//! - Returned connections honor `busy_timeout` and `foreign_keys` options.

use super::functions::register_functions;
use super::{ConnectionOptions, DbLocation, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Opens a SQLite database file with default options.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_location(
        &DbLocation::file(path.as_ref()),
        &ConnectionOptions::default(),
    )
}

/// Opens a private in-memory SQLite database with default options.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_location(&DbLocation::Memory, &ConnectionOptions::default())
}

/// Opens `location` and bootstraps the connection.
///
/// # Side effects
/// - Registers connection-scoped SQL functions.
/// - Emits `db_open` logging events with duration and status.
pub fn open_location(location: &DbLocation, options: &ConnectionOptions) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = location.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let opened = match location {
        DbLocation::File(path) => Connection::open(path),
        DbLocation::Memory => Connection::open_in_memory(),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn, options) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection, options: &ConnectionOptions) -> DbResult<()> {
    let foreign_keys = if options.foreign_keys { "ON" } else { "OFF" };
    conn.execute_batch(&format!("PRAGMA foreign_keys = {foreign_keys};"))?;
    conn.busy_timeout(options.busy_timeout)?;
    register_functions(conn)?;
    Ok(())
}
