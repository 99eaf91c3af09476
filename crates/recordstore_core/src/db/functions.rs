//! Custom SQL functions installed on every connection.
//!
//! SQLite parses `X REGEXP Y` but ships no implementation; it rewrites the
//! expression to `regexp(Y, X)`, so the function receives
//! `(pattern, subject)`.

use super::DbResult;
use crate::query::translate::REGEXP_FUNCTION;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registers `regexp(pattern, subject)` on `conn`.
///
/// Search semantics: the pattern may match anywhere in the subject. A
/// `NULL` or non-text subject never matches. The compiled pattern is cached
/// per statement through SQLite auxiliary data.
pub fn register_functions(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        REGEXP_FUNCTION,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: Arc<Regex> = ctx.get_or_create_aux(0, |raw| -> Result<_, BoxError> {
                Ok(Regex::new(raw.as_str()?)?)
            })?;
            let is_match = match ctx.get_raw(1) {
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .map(|subject| pattern.is_match(subject))
                    .map_err(|err| rusqlite::Error::UserFunctionError(err.into()))?,
                _ => false,
            };
            Ok(is_match)
        },
    )?;
    Ok(())
}
