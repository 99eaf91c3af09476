//! Table setup for declared collections.
//!
//! # Responsibility
//! - Create tables for declared collections when allowed.
//! - Verify existing tables expose every declared column.
//!
//! # Invariants
//! - An integer primary key is declared `INTEGER PRIMARY KEY` (rowid alias),
//!   so omitting it on insert generates the next id.
//! - A text primary key is declared `NOT NULL`.
//! - Existing tables are never altered.

use super::{DbError, DbResult};
use crate::model::schema::{Attribute, AttributeType, EntitySchema};
use crate::query::translate::quote_identifier;
use log::info;
use rusqlite::Connection;

/// Makes `schema` usable on `conn`.
///
/// # Errors
/// - `MissingRequiredTable` when the table is absent and `create_missing`
///   is `false`.
/// - `MissingRequiredColumn` when an existing table lacks a declared column.
pub fn ensure_collection(
    conn: &Connection,
    schema: &EntitySchema,
    create_missing: bool,
) -> DbResult<()> {
    if !table_exists(conn, schema.name())? {
        if !create_missing {
            return Err(DbError::MissingRequiredTable(schema.name().to_string()));
        }
        conn.execute_batch(&create_table_sql(schema))?;
        info!(
            "event=collection_create module=db status=ok collection={} attributes={}",
            schema.name(),
            schema.attributes().len()
        );
        return Ok(());
    }

    for attribute in schema.attributes() {
        if !table_has_column(conn, schema.name(), &attribute.name)? {
            return Err(DbError::MissingRequiredColumn {
                table: schema.name().to_string(),
                column: attribute.name.clone(),
            });
        }
    }
    Ok(())
}

/// Builds the `CREATE TABLE IF NOT EXISTS` statement for `schema`.
pub fn create_table_sql(schema: &EntitySchema) -> String {
    let columns = schema
        .attributes()
        .iter()
        .map(column_definition)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns});",
        quote_identifier(schema.name())
    )
}

fn column_definition(attribute: &Attribute) -> String {
    let mut definition = format!(
        "{} {}",
        quote_identifier(&attribute.name),
        attribute.kind.sql_type()
    );
    if attribute.primary_key {
        definition.push_str(" PRIMARY KEY");
        if attribute.kind != AttributeType::Integer {
            definition.push_str(" NOT NULL");
        }
    } else if attribute.unique {
        definition.push_str(" UNIQUE");
    }
    definition
}

pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote_identifier(table)))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}
