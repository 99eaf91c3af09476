//! Schema-driven data model.
//!
//! # Responsibility
//! - Declare collections (`EntitySchema`) and the values they hold.
//! - Keep attribute lookup typed so unknown names are caught before SQL.
//!
//! # Invariants
//! - Every record is identified by its schema's primary identifier value.
//! - Schemas are created once and never mutated afterwards.

pub mod record;
pub mod schema;
pub mod value;
