//! Condition translation layer.
//!
//! # Responsibility
//! - Describe caller filters (`Conditions`) over one collection.
//! - Translate them into conjoined, schema-checked `Predicate`s.
//!
//! # Invariants
//! - Translation is pure: it needs a schema, never a connection.
//! - Unknown attributes are errors, never silently ignored.

pub mod condition;
pub mod translate;
