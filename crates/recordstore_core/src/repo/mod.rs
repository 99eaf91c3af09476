//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the condition-scoped CRUD contract over declared collections.
//! - Isolate SQLite statement building and transaction handling from callers.
//!
//! # Invariants
//! - Repository writes validate records against the schema before SQL runs.
//! - Repository APIs return semantic errors (`DuplicateKey`, `Closed`) in
//!   addition to storage transport errors.

pub mod record_repo;
