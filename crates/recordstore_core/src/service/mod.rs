//! Core use-case services.
//!
//! # Responsibility
//! - Layer caller policies (ignore or merge duplicates) over repository calls.
//! - Keep callers decoupled from storage details.

pub mod record_service;
