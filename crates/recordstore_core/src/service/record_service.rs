//! Record use-case service.
//!
//! # Responsibility
//! - Provide duplicate-key policies built purely from repository calls.
//! - Delegate persistence to repository implementations.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/transaction contracts.
//! - Only `DuplicateKey` is ever absorbed; every other error passes through.

use crate::model::record::Record;
use crate::model::value::FieldValue;
use crate::query::condition::Conditions;
use crate::repo::record_repo::{RecordRepository, StoreError, StoreResult};
use log::{info, warn};

/// Outcome of [`RecordService::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Inserted(FieldValue),
    Updated(FieldValue),
}

/// Use-case service wrapper for record CRUD operations.
pub struct RecordService<R: RecordRepository> {
    repo: R,
}

impl<R: RecordRepository> RecordService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn into_inner(self) -> R {
        self.repo
    }

    /// Inserts `record`, treating a duplicate key as a no-op.
    ///
    /// Returns `Ok(None)` when the record collided with an existing one.
    pub fn insert_or_ignore(
        &mut self,
        collection: &str,
        record: Record,
    ) -> StoreResult<Option<FieldValue>> {
        match self.repo.insert(collection, record) {
            Ok(id) => Ok(Some(id)),
            Err(StoreError::DuplicateKey { message, .. }) => {
                warn!(
                    "event=record_insert_ignored module=service status=duplicate collection={} error={}",
                    collection, message
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Inserts `record`, or overwrites the stored record with the same
    /// primary identifier.
    ///
    /// # Contract
    /// - Non-key fields of `record` are written on the update path; fields
    ///   the record leaves unset keep their stored values.
    /// - A collision on a non-key unique attribute (no stored record has the
    ///   same identifier) is returned as the original `DuplicateKey`.
    pub fn upsert(&mut self, collection: &str, record: Record) -> StoreResult<UpsertOutcome> {
        let key_name = self.repo.schema(collection)?.primary_key().name.clone();
        let key = record.get(&key_name).cloned().unwrap_or(FieldValue::Null);

        let duplicate = match self.repo.insert(collection, record.clone()) {
            Ok(id) => return Ok(UpsertOutcome::Inserted(id)),
            Err(err) if err.is_duplicate_key() && !key.is_null() => err,
            Err(err) => return Err(err),
        };

        let mut patch = record;
        patch.remove(&key_name);
        let scope = Conditions::new().eq(key_name.as_str(), key.clone());
        if patch.is_empty() {
            if self.repo.read(collection, &scope)?.is_empty() {
                return Err(duplicate);
            }
            return Ok(UpsertOutcome::Updated(key));
        }

        match self.repo.update(collection, &scope, &patch)? {
            0 => Err(duplicate),
            _ => {
                info!(
                    "event=record_upsert module=service status=updated collection={}",
                    collection
                );
                Ok(UpsertOutcome::Updated(key))
            }
        }
    }
}
