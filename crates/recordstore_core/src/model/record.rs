//! Record instances of an entity schema.
//!
//! A record is a name-keyed bag of values. The same shape doubles as the
//! patch passed to updates, where only the named attributes are written.

use crate::model::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of a collection, keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

/// Attribute assignments applied by an update.
pub type Patch = Record;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(attribute, value);
        self
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(attribute.into(), value.into());
    }

    /// Returns the stored value, or `None` when the attribute was never set.
    pub fn get(&self, attribute: &str) -> Option<&FieldValue> {
        self.fields.get(attribute)
    }

    /// Returns the stored value, treating unset attributes as `Null`.
    pub fn value(&self, attribute: &str) -> &FieldValue {
        self.fields.get(attribute).unwrap_or(&FieldValue::Null)
    }

    pub fn remove(&mut self, attribute: &str) -> Option<FieldValue> {
        self.fields.remove(attribute)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields ordered by attribute name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
