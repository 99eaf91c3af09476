//! Entity schema declarations.
//!
//! # Responsibility
//! - Declare a named collection with a fixed list of typed attributes.
//! - Resolve attribute names to stable ids once, before any SQL is built.
//! - Decide which values are admissible for an attribute.
//!
//! # Invariants
//! - Exactly one attribute is the primary identifier, typed `Integer` or `Text`.
//! - Collection and attribute names are plain SQL identifiers
//!   (`[A-Za-z_][A-Za-z0-9_]*`) and attribute names are unique.
//! - A built schema is immutable.

use crate::model::value::FieldValue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Declared storage type of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Integer,
    Real,
    Text,
    /// Persisted as INTEGER `0`/`1`; equality only.
    Boolean,
}

impl AttributeType {
    /// SQLite column type used when the collection is created.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    /// Whether `lt`/`gt`/`lte`/`gte` are meaningful for this type.
    pub fn is_orderable(self) -> bool {
        !matches!(self, Self::Boolean)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Boolean => "boolean",
        }
    }

    /// Coerces `value` into this type's canonical shape.
    ///
    /// `Null` is always admitted; `Integer` widens to `Real`. Returns `None`
    /// for any other kind mismatch.
    pub fn admit(self, value: &FieldValue) -> Option<FieldValue> {
        match (self, value) {
            (_, FieldValue::Null) => Some(FieldValue::Null),
            (Self::Integer, FieldValue::Integer(_))
            | (Self::Real, FieldValue::Real(_))
            | (Self::Text, FieldValue::Text(_))
            | (Self::Boolean, FieldValue::Boolean(_)) => Some(value.clone()),
            (Self::Real, FieldValue::Integer(number)) => Some(FieldValue::Real(*number as f64)),
            _ => None,
        }
    }
}

/// One declared attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    #[serde(default)]
    pub primary_key: bool,
    /// Non-key uniqueness constraint; collisions surface as duplicate keys.
    #[serde(default)]
    pub unique: bool,
}

/// Position of an attribute inside its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(usize);

/// Schema declaration failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    InvalidIdentifier(String),
    DuplicateAttribute {
        collection: String,
        attribute: String,
    },
    MissingPrimaryKey(String),
    MultiplePrimaryKeys(String),
    UnsupportedPrimaryKeyType {
        collection: String,
        kind: AttributeType,
    },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(name) => write!(f, "invalid identifier `{name}`"),
            Self::DuplicateAttribute {
                collection,
                attribute,
            } => write!(f, "attribute `{attribute}` declared twice in `{collection}`"),
            Self::MissingPrimaryKey(collection) => {
                write!(f, "collection `{collection}` declares no primary key")
            }
            Self::MultiplePrimaryKeys(collection) => {
                write!(f, "collection `{collection}` declares more than one primary key")
            }
            Self::UnsupportedPrimaryKeyType { collection, kind } => write!(
                f,
                "primary key of `{collection}` must be integer or text, got {}",
                kind.as_str()
            ),
        }
    }
}

impl Error for SchemaError {}

/// Immutable declaration of a collection and its attributes.
///
/// Serialized as `{"name": ..., "attributes": [...]}`; deserialization runs
/// the same validation as [`EntitySchemaBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SchemaDeclaration", try_from = "SchemaDeclaration")]
pub struct EntitySchema {
    name: String,
    attributes: Vec<Attribute>,
    primary_key: usize,
}

impl EntitySchema {
    pub fn builder(name: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Collection (table) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn primary_key(&self) -> &Attribute {
        &self.attributes[self.primary_key]
    }

    /// Resolves an attribute name to its id.
    pub fn resolve(&self, name: &str) -> Option<AttributeId> {
        self.attributes
            .iter()
            .position(|attribute| attribute.name == name)
            .map(AttributeId)
    }

    /// Returns the attribute for an id produced by [`EntitySchema::resolve`].
    ///
    /// # Panics
    /// - When `id` was resolved against a different schema with more attributes.
    pub fn attribute(&self, id: AttributeId) -> &Attribute {
        &self.attributes[id.0]
    }
}

/// Wire shape of an [`EntitySchema`].
#[derive(Serialize, Deserialize)]
struct SchemaDeclaration {
    name: String,
    attributes: Vec<Attribute>,
}

impl From<EntitySchema> for SchemaDeclaration {
    fn from(schema: EntitySchema) -> Self {
        Self {
            name: schema.name,
            attributes: schema.attributes,
        }
    }
}

impl TryFrom<SchemaDeclaration> for EntitySchema {
    type Error = SchemaError;

    fn try_from(declaration: SchemaDeclaration) -> Result<Self, Self::Error> {
        EntitySchemaBuilder {
            name: declaration.name,
            attributes: declaration.attributes,
        }
        .build()
    }
}

/// Incremental builder for [`EntitySchema`].
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    name: String,
    attributes: Vec<Attribute>,
}

impl EntitySchemaBuilder {
    /// Declares the primary identifier attribute.
    pub fn primary_key(self, name: impl Into<String>, kind: AttributeType) -> Self {
        self.push(name.into(), kind, true, false)
    }

    /// Declares a plain nullable attribute.
    pub fn attribute(self, name: impl Into<String>, kind: AttributeType) -> Self {
        self.push(name.into(), kind, false, false)
    }

    /// Declares a nullable attribute with a uniqueness constraint.
    pub fn unique(self, name: impl Into<String>, kind: AttributeType) -> Self {
        self.push(name.into(), kind, false, true)
    }

    fn push(mut self, name: String, kind: AttributeType, primary_key: bool, unique: bool) -> Self {
        self.attributes.push(Attribute {
            name,
            kind,
            primary_key,
            unique,
        });
        self
    }

    /// Validates the declaration and freezes it.
    ///
    /// # Errors
    /// - `InvalidIdentifier` for a collection or attribute name outside
    ///   `[A-Za-z_][A-Za-z0-9_]*`.
    /// - `DuplicateAttribute` when a name is declared twice.
    /// - `MissingPrimaryKey` / `MultiplePrimaryKeys` unless exactly one key exists.
    /// - `UnsupportedPrimaryKeyType` for real or boolean keys.
    pub fn build(self) -> Result<EntitySchema, SchemaError> {
        if !is_identifier(&self.name) {
            return Err(SchemaError::InvalidIdentifier(self.name));
        }

        for (index, attribute) in self.attributes.iter().enumerate() {
            if !is_identifier(&attribute.name) {
                return Err(SchemaError::InvalidIdentifier(attribute.name.clone()));
            }
            let declared_before = self.attributes[..index]
                .iter()
                .any(|earlier| earlier.name.eq_ignore_ascii_case(&attribute.name));
            if declared_before {
                return Err(SchemaError::DuplicateAttribute {
                    collection: self.name.clone(),
                    attribute: attribute.name.clone(),
                });
            }
        }

        let mut keys = self
            .attributes
            .iter()
            .enumerate()
            .filter(|(_, attribute)| attribute.primary_key)
            .map(|(index, _)| index);
        let primary_key = match (keys.next(), keys.next()) {
            (Some(index), None) => index,
            (None, _) => return Err(SchemaError::MissingPrimaryKey(self.name)),
            (Some(_), Some(_)) => return Err(SchemaError::MultiplePrimaryKeys(self.name)),
        };

        let key_kind = self.attributes[primary_key].kind;
        if !matches!(key_kind, AttributeType::Integer | AttributeType::Text) {
            return Err(SchemaError::UnsupportedPrimaryKeyType {
                collection: self.name,
                kind: key_kind,
            });
        }

        Ok(EntitySchema {
            name: self.name,
            attributes: self.attributes,
            primary_key,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}
