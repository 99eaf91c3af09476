//! Condition descriptions: what callers hand to the store to scope a call.
//!
//! # Responsibility
//! - Model the closed operator set as typed variants.
//! - Parse the JSON mapping form (`{"id": {"in_": [1, 3]}}`) into that model.
//!
//! # Invariants
//! - Entry order is preserved; it only affects predicate order.
//! - An operator mapping carries exactly one operator key.
//! - `in_` always carries a list, every other operator a scalar.

use crate::model::value::FieldValue;
use serde_json::Value as JsonValue;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Wire tag for [`Operator::Lt`].
pub const OPERATOR_LT: &str = "lt";
/// Wire tag for [`Operator::Gt`].
pub const OPERATOR_GT: &str = "gt";
/// Wire tag for [`Operator::Lte`].
pub const OPERATOR_LTE: &str = "lte";
/// Wire tag for [`Operator::Gte`].
pub const OPERATOR_GTE: &str = "gte";
/// Wire tag for [`Operator::Neq`].
pub const OPERATOR_NEQ: &str = "neq";
/// Wire tag for [`Operator::Contains`].
pub const OPERATOR_CONTAINS: &str = "contains";
/// Wire tag for [`Operator::In`].
pub const OPERATOR_IN: &str = "in_";
/// Wire tag for [`Operator::Regex`].
pub const OPERATOR_REGEX: &str = "regex";

const SUPPORTED_OPERATOR_STRINGS: &[&str] = &[
    OPERATOR_LT,
    OPERATOR_GT,
    OPERATOR_LTE,
    OPERATOR_GTE,
    OPERATOR_NEQ,
    OPERATOR_CONTAINS,
    OPERATOR_IN,
    OPERATOR_REGEX,
];

/// Returns every operator tag accepted in operator mappings.
pub fn supported_operator_strings() -> &'static [&'static str] {
    SUPPORTED_OPERATOR_STRINGS
}

/// Closed set of operator tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Gt,
    Lte,
    Gte,
    Neq,
    Contains,
    In,
    Regex,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lt => OPERATOR_LT,
            Self::Gt => OPERATOR_GT,
            Self::Lte => OPERATOR_LTE,
            Self::Gte => OPERATOR_GTE,
            Self::Neq => OPERATOR_NEQ,
            Self::Contains => OPERATOR_CONTAINS,
            Self::In => OPERATOR_IN,
            Self::Regex => OPERATOR_REGEX,
        }
    }

    /// Parses an exact operator tag. Tags are case-sensitive.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            OPERATOR_LT => Some(Self::Lt),
            OPERATOR_GT => Some(Self::Gt),
            OPERATOR_LTE => Some(Self::Lte),
            OPERATOR_GTE => Some(Self::Gte),
            OPERATOR_NEQ => Some(Self::Neq),
            OPERATOR_CONTAINS => Some(Self::Contains),
            OPERATOR_IN => Some(Self::In),
            OPERATOR_REGEX => Some(Self::Regex),
            _ => None,
        }
    }
}

/// Typed condition for one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Plain literal: equality (`Null` means IS NULL).
    Eq(FieldValue),
    Lt(FieldValue),
    Gt(FieldValue),
    Lte(FieldValue),
    Gte(FieldValue),
    /// Inequality (`Null` means IS NOT NULL).
    Neq(FieldValue),
    /// Substring containment anywhere in a text value.
    Contains(FieldValue),
    /// Membership; an empty list matches nothing.
    In(Vec<FieldValue>),
    /// Pattern search anywhere in a text value.
    Regex(String),
}

impl Criterion {
    /// Operator tag for this criterion, `None` for plain equality.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            Self::Eq(_) => None,
            Self::Lt(_) => Some(Operator::Lt),
            Self::Gt(_) => Some(Operator::Gt),
            Self::Lte(_) => Some(Operator::Lte),
            Self::Gte(_) => Some(Operator::Gte),
            Self::Neq(_) => Some(Operator::Neq),
            Self::Contains(_) => Some(Operator::Contains),
            Self::In(_) => Some(Operator::In),
            Self::Regex(_) => Some(Operator::Regex),
        }
    }
}

/// Errors raised while building or translating a condition description.
///
/// None of these touch the connection; the caller fixes the description
/// and retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    UnknownAttribute {
        collection: String,
        attribute: String,
    },
    UnsupportedOperator {
        attribute: String,
        operator: String,
    },
    /// Shape or type mismatch. `attribute` is `None` for a malformed root.
    MalformedCondition {
        attribute: Option<String>,
        message: String,
    },
}

impl ConditionError {
    pub(crate) fn malformed(attribute: &str, message: impl Into<String>) -> Self {
        Self::MalformedCondition {
            attribute: Some(attribute.to_string()),
            message: message.into(),
        }
    }
}

impl Display for ConditionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttribute {
                collection,
                attribute,
            } => write!(f, "unknown attribute `{attribute}` for collection `{collection}`"),
            Self::UnsupportedOperator {
                attribute,
                operator,
            } => write!(
                f,
                "unsupported operator `{operator}` on `{attribute}`; expected one of {}",
                SUPPORTED_OPERATOR_STRINGS.join("|")
            ),
            Self::MalformedCondition {
                attribute: Some(attribute),
                message,
            } => write!(f, "malformed condition on `{attribute}`: {message}"),
            Self::MalformedCondition {
                attribute: None,
                message,
            } => write!(f, "malformed condition: {message}"),
        }
    }
}

impl Error for ConditionError {}

/// Ordered conjunction of per-attribute criteria.
///
/// An empty description means "no filtering".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    entries: Vec<(String, Criterion)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality entry.
    pub fn eq(self, attribute: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.with(attribute, Criterion::Eq(value.into()))
    }

    /// Adds an entry. Re-adding an attribute replaces its earlier criterion
    /// in place, mirroring a mapping keyed by attribute name.
    pub fn with(mut self, attribute: impl Into<String>, criterion: Criterion) -> Self {
        let attribute = attribute.into();
        match self.entries.iter_mut().find(|(name, _)| *name == attribute) {
            Some(entry) => entry.1 = criterion,
            None => self.entries.push((attribute, criterion)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Criterion)> {
        self.entries
            .iter()
            .map(|(attribute, criterion)| (attribute.as_str(), criterion))
    }

    /// Parses the JSON mapping form.
    ///
    /// `null` is accepted as "no conditions".
    ///
    /// # Errors
    /// - `MalformedCondition` when the root is not an object, an operator
    ///   mapping does not hold exactly one key, or an operand has the wrong
    ///   shape.
    /// - `UnsupportedOperator` when an operator key is outside the closed set.
    pub fn from_json(value: &JsonValue) -> Result<Self, ConditionError> {
        let map = match value {
            JsonValue::Null => return Ok(Self::new()),
            JsonValue::Object(map) => map,
            other => {
                return Err(ConditionError::MalformedCondition {
                    attribute: None,
                    message: format!("expected an object, got {}", json_kind(other)),
                });
            }
        };

        let mut conditions = Self::new();
        for (attribute, raw) in map {
            let criterion = match raw {
                JsonValue::Object(operators) => parse_operator_mapping(attribute, operators)?,
                scalar => Criterion::Eq(json_scalar(attribute, scalar)?),
            };
            conditions.entries.push((attribute.clone(), criterion));
        }
        Ok(conditions)
    }
}

fn parse_operator_mapping(
    attribute: &str,
    operators: &serde_json::Map<String, JsonValue>,
) -> Result<Criterion, ConditionError> {
    let mut iter = operators.iter();
    let (tag, operand) = match (iter.next(), iter.next()) {
        (Some(entry), None) => entry,
        (None, _) => {
            return Err(ConditionError::malformed(
                attribute,
                "operator mapping is empty",
            ));
        }
        (Some(_), Some(_)) => {
            return Err(ConditionError::malformed(
                attribute,
                format!(
                    "operator mapping must hold exactly one operator, got {}",
                    operators.len()
                ),
            ));
        }
    };

    let operator = Operator::parse(tag).ok_or_else(|| ConditionError::UnsupportedOperator {
        attribute: attribute.to_string(),
        operator: tag.clone(),
    })?;

    let criterion = match operator {
        Operator::Lt => Criterion::Lt(json_scalar(attribute, operand)?),
        Operator::Gt => Criterion::Gt(json_scalar(attribute, operand)?),
        Operator::Lte => Criterion::Lte(json_scalar(attribute, operand)?),
        Operator::Gte => Criterion::Gte(json_scalar(attribute, operand)?),
        Operator::Neq => Criterion::Neq(json_scalar(attribute, operand)?),
        Operator::Contains => Criterion::Contains(json_scalar(attribute, operand)?),
        Operator::In => {
            let JsonValue::Array(items) = operand else {
                return Err(ConditionError::malformed(
                    attribute,
                    format!("`in_` expects a list, got {}", json_kind(operand)),
                ));
            };
            let values = items
                .iter()
                .map(|item| json_scalar(attribute, item))
                .collect::<Result<Vec<_>, _>>()?;
            Criterion::In(values)
        }
        Operator::Regex => match operand {
            JsonValue::String(pattern) => Criterion::Regex(pattern.clone()),
            other => {
                return Err(ConditionError::malformed(
                    attribute,
                    format!("`regex` expects a string pattern, got {}", json_kind(other)),
                ));
            }
        },
    };
    Ok(criterion)
}

fn json_scalar(attribute: &str, value: &JsonValue) -> Result<FieldValue, ConditionError> {
    match value {
        JsonValue::Null => Ok(FieldValue::Null),
        JsonValue::Bool(flag) => Ok(FieldValue::Boolean(*flag)),
        JsonValue::Number(number) => number
            .as_i64()
            .map(FieldValue::Integer)
            .or_else(|| number.as_f64().map(FieldValue::Real))
            .ok_or_else(|| {
                ConditionError::malformed(attribute, format!("number `{number}` is out of range"))
            }),
        JsonValue::String(text) => Ok(FieldValue::Text(text.clone())),
        other => Err(ConditionError::malformed(
            attribute,
            format!("expected a scalar, got {}", json_kind(other)),
        )),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{supported_operator_strings, ConditionError, Conditions, Criterion, Operator};
    use crate::model::value::FieldValue;
    use serde_json::json;

    #[test]
    fn operator_tags_roundtrip_through_parse() {
        for tag in supported_operator_strings() {
            let operator = Operator::parse(tag).expect("supported tag should parse");
            assert_eq!(operator.as_str(), *tag);
        }
        assert_eq!(Operator::parse("in"), None);
        assert_eq!(Operator::parse("LT"), None);
    }

    #[test]
    fn from_json_keeps_insertion_order_and_shapes() {
        let conditions = Conditions::from_json(&json!({
            "last_name": "Smith",
            "id": {"in_": [1, 3]},
            "email": {"regex": "@example\\.com$"},
        }))
        .expect("valid description");

        let entries: Vec<_> = conditions.iter().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "last_name");
        assert_eq!(entries[0].1, &Criterion::Eq(FieldValue::from("Smith")));
        assert_eq!(entries[1].0, "id");
        assert_eq!(
            entries[1].1,
            &Criterion::In(vec![FieldValue::Integer(1), FieldValue::Integer(3)])
        );
        assert_eq!(entries[2].1.operator(), Some(Operator::Regex));
    }

    #[test]
    fn from_json_rejects_unknown_operator() {
        let err = Conditions::from_json(&json!({"id": {"between": [1, 2]}})).unwrap_err();
        assert_eq!(
            err,
            ConditionError::UnsupportedOperator {
                attribute: "id".to_string(),
                operator: "between".to_string(),
            }
        );
    }

    #[test]
    fn from_json_rejects_multi_operator_mapping() {
        let err = Conditions::from_json(&json!({"id": {"gt": 1, "lt": 5}})).unwrap_err();
        assert!(matches!(
            err,
            ConditionError::MalformedCondition { attribute: Some(ref name), .. } if name == "id"
        ));
    }

    #[test]
    fn from_json_rejects_non_list_in_and_list_literals() {
        let err = Conditions::from_json(&json!({"id": {"in_": 1}})).unwrap_err();
        assert!(matches!(err, ConditionError::MalformedCondition { .. }));

        let err = Conditions::from_json(&json!({"id": [1, 2]})).unwrap_err();
        assert!(matches!(err, ConditionError::MalformedCondition { .. }));

        let err = Conditions::from_json(&json!(["id"])).unwrap_err();
        assert!(matches!(
            err,
            ConditionError::MalformedCondition {
                attribute: None,
                ..
            }
        ));
    }

    #[test]
    fn null_root_means_no_conditions() {
        let conditions = Conditions::from_json(&serde_json::Value::Null).unwrap();
        assert!(conditions.is_empty());
    }

    #[test]
    fn with_replaces_existing_attribute_in_place() {
        let conditions = Conditions::new()
            .eq("id", 1)
            .eq("email", "a@b.c")
            .with("id", Criterion::Gt(FieldValue::Integer(5)));
        let entries: Vec<_> = conditions.iter().collect();
        assert_eq!(conditions.len(), 2);
        assert_eq!(entries[0], ("id", &Criterion::Gt(FieldValue::Integer(5))));
    }
}
