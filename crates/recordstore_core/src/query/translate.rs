//! Condition translation into typed predicates.
//!
//! # Responsibility
//! - Resolve every condition entry against an `EntitySchema`.
//! - Check operand shape/type per operator and emit one `Predicate` each.
//! - Render predicate lists as a parameterized SQL `WHERE` clause and
//!   evaluate them against in-memory records with the same semantics.
//!
//! # Invariants
//! - `translate` never touches a connection.
//! - Output order equals entry order; predicates are conjoined.
//! - Column names are emitted only after schema resolution, never from
//!   caller text directly.

use crate::model::record::Record;
use crate::model::schema::{AttributeId, AttributeType, EntitySchema};
use crate::model::value::FieldValue;
use crate::query::condition::{ConditionError, Conditions, Criterion, Operator};
use regex::Regex;
use std::cmp::Ordering;

/// Name of the SQL function backing [`Comparison::Matches`].
pub const REGEXP_FUNCTION: &str = "regexp";

/// Test applied to one attribute.
#[derive(Debug, Clone)]
pub enum Comparison {
    /// `Null` operand renders as `IS NULL`.
    Equal(FieldValue),
    /// `Null` operand renders as `IS NOT NULL`.
    NotEqual(FieldValue),
    Less(FieldValue),
    Greater(FieldValue),
    LessOrEqual(FieldValue),
    GreaterOrEqual(FieldValue),
    Contains(String),
    OneOf(Vec<FieldValue>),
    Matches(Regex),
}

/// One attribute bound to one comparison.
#[derive(Debug, Clone)]
pub struct Predicate {
    attribute: AttributeId,
    column: String,
    comparison: Comparison,
}

impl Predicate {
    pub fn attribute(&self) -> AttributeId {
        self.attribute
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    /// Evaluates this predicate against a record.
    ///
    /// Follows SQL three-valued logic collapsed to `false`: any test against
    /// a `Null` attribute value fails, except `Equal(Null)`.
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.value(&self.column);
        match &self.comparison {
            Comparison::Equal(FieldValue::Null) => value.is_null(),
            Comparison::NotEqual(FieldValue::Null) => !value.is_null(),
            Comparison::Equal(operand) => value.sql_eq(operand),
            Comparison::NotEqual(operand) => {
                matches!(value.compare(operand), Some(ordering) if ordering != Ordering::Equal)
            }
            Comparison::Less(operand) => value.compare(operand) == Some(Ordering::Less),
            Comparison::Greater(operand) => value.compare(operand) == Some(Ordering::Greater),
            Comparison::LessOrEqual(operand) => matches!(
                value.compare(operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Comparison::GreaterOrEqual(operand) => matches!(
                value.compare(operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Comparison::Contains(needle) => value
                .as_text()
                .is_some_and(|haystack| haystack.contains(needle.as_str())),
            Comparison::OneOf(options) => options.iter().any(|option| value.sql_eq(option)),
            Comparison::Matches(pattern) => value.as_text().is_some_and(|text| pattern.is_match(text)),
        }
    }

    fn push_sql(&self, sql: &mut String, binds: &mut Vec<FieldValue>) {
        let column = quote_identifier(&self.column);
        match &self.comparison {
            Comparison::Equal(FieldValue::Null) => sql.push_str(&format!("{column} IS NULL")),
            Comparison::NotEqual(FieldValue::Null) => {
                sql.push_str(&format!("{column} IS NOT NULL"))
            }
            Comparison::Equal(operand) => push_binary(sql, binds, &column, "=", operand),
            Comparison::NotEqual(operand) => push_binary(sql, binds, &column, "<>", operand),
            Comparison::Less(operand) => push_binary(sql, binds, &column, "<", operand),
            Comparison::Greater(operand) => push_binary(sql, binds, &column, ">", operand),
            Comparison::LessOrEqual(operand) => push_binary(sql, binds, &column, "<=", operand),
            Comparison::GreaterOrEqual(operand) => push_binary(sql, binds, &column, ">=", operand),
            Comparison::Contains(needle) => {
                sql.push_str(&format!("instr({column}, ?) > 0"));
                binds.push(FieldValue::Text(needle.clone()));
            }
            Comparison::OneOf(options) if options.is_empty() => sql.push_str("0 = 1"),
            Comparison::OneOf(options) => {
                let placeholders = vec!["?"; options.len()].join(", ");
                sql.push_str(&format!("{column} IN ({placeholders})"));
                binds.extend(options.iter().cloned());
            }
            Comparison::Matches(pattern) => {
                sql.push_str(&format!("{column} REGEXP ?"));
                binds.push(FieldValue::Text(pattern.as_str().to_string()));
            }
        }
    }
}

/// Translates a condition description into predicates for `schema`.
///
/// # Errors
/// - `UnknownAttribute` when an entry names an undeclared attribute.
/// - `MalformedCondition` when an operand does not fit the operator or the
///   attribute type, or a regex pattern does not compile.
pub fn translate(
    schema: &EntitySchema,
    conditions: &Conditions,
) -> Result<Vec<Predicate>, ConditionError> {
    conditions
        .iter()
        .map(|(name, criterion)| -> Result<Predicate, ConditionError> {
            let attribute = schema
                .resolve(name)
                .ok_or_else(|| ConditionError::UnknownAttribute {
                    collection: schema.name().to_string(),
                    attribute: name.to_string(),
                })?;
            let kind = schema.attribute(attribute).kind;
            Ok(Predicate {
                attribute,
                column: schema.attribute(attribute).name.clone(),
                comparison: build_comparison(name, kind, criterion)?,
            })
        })
        .collect()
}

/// Returns `true` when every predicate holds for `record`.
pub fn matches_all(predicates: &[Predicate], record: &Record) -> bool {
    predicates.iter().all(|predicate| predicate.matches(record))
}

/// Renders ` WHERE a AND b ...` plus positional bind values.
///
/// Returns an empty clause for an empty predicate list.
pub fn render_where(predicates: &[Predicate]) -> (String, Vec<FieldValue>) {
    let mut sql = String::new();
    let mut binds = Vec::new();
    for (index, predicate) in predicates.iter().enumerate() {
        sql.push_str(if index == 0 { " WHERE " } else { " AND " });
        predicate.push_sql(&mut sql, &mut binds);
    }
    (sql, binds)
}

/// Double-quotes an identifier already validated by the schema builder.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn build_comparison(
    name: &str,
    kind: AttributeType,
    criterion: &Criterion,
) -> Result<Comparison, ConditionError> {
    let comparison = match criterion {
        Criterion::Eq(value) => Comparison::Equal(admit(name, kind, value)?),
        Criterion::Neq(value) => Comparison::NotEqual(admit(name, kind, value)?),
        Criterion::Lt(value) => Comparison::Less(ordered_operand(name, kind, Operator::Lt, value)?),
        Criterion::Gt(value) => {
            Comparison::Greater(ordered_operand(name, kind, Operator::Gt, value)?)
        }
        Criterion::Lte(value) => {
            Comparison::LessOrEqual(ordered_operand(name, kind, Operator::Lte, value)?)
        }
        Criterion::Gte(value) => {
            Comparison::GreaterOrEqual(ordered_operand(name, kind, Operator::Gte, value)?)
        }
        Criterion::Contains(value) => {
            require_text(name, kind, Operator::Contains)?;
            match value {
                FieldValue::Text(needle) => Comparison::Contains(needle.clone()),
                other => {
                    return Err(ConditionError::malformed(
                        name,
                        format!("`contains` expects text, got {}", other.kind_name()),
                    ));
                }
            }
        }
        Criterion::In(values) => {
            let options = values
                .iter()
                .map(|value| {
                    if value.is_null() {
                        return Err(ConditionError::malformed(
                            name,
                            "`in_` list cannot contain null",
                        ));
                    }
                    admit(name, kind, value)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Comparison::OneOf(options)
        }
        Criterion::Regex(pattern) => {
            require_text(name, kind, Operator::Regex)?;
            let compiled = Regex::new(pattern).map_err(|err| {
                ConditionError::malformed(name, format!("invalid pattern `{pattern}`: {err}"))
            })?;
            Comparison::Matches(compiled)
        }
    };
    Ok(comparison)
}

/// Operand admission is looser than record admission: a real operand is
/// accepted for an integer attribute and compared numerically.
fn admit(name: &str, kind: AttributeType, value: &FieldValue) -> Result<FieldValue, ConditionError> {
    let admitted = match (kind, value) {
        (AttributeType::Integer, FieldValue::Real(_)) => Some(value.clone()),
        _ => kind.admit(value),
    };
    admitted.ok_or_else(|| {
        ConditionError::malformed(
            name,
            format!(
                "{} value does not fit {} attribute",
                value.kind_name(),
                kind.as_str()
            ),
        )
    })
}

fn ordered_operand(
    name: &str,
    kind: AttributeType,
    operator: Operator,
    value: &FieldValue,
) -> Result<FieldValue, ConditionError> {
    if !kind.is_orderable() {
        return Err(ConditionError::malformed(
            name,
            format!("`{}` needs an orderable attribute, got {}", operator.as_str(), kind.as_str()),
        ));
    }
    if value.is_null() {
        return Err(ConditionError::malformed(
            name,
            format!("`{}` cannot compare against null", operator.as_str()),
        ));
    }
    admit(name, kind, value)
}

fn require_text(name: &str, kind: AttributeType, operator: Operator) -> Result<(), ConditionError> {
    if kind == AttributeType::Text {
        return Ok(());
    }
    Err(ConditionError::malformed(
        name,
        format!("`{}` needs a text attribute, got {}", operator.as_str(), kind.as_str()),
    ))
}

fn push_binary(
    sql: &mut String,
    binds: &mut Vec<FieldValue>,
    column: &str,
    operator: &str,
    operand: &FieldValue,
) {
    sql.push_str(&format!("{column} {operator} ?"));
    binds.push(operand.clone());
}
