//! Filter predicates over document fields.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};

/// Comparison operator of a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// SQL `LIKE` pattern.
    Like,
    /// Negated `LIKE`.
    NotLike,
    /// Membership in a list.
    In,
    /// Non-membership in a list.
    NotIn,
    /// `set` / `not set` test.
    Is,
}

impl Operator {
    /// Operator keyword as written in filters.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "like",
            Self::NotLike => "not like",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Le),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Ge),
            "like" => Ok(Self::Like),
            "not like" => Ok(Self::NotLike),
            "in" => Ok(Self::In),
            "not in" => Ok(Self::NotIn),
            "is" => Ok(Self::Is),
            other => Err(Error::InvalidFilter(format!("unsupported operator: {other}"))),
        }
    }
}

/// One predicate: `field op value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Document field.
    pub field: String,
    /// Comparison.
    pub op: Operator,
    /// Right-hand side. A list for `in` / `not in`, `"set"` or `"not set"` for `is`.
    pub value: Value,
}

impl Filter {
    /// Build a filter, validating the field name and the operand shape.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid field name or operand.
    pub fn new(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Result<Self> {
        let field = field.into();
        validate_field_name(&field)?;
        let value = normalize_operand(op, value.into())?;
        Ok(Self { field, op, value })
    }

    /// `field = value` for a field name known to be valid.
    #[must_use]
    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: Operator::Eq,
            value: value.into(),
        }
    }

    /// `field in values` for a field name known to be valid.
    #[must_use]
    pub fn is_in<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            field: field.to_string(),
            op: Operator::In,
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }

    /// `field is set` for a field name known to be valid.
    #[must_use]
    pub fn is_set(field: &'static str) -> Self {
        Self {
            field: field.to_string(),
            op: Operator::Is,
            value: Value::from("set"),
        }
    }
}

fn normalize_operand(op: Operator, value: Value) -> Result<Value> {
    match op {
        Operator::In | Operator::NotIn => match value {
            Value::Array(_) => Ok(value),
            Value::String(s) => Ok(Value::Array(
                s.split(',')
                    .map(|part| Value::from(part.trim()))
                    .filter(|part| part.as_str().is_some_and(|p| !p.is_empty()))
                    .collect(),
            )),
            Value::Null => Ok(Value::Array(Vec::new())),
            other => Ok(Value::Array(vec![other])),
        },
        Operator::Is => match value.as_str().map(str::to_ascii_lowercase).as_deref() {
            Some("set") => Ok(Value::from("set")),
            Some("not set") => Ok(Value::from("not set")),
            _ => Err(Error::InvalidFilter(
                "operator 'is' expects 'set' or 'not set'".to_string(),
            )),
        },
        _ => Ok(value),
    }
}

fn field_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex pattern"))
}

/// Check that a field name is a plain identifier.
///
/// # Errors
///
/// Returns [`Error::InvalidFilter`] otherwise.
pub fn validate_field_name(field: &str) -> Result<()> {
    if field_name_pattern().is_match(field) {
        Ok(())
    } else {
        Err(Error::InvalidFilter(format!("invalid field name: {field}")))
    }
}

/// Parse filters given as an object or as a list of triples.
///
/// Accepted shapes:
/// - `{"field": value}` and `{"field": ["op", value]}`
/// - `[["field", "op", value], ["Doctype", "field", "op", value]]`
///
/// # Errors
///
/// Returns [`Error::InvalidFilter`] for anything else.
pub fn parse_filters(value: &Value) -> Result<Vec<Filter>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => map
            .iter()
            .map(|(field, condition)| match condition {
                Value::Array(parts) if parts.len() == 2 && parts[0].is_string() => {
                    let op: Operator = parts[0].as_str().unwrap_or_default().parse()?;
                    Filter::new(field.clone(), op, parts[1].clone())
                }
                other => Filter::new(field.clone(), Operator::Eq, other.clone()),
            })
            .collect(),
        Value::Array(items) => items.iter().map(parse_triple).collect(),
        other => Err(Error::InvalidFilter(format!(
            "filters must be an object or a list, got {other}"
        ))),
    }
}

fn parse_triple(item: &Value) -> Result<Filter> {
    let parts = item
        .as_array()
        .ok_or_else(|| Error::InvalidFilter(format!("filter must be a list: {item}")))?;
    let (field, op, value) = match parts.as_slice() {
        [field, op, value] | [_, field, op, value] => (field, op, value),
        [field, value] => (field, &Value::Null, value),
        _ => {
            return Err(Error::InvalidFilter(format!(
                "filter must have 3 or 4 elements: {item}"
            )))
        }
    };
    let field = field
        .as_str()
        .ok_or_else(|| Error::InvalidFilter(format!("filter field must be a string: {item}")))?;
    let op = match op {
        Value::Null => Operator::Eq,
        Value::String(op) => op.parse()?,
        _ => {
            return Err(Error::InvalidFilter(format!(
                "filter operator must be a string: {item}"
            )))
        }
    };
    Filter::new(field, op, value.clone())
}
