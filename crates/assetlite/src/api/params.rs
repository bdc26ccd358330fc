//! Request parameters.
//!
//! Query string values arrive as strings; a POST body is a JSON object whose
//! values win over the query string. Parameters that carry JSON accept either
//! a JSON value or a JSON-encoded string.

use std::collections::HashMap;

use serde_json::Value;

use crate::document::{cint, is_truthy, Fields};
use crate::error::{Error, Result};
use crate::store::{parse_filters, Filter, OrderBy};

/// Merged parameters of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: Fields,
}

impl Params {
    /// Merge query string pairs with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON object.
    pub fn from_parts(query: HashMap<String, String>, body: &[u8]) -> Result<Self> {
        let mut values: Fields = query
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        if !body.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice::<Value>(body) {
                Ok(Value::Object(map)) => values.extend(map),
                Ok(_) => {
                    return Err(Error::invalid_parameter(
                        "body",
                        "expected a JSON object",
                    ))
                }
                Err(e) => return Err(Error::invalid_parameter("body", e.to_string())),
            }
        }
        Ok(Self { values })
    }

    /// Parameters from a JSON value; anything but an object yields none.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    /// Raw value, treating `null` and blank strings as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.values.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(value) => Some(value),
        }
    }

    /// Value as text. Numbers and booleans are stringified.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Text value that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingParameter`] naming `label`.
    pub fn require(&self, key: &str, label: &str) -> Result<String> {
        self.text(key).ok_or_else(|| Error::missing(label))
    }

    /// Value decoded from JSON when given as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if a string value is not valid JSON.
    pub fn json(&self, key: &str) -> Result<Option<Value>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => serde_json::from_str(s)
                .map(Some)
                .map_err(|e| Error::invalid_parameter(key, e.to_string())),
            Some(value) => Ok(Some(value.clone())),
        }
    }

    /// JSON object payload that must be present.
    ///
    /// # Errors
    ///
    /// Returns an error if it is missing, not JSON or not an object.
    pub fn object(&self, key: &str) -> Result<Fields> {
        match self.json(key)? {
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(Error::invalid_parameter(key, "expected a JSON object")),
            None => Err(Error::missing(key)),
        }
    }

    /// Non-negative integer with a default.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a non-negative integer.
    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| Error::invalid_parameter(key, format!("expected a count, got {n}"))),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| Error::invalid_parameter(key, format!("expected a count, got {s}"))),
            Some(other) => Err(Error::invalid_parameter(
                key,
                format!("expected a count, got {other}"),
            )),
        }
    }

    /// Flag with a default. Accepts booleans, numbers and
    /// `true`/`false`/`1`/`0`/`yes`/`no` strings.
    #[must_use]
    pub fn flag_or(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" => true,
                "false" | "no" | "off" => false,
                other => cint(&Value::from(other)) != 0,
            },
            Some(value) => is_truthy(value),
        }
    }

    /// Caller filters from `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the filters do not parse.
    pub fn filters_at(&self, key: &str) -> Result<Vec<Filter>> {
        match self.json(key)? {
            Some(value) => parse_filters(&value),
            None => Ok(Vec::new()),
        }
    }

    /// Caller filters from `filters`.
    ///
    /// # Errors
    ///
    /// Returns an error if the filters do not parse.
    pub fn filters(&self) -> Result<Vec<Filter>> {
        self.filters_at("filters")
    }

    /// Requested projection. `None` when absent or `["*"]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is not a list of strings.
    pub fn fields(&self) -> Result<Option<Vec<String>>> {
        let Some(value) = self.json("fields")? else {
            return Ok(None);
        };
        let Value::Array(items) = value else {
            return Err(Error::invalid_parameter("fields", "expected a list of field names"));
        };
        let fields = items
            .into_iter()
            .map(|item| match item {
                Value::String(field) => Ok(field),
                other => Err(Error::invalid_parameter(
                    "fields",
                    format!("expected a field name, got {other}"),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        if fields.is_empty() || fields.iter().any(|f| f == "*") {
            Ok(None)
        } else {
            Ok(Some(fields))
        }
    }

    /// Sort order, `creation desc` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if `order_by` does not parse.
    pub fn order_by(&self) -> Result<OrderBy> {
        self.text("order_by")
            .map_or_else(|| Ok(OrderBy::default()), |s| s.parse())
    }
}
