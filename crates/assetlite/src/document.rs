//! Documents: schemaless records with standard metadata and child tables.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::doctype::DocType;
use crate::error::{Error, Result};

/// Free-form document fields.
pub type Fields = Map<String, Value>;

/// Fields every document carries outside its free-form data.
pub const STANDARD_FIELDS: &[&str] = &[
    "name",
    "owner",
    "creation",
    "modified",
    "modified_by",
    "docstatus",
    "idx",
];

/// Fields a child row carries outside its free-form data.
const CHILD_FIELDS: &[&str] = &["name", "parent", "parenttype", "parentfield", "idx", "doctype"];

/// Current time in the store's timestamp format.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// A stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Entity type.
    pub doctype: DocType,
    /// Unique name within the entity type. Empty until inserted.
    pub name: String,
    /// User that created the document.
    pub owner: String,
    /// Creation timestamp.
    pub creation: String,
    /// Last modification timestamp.
    pub modified: String,
    /// User that last modified the document.
    pub modified_by: String,
    /// 0 draft, 1 submitted, 2 cancelled.
    pub docstatus: i64,
    /// Position hint.
    pub idx: i64,
    /// Free-form fields, excluding child tables.
    pub fields: Fields,
    /// Child rows keyed by parent field.
    pub children: BTreeMap<String, Vec<ChildRow>>,
}

/// A row of a child table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildRow {
    /// Unique row name. Empty until stored.
    pub name: String,
    /// Entity type of the row.
    pub doctype: DocType,
    /// 1-based position within the table.
    pub idx: i64,
    /// Free-form fields.
    pub fields: Fields,
}

impl Document {
    /// An empty draft of the given type.
    #[must_use]
    pub fn new(doctype: DocType) -> Self {
        let children = doctype
            .child_tables()
            .iter()
            .map(|table| (table.fieldname.to_string(), Vec::new()))
            .collect();
        Self {
            doctype,
            name: String::new(),
            owner: String::new(),
            creation: String::new(),
            modified: String::new(),
            modified_by: String::new(),
            docstatus: 0,
            idx: 0,
            fields: Fields::new(),
            children,
        }
    }

    /// Build a draft from a request payload.
    ///
    /// A `name` and `docstatus` in the payload are honoured, child table
    /// arrays become rows, and `doctype` keys are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if a child table value is not an array of objects.
    pub fn from_fields(doctype: DocType, payload: Fields) -> Result<Self> {
        let mut doc = Self::new(doctype);
        doc.apply(payload)?;
        Ok(doc)
    }

    /// Merge updates into the document.
    ///
    /// Child table keys replace the whole table. Timestamps and ownership are
    /// left alone; `name` is only taken while the document is unnamed.
    ///
    /// # Errors
    ///
    /// Returns an error if a child table value is not an array of objects, or
    /// if `docstatus` is out of range or moves backwards on a saved document.
    pub fn apply(&mut self, updates: Fields) -> Result<()> {
        for (key, value) in updates {
            match key.as_str() {
                "doctype" | "owner" | "creation" | "modified" | "modified_by" => {}
                "name" => {
                    if self.name.is_empty() {
                        if let Some(name) = value.as_str() {
                            self.name = name.trim().to_string();
                        }
                    }
                }
                "docstatus" => self.set_docstatus(cint(&value))?,
                "idx" => self.idx = cint(&value),
                _ => {
                    if let Some(table) = self.doctype.child_table(&key) {
                        let rows = child_rows_from_value(table.doctype, &key, value)?;
                        self.children.insert(key, rows);
                    } else {
                        self.fields.insert(key, value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Move to a new docstatus: 0 draft, 1 submitted, 2 cancelled.
    ///
    /// Unsaved documents may start in any state. Saved ones only go forward,
    /// draft to submitted and submitted to cancelled.
    fn set_docstatus(&mut self, next: i64) -> Result<()> {
        if !(0..=2).contains(&next) {
            return Err(Error::validation(format!("Invalid docstatus {next}")));
        }
        let allowed = self.creation.is_empty()
            || next == self.docstatus
            || next == self.docstatus + 1;
        if !allowed {
            return Err(Error::validation(format!(
                "Cannot change docstatus from {} to {next}",
                self.docstatus
            )));
        }
        self.docstatus = next;
        Ok(())
    }

    /// Value of any field, standard or free-form. Missing fields are `Null`.
    #[must_use]
    pub fn value(&self, field: &str) -> Value {
        match field {
            "doctype" => Value::from(self.doctype.as_str()),
            "name" => Value::from(self.name.clone()),
            "owner" => Value::from(self.owner.clone()),
            "creation" => Value::from(self.creation.clone()),
            "modified" => Value::from(self.modified.clone()),
            "modified_by" => Value::from(self.modified_by.clone()),
            "docstatus" => Value::from(self.docstatus),
            "idx" => Value::from(self.idx),
            _ => {
                if let Some(rows) = self.children.get(field) {
                    Value::Array(rows.iter().map(|row| row.to_json(self, field)).collect())
                } else {
                    self.fields.get(field).cloned().unwrap_or(Value::Null)
                }
            }
        }
    }

    /// A free-form field as a string slice, if it is a string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// A free-form field read as a number; anything unparseable is 0.
    #[must_use]
    pub fn get_f64(&self, field: &str) -> f64 {
        self.fields.get(field).map_or(0.0, flt)
    }

    /// Set a free-form field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Rows of a child table.
    #[must_use]
    pub fn rows(&self, fieldname: &str) -> &[ChildRow] {
        self.children.get(fieldname).map_or(&[], Vec::as_slice)
    }

    /// Mutable rows of a child table.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity type has no such child table.
    pub fn rows_mut(&mut self, fieldname: &str) -> Result<&mut Vec<ChildRow>> {
        if self.doctype.child_table(fieldname).is_none() {
            return Err(Error::validation(format!(
                "{} has no child table {fieldname}",
                self.doctype
            )));
        }
        Ok(self.children.entry(fieldname.to_string()).or_default())
    }

    /// Append a row to a child table.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity type has no such child table.
    pub fn append(&mut self, fieldname: &str, fields: Fields) -> Result<&ChildRow> {
        let doctype = self
            .doctype
            .child_table(fieldname)
            .map(|table| table.doctype)
            .ok_or_else(|| {
                Error::validation(format!("{} has no child table {fieldname}", self.doctype))
            })?;
        let rows = self.children.entry(fieldname.to_string()).or_default();
        let mut row = ChildRow::new(doctype, fields);
        row.idx = i64::try_from(rows.len()).unwrap_or(i64::MAX) + 1;
        rows.push(row);
        Ok(&rows[rows.len() - 1])
    }

    /// Full JSON representation including standard fields and child tables.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = Fields::new();
        for field in STANDARD_FIELDS {
            out.insert((*field).to_string(), self.value(field));
        }
        out.insert("doctype".to_string(), Value::from(self.doctype.as_str()));
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        for (fieldname, rows) in &self.children {
            let rows = rows.iter().map(|row| row.to_json(self, fieldname)).collect();
            out.insert(fieldname.clone(), Value::Array(rows));
        }
        Value::Object(out)
    }

    /// JSON with only the requested fields. `*` selects everything.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Value {
        if fields.is_empty() || fields.iter().any(|f| f == "*") {
            return self.to_json();
        }
        let out = fields
            .iter()
            .map(|field| (field.clone(), self.value(field)))
            .collect::<Fields>();
        Value::Object(out)
    }
}

impl ChildRow {
    /// A new unnamed row.
    #[must_use]
    pub fn new(doctype: DocType, mut fields: Fields) -> Self {
        let name = fields
            .remove("name")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let idx = fields.get("idx").map_or(0, cint);
        for key in CHILD_FIELDS {
            fields.remove(*key);
        }
        Self {
            name,
            doctype,
            idx,
            fields,
        }
    }

    /// A free-form field as a string slice, if it is a string.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Merge updates into the row, ignoring structural fields.
    pub fn apply(&mut self, updates: Fields) {
        for (key, value) in updates {
            if !CHILD_FIELDS.contains(&key.as_str()) {
                self.fields.insert(key, value);
            }
        }
    }

    /// JSON representation including parent linkage.
    #[must_use]
    pub fn to_json(&self, parent: &Document, parentfield: &str) -> Value {
        let mut out = Fields::new();
        out.insert("name".to_string(), Value::from(self.name.clone()));
        out.insert("doctype".to_string(), Value::from(self.doctype.as_str()));
        out.insert("parent".to_string(), Value::from(parent.name.clone()));
        out.insert(
            "parenttype".to_string(),
            Value::from(parent.doctype.as_str()),
        );
        out.insert("parentfield".to_string(), Value::from(parentfield));
        out.insert("idx".to_string(), Value::from(self.idx));
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        Value::Object(out)
    }
}

fn child_rows_from_value(doctype: DocType, fieldname: &str, value: Value) -> Result<Vec<ChildRow>> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => {
            return Err(Error::validation(format!(
                "{fieldname} must be a list of rows"
            )))
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            Value::Object(fields) => {
                let mut row = ChildRow::new(doctype, fields);
                row.idx = i64::try_from(position).unwrap_or(i64::MAX) + 1;
                Ok(row)
            }
            _ => Err(Error::validation(format!(
                "{fieldname} rows must be objects"
            ))),
        })
        .collect()
}

/// Read a JSON value as a float the lenient way: numbers, numeric strings and
/// booleans convert, everything else is 0.
#[must_use]
pub fn flt(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

/// Read a JSON value as an integer the lenient way.
#[must_use]
pub fn cint(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// Whether a value counts as set: not null, not empty, not zero, not false.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Round half away from zero to `digits` decimal places.
#[must_use]
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10_f64.powi(digits);
    (value * factor).round() / factor
}
