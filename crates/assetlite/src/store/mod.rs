//! The document store capability.
//!
//! [`DocumentStore`] is the seam between request handling and persistence:
//! the permission resolver, lifecycle hooks and endpoints only talk to this
//! trait. [`crate::storage::Storage`] implements it on `SQLite`.

pub mod filter;

use std::str::FromStr;

pub use filter::{parse_filters, validate_field_name, Filter, Operator};

use serde_json::Value;

use crate::doctype::DocType;
use crate::document::{ChildRow, Document};
use crate::error::{Error, Result};

/// Sort order of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to sort on.
    pub field: String,
    /// Descending when true.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending on a field.
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    /// Descending on a field.
    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::desc("creation")
    }
}

impl FromStr for OrderBy {
    type Err = Error;

    /// Parses `"field"`, `"field asc"` or `"field desc"`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| Error::InvalidFilter("order_by must name a field".to_string()))?;
        validate_field_name(field)?;
        let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(Error::InvalidFilter(format!(
                    "invalid sort direction: {other}"
                )))
            }
        };
        if parts.next().is_some() {
            return Err(Error::InvalidFilter(format!("invalid order_by: {s}")));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

/// A filtered, ordered, paginated listing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Predicates, all of which must hold.
    pub filters: Vec<Filter>,
    /// Predicates of which at least one must hold, when non-empty.
    pub or_filters: Vec<Filter>,
    /// Sort order.
    pub order_by: OrderBy,
    /// Maximum rows, `None` for all.
    pub limit: Option<usize>,
    /// Rows to skip.
    pub offset: usize,
}

impl ListQuery {
    /// An unfiltered listing in default order.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one predicate.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add several predicates.
    #[must_use]
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Require at least one of several predicates.
    #[must_use]
    pub fn any_of(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.or_filters.extend(filters);
        self
    }

    /// Set the sort order.
    #[must_use]
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the page offset.
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// A child row located by name, with its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedChild {
    /// Name of the parent document.
    pub parent: String,
    /// Parent field holding the row.
    pub parentfield: String,
    /// The row.
    pub row: ChildRow,
}

/// Persistence for documents and their attachments.
pub trait DocumentStore {
    /// List documents matching a query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is invalid or the backend fails.
    fn list(&self, doctype: DocType, query: &ListQuery) -> Result<Vec<Document>>;

    /// Count documents matching all filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the filters are invalid or the backend fails.
    fn count(&self, doctype: DocType, filters: &[Filter]) -> Result<usize>;

    /// Fetch one document with its child tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn get(&self, doctype: DocType, name: &str) -> Result<Option<Document>>;

    /// Insert a new document, naming it if needed, and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if a document of that name exists or naming fails.
    fn insert(&self, doc: Document, user: &str) -> Result<Document>;

    /// Replace an existing document and its child tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist.
    fn update(&self, doc: Document, user: &str) -> Result<Document>;

    /// Delete a document and its child rows. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete(&self, doctype: DocType, name: &str) -> Result<bool>;

    /// Set a single field without touching anything else.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist.
    fn set_value(&self, doctype: DocType, name: &str, field: &str, value: Value) -> Result<()>;

    /// Find a child row by its own name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_child(&self, doctype: DocType, name: &str) -> Result<Option<LocatedChild>>;

    /// Store attachment bytes, returning their content hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn put_file_content(&self, content: &[u8]) -> Result<String>;

    /// Attachment bytes by content hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn file_content(&self, content_hash: &str) -> Result<Option<Vec<u8>>>;

    /// Fetch a document that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if it does not.
    fn get_doc(&self, doctype: DocType, name: &str) -> Result<Document> {
        self.get(doctype, name)?
            .ok_or_else(|| Error::not_found(doctype.as_str(), name))
    }

    /// Whether any document matches the filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the filters are invalid or the backend fails.
    fn exists(&self, doctype: DocType, filters: &[Filter]) -> Result<bool> {
        Ok(self.count(doctype, filters)? > 0)
    }

    /// First document matching a query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is invalid or the backend fails.
    fn first(&self, doctype: DocType, query: ListQuery) -> Result<Option<Document>> {
        Ok(self.list(doctype, &query.limit(1))?.into_iter().next())
    }
}
