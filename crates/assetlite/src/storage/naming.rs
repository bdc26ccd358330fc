//! Name assignment for new documents and child rows.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Datelike, Utc};
use rusqlite::Connection;

use crate::doctype::{DocType, NamingRule};
use crate::document::Document;
use crate::error::{Error, Result};

static HASH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Pick the name a new document will be stored under.
///
/// An explicit name wins. Otherwise the doctype's naming rule applies.
///
/// # Errors
///
/// Returns an error if a field-named document lacks its naming field.
pub(crate) fn resolve_name(conn: &Connection, doc: &Document) -> Result<String> {
    if !doc.name.trim().is_empty() {
        return Ok(doc.name.trim().to_string());
    }
    match doc.doctype.naming_rule() {
        NamingRule::Series(prefix) => next_in_series(conn, prefix),
        NamingRule::Field(field) => doc
            .get_str(field)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::missing(field)),
        NamingRule::Hash => Ok(hash_name(doc.doctype)),
    }
}

/// Next name of a yearly series such as `WO-2025-00042`.
pub(crate) fn next_in_series(conn: &Connection, prefix: &str) -> Result<String> {
    let series = format!("{prefix}{}-", Utc::now().year());
    let counter: i64 = conn.query_row(
        r"
        INSERT INTO naming_series (prefix, counter) VALUES (?1, 1)
        ON CONFLICT(prefix) DO UPDATE SET counter = counter + 1
        RETURNING counter
        ",
        [&series],
        |row| row.get(0),
    )?;
    Ok(format!("{series}{counter:05}"))
}

/// A random-looking 10 character name.
pub(crate) fn hash_name(doctype: DocType) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let sequence = HASH_COUNTER.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(doctype.as_str().as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&sequence.to_le_bytes());
    hasher.finalize().to_hex()[..10].to_string()
}
