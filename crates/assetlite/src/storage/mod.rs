//! Storage layer for assetlite.
//!
//! This module provides `SQLite`-based persistence for documents, their child
//! tables and attachment content, and implements [`DocumentStore`] on top.

pub mod migrations;
mod naming;
mod query;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::doctype::DocType;
use crate::document::{now_timestamp, ChildRow, Document, Fields};
use crate::error::{Error, Result};
use crate::store::{validate_field_name, DocumentStore, Filter, ListQuery, LocatedChild};

/// Storage engine for documents.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Naming series and hash names
/// - Filtered, ordered and paginated listings over JSON fields
/// - Child tables stored alongside their parents
/// - Content-addressed attachment bytes
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw connection, for aggregate queries.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction. Any error rolls everything back.
    ///
    /// Called while a transaction is already open, `f` joins it and the
    /// outermost call decides the outcome.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or an error if the transaction cannot commit.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        if !self.conn.is_autocommit() {
            return f(self);
        }
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT doctype, COUNT(*) FROM documents GROUP BY doctype ORDER BY doctype")?;
        let by_doctype = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        let total_documents = by_doctype.values().sum();

        let total_files: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM file_contents", [], |row| row.get(0))?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_documents,
            by_doctype,
            total_files,
            db_size_bytes,
        })
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<(Document, String)> {
        let doctype: String = row.get(0)?;
        let data: String = row.get(8)?;
        let doctype = doctype.parse::<DocType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let mut doc = Document::new(doctype);
        doc.name = row.get(1)?;
        doc.owner = row.get(2)?;
        doc.creation = row.get(3)?;
        doc.modified = row.get(4)?;
        doc.modified_by = row.get(5)?;
        doc.docstatus = row.get(6)?;
        doc.idx = row.get(7)?;
        Ok((doc, data))
    }

    fn decode_fields(data: &str) -> Result<Fields> {
        match serde_json::from_str(data)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::internal("stored document data is not an object")),
        }
    }

    fn load_children(&self, doc: &mut Document) -> Result<()> {
        if doc.doctype.child_tables().is_empty() {
            return Ok(());
        }
        let mut stmt = self.conn.prepare(
            r"
            SELECT name, doctype, parentfield, idx, data FROM child_rows
            WHERE parenttype = ?1 AND parent = ?2
            ORDER BY parentfield, idx
            ",
        )?;
        let rows = stmt
            .query_map(params![doc.doctype.as_str(), doc.name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (name, doctype, parentfield, idx, data) in rows {
            let row = ChildRow {
                name,
                doctype: doctype.parse()?,
                idx,
                fields: Self::decode_fields(&data)?,
            };
            doc.children.entry(parentfield).or_default().push(row);
        }
        Ok(())
    }

    fn write_children(&self, doc: &mut Document) -> Result<()> {
        self.conn.execute(
            "DELETE FROM child_rows WHERE parenttype = ?1 AND parent = ?2",
            params![doc.doctype.as_str(), doc.name],
        )?;
        for (parentfield, rows) in &mut doc.children {
            for (position, row) in rows.iter_mut().enumerate() {
                if row.name.is_empty() {
                    row.name = naming::hash_name(row.doctype);
                }
                row.idx = i64::try_from(position).unwrap_or(i64::MAX) + 1;
                self.conn.execute(
                    r"
                    INSERT INTO child_rows (name, doctype, parent, parenttype, parentfield, idx, data)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ",
                    params![
                        row.name,
                        row.doctype.as_str(),
                        doc.name,
                        doc.doctype.as_str(),
                        parentfield,
                        row.idx,
                        serde_json::to_string(&row.fields)?,
                    ],
                )?;
            }
        }
        Ok(())
    }

    fn exists_by_name(&self, doctype: DocType, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE doctype = ?1 AND name = ?2",
            params![doctype.as_str(), name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl DocumentStore for Storage {
    fn list(&self, doctype: DocType, query: &ListQuery) -> Result<Vec<Document>> {
        let mut clause = query::build_where(doctype.as_str(), &query.filters)?;
        query::push_any(&mut clause, &query.or_filters)?;
        let order = query::build_order(&query.order_by)?;
        let limit = query.limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);

        let sql = format!(
            r"
            SELECT doctype, name, owner, creation, modified, modified_by, docstatus, idx, data
            FROM documents WHERE {} ORDER BY {order} LIMIT {limit} OFFSET {offset}
            ",
            clause.sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(clause.params.iter()), Self::row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut docs = Vec::with_capacity(rows.len());
        for (mut doc, data) in rows {
            doc.fields = Self::decode_fields(&data)?;
            self.load_children(&mut doc)?;
            docs.push(doc);
        }
        Ok(docs)
    }

    fn count(&self, doctype: DocType, filters: &[Filter]) -> Result<usize> {
        let clause = query::build_where(doctype.as_str(), filters)?;
        let sql = format!("SELECT COUNT(*) FROM documents WHERE {}", clause.sql);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(clause.params.iter()), |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn get(&self, doctype: DocType, name: &str) -> Result<Option<Document>> {
        let row = self
            .conn
            .query_row(
                r"
                SELECT doctype, name, owner, creation, modified, modified_by, docstatus, idx, data
                FROM documents WHERE doctype = ?1 AND name = ?2
                ",
                params![doctype.as_str(), name],
                Self::row_to_document,
            )
            .optional()?;

        match row {
            Some((mut doc, data)) => {
                doc.fields = Self::decode_fields(&data)?;
                self.load_children(&mut doc)?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn insert(&self, mut doc: Document, user: &str) -> Result<Document> {
        doc.name = naming::resolve_name(&self.conn, &doc)?;
        if self.exists_by_name(doc.doctype, &doc.name)? {
            return Err(Error::DuplicateEntry {
                doctype: doc.doctype.to_string(),
                name: doc.name,
            });
        }

        let now = now_timestamp();
        doc.owner = user.to_string();
        doc.modified_by = user.to_string();
        doc.creation.clone_from(&now);
        doc.modified = now;

        self.conn.execute(
            r"
            INSERT INTO documents (doctype, name, owner, creation, modified, modified_by, docstatus, idx, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                doc.doctype.as_str(),
                doc.name,
                doc.owner,
                doc.creation,
                doc.modified,
                doc.modified_by,
                doc.docstatus,
                doc.idx,
                serde_json::to_string(&doc.fields)?,
            ],
        )?;
        self.write_children(&mut doc)?;

        debug!("Inserted {} {}", doc.doctype, doc.name);
        Ok(doc)
    }

    fn update(&self, mut doc: Document, user: &str) -> Result<Document> {
        doc.modified = now_timestamp();
        doc.modified_by = user.to_string();

        let affected = self.conn.execute(
            r"
            UPDATE documents SET modified = ?3, modified_by = ?4, docstatus = ?5, idx = ?6, data = ?7
            WHERE doctype = ?1 AND name = ?2
            ",
            params![
                doc.doctype.as_str(),
                doc.name,
                doc.modified,
                doc.modified_by,
                doc.docstatus,
                doc.idx,
                serde_json::to_string(&doc.fields)?,
            ],
        )?;
        if affected == 0 {
            return Err(Error::not_found(doc.doctype.as_str(), doc.name));
        }
        self.write_children(&mut doc)?;

        debug!("Updated {} {}", doc.doctype, doc.name);
        Ok(doc)
    }

    fn delete(&self, doctype: DocType, name: &str) -> Result<bool> {
        self.conn.execute(
            "DELETE FROM child_rows WHERE parenttype = ?1 AND parent = ?2",
            params![doctype.as_str(), name],
        )?;
        let affected = self.conn.execute(
            "DELETE FROM documents WHERE doctype = ?1 AND name = ?2",
            params![doctype.as_str(), name],
        )?;
        if affected > 0 {
            debug!("Deleted {} {}", doctype, name);
        }
        Ok(affected > 0)
    }

    fn set_value(&self, doctype: DocType, name: &str, field: &str, value: Value) -> Result<()> {
        validate_field_name(field)?;
        let affected = self.conn.execute(
            r"
            UPDATE documents SET data = json_set(data, '$.' || ?3, json(?4)), modified = ?5
            WHERE doctype = ?1 AND name = ?2
            ",
            params![
                doctype.as_str(),
                name,
                field,
                serde_json::to_string(&value)?,
                now_timestamp(),
            ],
        )?;
        if affected == 0 {
            return Err(Error::not_found(doctype.as_str(), name));
        }
        Ok(())
    }

    fn find_child(&self, doctype: DocType, name: &str) -> Result<Option<LocatedChild>> {
        let row = self
            .conn
            .query_row(
                r"
                SELECT parent, parentfield, idx, data FROM child_rows
                WHERE doctype = ?1 AND name = ?2
                ",
                params![doctype.as_str(), name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(parent, parentfield, idx, data)| {
            Ok(LocatedChild {
                parent,
                parentfield,
                row: ChildRow {
                    name: name.to_string(),
                    doctype,
                    idx,
                    fields: Self::decode_fields(&data)?,
                },
            })
        })
        .transpose()
    }

    fn put_file_content(&self, content: &[u8]) -> Result<String> {
        let hash = blake3::hash(content).to_hex().to_string();
        let size = i64::try_from(content.len()).unwrap_or(i64::MAX);
        self.conn.execute(
            "INSERT OR IGNORE INTO file_contents (content_hash, content, size) VALUES (?1, ?2, ?3)",
            params![hash, content, size],
        )?;
        Ok(hash)
    }

    fn file_content(&self, content_hash: &str) -> Result<Option<Vec<u8>>> {
        let content = self
            .conn
            .query_row(
                "SELECT content FROM file_contents WHERE content_hash = ?1",
                [content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Total number of documents stored.
    pub total_documents: i64,
    /// Document counts per entity type.
    pub by_doctype: BTreeMap<String, i64>,
    /// Number of distinct attachment contents.
    pub total_files: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Operator, OrderBy};
    use serde_json::json;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn asset(company: &str, location: &str) -> Document {
        let mut doc = Document::new(DocType::Asset);
        doc.set("asset_name", "Ventilator");
        doc.set("company", company);
        doc.set("location", location);
        doc
    }

    #[test]
    fn test_open_in_memory() {
        let storage = Storage::open_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_insert_assigns_series_name() {
        let storage = create_test_storage();
        let first = storage.insert(asset("Corp1", "Ward 1"), "Administrator").unwrap();
        let second = storage.insert(asset("Corp1", "Ward 1"), "Administrator").unwrap();

        assert!(first.name.starts_with("ACC-ASS-"));
        assert!(first.name.ends_with("-00001"));
        assert!(second.name.ends_with("-00002"));
        assert_eq!(first.owner, "Administrator");
        assert!(!first.creation.is_empty());
    }

    #[test]
    fn test_insert_and_get() {
        let storage = create_test_storage();
        let doc = storage.insert(asset("Corp1", "Ward 1"), "alice@example.com").unwrap();

        let retrieved = storage.get(DocType::Asset, &doc.name).unwrap().unwrap();
        assert_eq!(retrieved.get_str("company"), Some("Corp1"));
        assert_eq!(retrieved.owner, "alice@example.com");
        assert!(storage.get(DocType::Asset, "missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_name() {
        let storage = create_test_storage();
        let mut location = Document::new(DocType::Location);
        location.set("location_name", "Main Hospital");
        storage.insert(location.clone(), "Administrator").unwrap();

        let err = storage.insert(location, "Administrator").unwrap_err();
        assert!(matches!(err, Error::DuplicateEntry { .. }));
    }

    #[test]
    fn test_child_rows_round_trip_in_order() {
        let storage = create_test_storage();
        let mut doc = Document::new(DocType::MaterialRequest);
        doc.append("items", json!({"item_code": "Filter"}).as_object().cloned().unwrap())
            .unwrap();
        doc.append("items", json!({"item_code": "Valve"}).as_object().cloned().unwrap())
            .unwrap();
        let doc = storage.insert(doc, "Administrator").unwrap();

        let loaded = storage.get(DocType::MaterialRequest, &doc.name).unwrap().unwrap();
        let items = loaded.rows("items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get_str("item_code"), Some("Filter"));
        assert_eq!(items[1].idx, 2);
        assert_eq!(items[0].name.len(), 10);
    }

    #[test]
    fn test_update_replaces_children() {
        let storage = create_test_storage();
        let mut doc = Document::new(DocType::MaterialRequest);
        doc.append("items", json!({"item_code": "Filter"}).as_object().cloned().unwrap())
            .unwrap();
        let mut doc = storage.insert(doc, "Administrator").unwrap();
        let kept_name = doc.rows("items")[0].name.clone();

        doc.append("items", json!({"item_code": "Valve"}).as_object().cloned().unwrap())
            .unwrap();
        doc.set("material_request_type", "Purchase");
        storage.update(doc.clone(), "bob@example.com").unwrap();

        let loaded = storage.get(DocType::MaterialRequest, &doc.name).unwrap().unwrap();
        assert_eq!(loaded.rows("items").len(), 2);
        assert_eq!(loaded.rows("items")[0].name, kept_name);
        assert_eq!(loaded.modified_by, "bob@example.com");
        assert_eq!(loaded.get_str("material_request_type"), Some("Purchase"));
    }

    #[test]
    fn test_update_missing_document() {
        let storage = create_test_storage();
        let mut doc = Document::new(DocType::WorkOrder);
        doc.name = "WO-NOPE".to_string();
        assert!(storage.update(doc, "Administrator").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_removes_children() {
        let storage = create_test_storage();
        let mut doc = Document::new(DocType::MaterialRequest);
        doc.append("items", Fields::new()).unwrap();
        let doc = storage.insert(doc, "Administrator").unwrap();
        let row_name = doc.rows("items")[0].name.clone();

        assert!(storage.delete(DocType::MaterialRequest, &doc.name).unwrap());
        assert!(storage
            .find_child(DocType::MaterialRequestItem, &row_name)
            .unwrap()
            .is_none());
        assert!(!storage.delete(DocType::MaterialRequest, &doc.name).unwrap());
    }

    #[test]
    fn test_list_with_filters_and_order() {
        let storage = create_test_storage();
        storage.insert(asset("Corp1", "Ward 1"), "Administrator").unwrap();
        storage.insert(asset("Corp2", "Ward 2"), "Administrator").unwrap();
        storage.insert(asset("Corp1", "Ward 3"), "Administrator").unwrap();

        let query = ListQuery::new()
            .filter(Filter::eq("company", "Corp1"))
            .order_by(OrderBy::asc("location"));
        let docs = storage.list(DocType::Asset, &query).unwrap();
        let locations: Vec<_> = docs.iter().filter_map(|d| d.get_str("location")).collect();
        assert_eq!(locations, vec!["Ward 1", "Ward 3"]);

        assert_eq!(
            storage.count(DocType::Asset, &[Filter::eq("company", "Corp2")]).unwrap(),
            1
        );
    }

    #[test]
    fn test_list_default_order_is_newest_first() {
        let storage = create_test_storage();
        let first = storage.insert(asset("Corp1", "Ward 1"), "Administrator").unwrap();
        let second = storage.insert(asset("Corp1", "Ward 2"), "Administrator").unwrap();

        let docs = storage.list(DocType::Asset, &ListQuery::new()).unwrap();
        assert_eq!(docs[0].name, second.name);
        assert_eq!(docs[1].name, first.name);
    }

    #[test]
    fn test_list_pagination() {
        let storage = create_test_storage();
        for i in 0..5 {
            storage
                .insert(asset("Corp1", &format!("Ward {i}")), "Administrator")
                .unwrap();
        }

        let page = ListQuery::new().order_by(OrderBy::asc("location")).limit(2).offset(2);
        let docs = storage.list(DocType::Asset, &page).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get_str("location"), Some("Ward 2"));
    }

    #[test]
    fn test_list_missing_field_matches_empty_string() {
        let storage = create_test_storage();
        let mut doc = asset("Corp1", "Ward 1");
        doc.fields.remove("location");
        storage.insert(doc, "Administrator").unwrap();

        let unset = Filter::new("location", Operator::Is, "not set").unwrap();
        assert_eq!(storage.count(DocType::Asset, &[unset]).unwrap(), 1);
        let not_ward = Filter::new("location", Operator::NotEq, "Ward 1").unwrap();
        assert_eq!(storage.count(DocType::Asset, &[not_ward]).unwrap(), 1);
    }

    #[test]
    fn test_list_numeric_comparison() {
        let storage = create_test_storage();
        for cost in [100, 250, 900] {
            let mut doc = Document::new(DocType::WorkOrder);
            doc.set("total_cost", cost);
            storage.insert(doc, "Administrator").unwrap();
        }
        let over = Filter::new("total_cost", Operator::Gt, 200).unwrap();
        assert_eq!(storage.count(DocType::WorkOrder, &[over]).unwrap(), 2);
    }

    #[test]
    fn test_list_numeric_comparison_with_text_operand() {
        let storage = create_test_storage();
        for amount in [json!(500), json!(1500), json!("2500")] {
            let mut doc = asset("Corp1", "Ward 1");
            doc.set("gross_purchase_amount", amount);
            storage.insert(doc, "Administrator").unwrap();
        }
        let over = Filter::new("gross_purchase_amount", Operator::Gt, "1000").unwrap();
        assert_eq!(storage.count(DocType::Asset, &[over]).unwrap(), 2);
        let upto = Filter::new("gross_purchase_amount", Operator::Le, "1500").unwrap();
        assert_eq!(storage.count(DocType::Asset, &[upto]).unwrap(), 2);
    }

    #[test]
    fn test_set_value() {
        let storage = create_test_storage();
        let doc = storage.insert(asset("Corp1", "Ward 1"), "Administrator").unwrap();

        storage
            .set_value(DocType::Asset, &doc.name, "custom_attach_image", json!("/files/a.png"))
            .unwrap();
        let loaded = storage.get_doc(DocType::Asset, &doc.name).unwrap();
        assert_eq!(loaded.get_str("custom_attach_image"), Some("/files/a.png"));
        assert_eq!(loaded.get_str("company"), Some("Corp1"));

        assert!(storage
            .set_value(DocType::Asset, "missing", "x", json!(1))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_find_child() {
        let storage = create_test_storage();
        let mut doc = Document::new(DocType::AssetMaintenance);
        doc.set("asset_name", "Ventilator");
        doc.append(
            "asset_maintenance_tasks",
            json!({"maintenance_task": "Inspect"}).as_object().cloned().unwrap(),
        )
        .unwrap();
        let doc = storage.insert(doc, "Administrator").unwrap();
        let row_name = doc.rows("asset_maintenance_tasks")[0].name.clone();

        let located = storage
            .find_child(DocType::AssetMaintenanceTask, &row_name)
            .unwrap()
            .unwrap();
        assert_eq!(located.parent, "Ventilator");
        assert_eq!(located.parentfield, "asset_maintenance_tasks");
        assert_eq!(located.row.get_str("maintenance_task"), Some("Inspect"));
    }

    #[test]
    fn test_file_content_is_deduplicated() {
        let storage = create_test_storage();
        let a = storage.put_file_content(b"png bytes").unwrap();
        let b = storage.put_file_content(b"png bytes").unwrap();
        assert_eq!(a, b);
        assert_eq!(storage.file_content(&a).unwrap().unwrap(), b"png bytes");
        assert!(storage.file_content("nope").unwrap().is_none());
        assert_eq!(storage.stats().unwrap().total_files, 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let storage = create_test_storage();
        let result: Result<()> = storage.transaction(|s| {
            s.insert(asset("Corp1", "Ward 1"), "Administrator")?;
            Err(Error::validation("boom"))
        });
        assert!(result.is_err());
        assert_eq!(storage.count(DocType::Asset, &[]).unwrap(), 0);
    }

    #[test]
    fn test_nested_transaction_joins_outer() {
        let storage = create_test_storage();
        let result: Result<()> = storage.transaction(|s| {
            s.transaction(|inner| inner.insert(asset("Corp1", "Ward 1"), "Administrator"))?;
            Err(Error::validation("boom"))
        });
        assert!(result.is_err());
        assert_eq!(storage.count(DocType::Asset, &[]).unwrap(), 0);

        storage
            .transaction(|s| s.transaction(|inner| inner.insert(asset("Corp1", "Ward 1"), "Administrator")))
            .unwrap();
        assert_eq!(storage.count(DocType::Asset, &[]).unwrap(), 1);
    }

    #[test]
    fn test_stats_by_doctype() {
        let storage = create_test_storage();
        storage.insert(asset("Corp1", "Ward 1"), "Administrator").unwrap();
        storage.insert(Document::new(DocType::WorkOrder), "Administrator").unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.by_doctype.get("Asset"), Some(&1));
        assert_eq!(stats.by_doctype.get("Work_Order"), Some(&1));
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = std::env::temp_dir();
        let nested_path = temp_dir.join(format!(
            "assetlite_test_{}/nested/db.sqlite",
            std::process::id()
        ));
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());
        assert_eq!(storage.path(), nested_path);

        drop(storage);
        if let Some(parent) = nested_path.parent() {
            let _ = std::fs::remove_dir_all(parent.parent().unwrap());
        }
    }
}
