//! `SQLite` schema definitions for assetlite.
//!
//! Documents keep their free-form fields as a JSON object in `data`; child
//! rows live in `child_rows` keyed by their own name.

/// SQL statement to create the documents table.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    doctype TEXT NOT NULL,
    name TEXT NOT NULL,
    owner TEXT NOT NULL,
    creation TEXT NOT NULL,
    modified TEXT NOT NULL,
    modified_by TEXT NOT NULL,
    docstatus INTEGER NOT NULL DEFAULT 0,
    idx INTEGER NOT NULL DEFAULT 0,
    data TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (doctype, name)
)
";

/// Index for the default `creation desc` listing.
pub const CREATE_CREATION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_creation ON documents(doctype, creation DESC)
";

/// SQL statement to create the child rows table.
pub const CREATE_CHILD_ROWS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS child_rows (
    name TEXT PRIMARY KEY,
    doctype TEXT NOT NULL,
    parent TEXT NOT NULL,
    parenttype TEXT NOT NULL,
    parentfield TEXT NOT NULL,
    idx INTEGER NOT NULL,
    data TEXT NOT NULL DEFAULT '{}'
)
";

/// Index for loading a parent's rows in order.
pub const CREATE_CHILD_PARENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_child_rows_parent
ON child_rows(parenttype, parent, parentfield, idx)
";

/// SQL statement to create the attachment content table.
pub const CREATE_FILE_CONTENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS file_contents (
    content_hash TEXT PRIMARY KEY,
    content BLOB NOT NULL,
    size INTEGER NOT NULL
)
";

/// SQL statement to create the naming series counters.
pub const CREATE_NAMING_SERIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS naming_series (
    prefix TEXT PRIMARY KEY,
    counter INTEGER NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_DOCUMENTS_TABLE,
    CREATE_CREATION_INDEX,
    CREATE_CHILD_ROWS_TABLE,
    CREATE_CHILD_PARENT_INDEX,
    CREATE_FILE_CONTENTS_TABLE,
    CREATE_NAMING_SERIES_TABLE,
    CREATE_METADATA_TABLE,
];

/// Expression indexes on the fields reports group and join on.
pub const REPORT_INDEX_STATEMENTS: &[&str] = &[
    r"CREATE INDEX IF NOT EXISTS idx_documents_asset_vendor
      ON documents(json_extract(data, '$.custom_vendor')) WHERE doctype = 'Asset'",
    r"CREATE INDEX IF NOT EXISTS idx_documents_work_order_asset
      ON documents(json_extract(data, '$.asset')) WHERE doctype = 'Work_Order'",
    r"CREATE INDEX IF NOT EXISTS idx_documents_log_maintenance
      ON documents(json_extract(data, '$.asset_maintenance')) WHERE doctype = 'Asset Maintenance Log'",
    r"CREATE INDEX IF NOT EXISTS idx_documents_user_permission_user
      ON documents(json_extract(data, '$.user')) WHERE doctype = 'User Permission'",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_documents_table_contains_required_columns() {
        assert!(CREATE_DOCUMENTS_TABLE.contains("doctype TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("name TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("docstatus INTEGER NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("data TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("PRIMARY KEY (doctype, name)"));
    }

    #[test]
    fn test_child_rows_table_links_parent() {
        assert!(CREATE_CHILD_ROWS_TABLE.contains("parent TEXT NOT NULL"));
        assert!(CREATE_CHILD_ROWS_TABLE.contains("parenttype TEXT NOT NULL"));
        assert!(CREATE_CHILD_ROWS_TABLE.contains("parentfield TEXT NOT NULL"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }

    #[test]
    fn test_report_indexes_are_partial() {
        for stmt in REPORT_INDEX_STATEMENTS {
            assert!(stmt.contains("WHERE doctype ="));
        }
    }
}
