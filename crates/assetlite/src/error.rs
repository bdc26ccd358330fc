//! Error types for assetlite.
//!
//! Every fallible operation in the crate returns [`Result`]. The endpoint layer
//! turns these into failure envelopes carrying the error's display text.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for assetlite operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Document Errors ===
    /// The entity type name is not known.
    #[error("Unknown DocType: {0}")]
    UnknownDocType(String),

    /// A document does not exist.
    #[error("{doctype} {name} not found")]
    NotFound {
        /// Entity type of the missing document.
        doctype: String,
        /// Name of the missing document.
        name: String,
    },

    /// A document with the same name already exists.
    #[error("{doctype} {name} already exists")]
    DuplicateEntry {
        /// Entity type of the conflicting document.
        doctype: String,
        /// Conflicting name.
        name: String,
    },

    /// A document failed validation.
    #[error("{0}")]
    Validation(String),

    /// A filter or ordering expression could not be understood.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    // === Permission Errors ===
    /// The session user may not perform the operation.
    #[error("{0}")]
    PermissionDenied(String),

    // === Endpoint Errors ===
    /// A required request parameter is missing or empty.
    #[error("{0} is required")]
    MissingParameter(String),

    /// A request parameter could not be decoded.
    #[error("invalid value for {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Why decoding failed.
        message: String,
    },

    /// No whitelisted method with this name exists.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    // === Report Errors ===
    /// No report with this name exists.
    #[error("Unknown report: {0}")]
    UnknownReport(String),

    // === Attachment Errors ===
    /// The QR payload could not be encoded.
    #[error("QR encoding failed: {0}")]
    QrEncode(String),

    /// The attachment image could not be encoded.
    #[error("image encoding failed: {0}")]
    ImageEncode(#[from] image::ImageError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for assetlite operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<qrcode::types::QrError> for Error {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::QrEncode(err.to_string())
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a permission denied error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Create a missing parameter error.
    #[must_use]
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingParameter(what.into())
    }

    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(doctype: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            doctype: doctype.into(),
            name: name.into(),
        }
    }

    /// Check if this error means a document or method does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::UnknownMethod(_)
                | Self::UnknownReport(_)
                | Self::UnknownDocType(_)
        )
    }

    /// Check if this error is a permission issue.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Check if this error was caused by bad caller input.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter(_)
                | Self::InvalidParameter { .. }
                | Self::InvalidFilter(_)
                | Self::Validation(_)
                | Self::DuplicateEntry { .. }
                | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::missing("Asset name");
        assert_eq!(err.to_string(), "Asset name is required");

        let err = Error::not_found("Asset", "ACC-ASS-2025-00001");
        assert_eq!(err.to_string(), "Asset ACC-ASS-2025-00001 not found");
    }

    #[test]
    fn test_validation_error_is_bare_message() {
        let err = Error::validation("Finance book entry not found");
        assert_eq!(err.to_string(), "Finance book entry not found");
    }

    #[test]
    fn test_error_is_not_found() {
        assert!(Error::not_found("Asset", "x").is_not_found());
        assert!(Error::UnknownMethod("nope".to_string()).is_not_found());
        assert!(!Error::internal("boom").is_not_found());
    }

    #[test]
    fn test_error_is_permission_error() {
        let err = Error::permission_denied("Not permitted to read Asset");
        assert!(err.is_permission_error());
        assert!(!Error::missing("x").is_permission_error());
    }

    #[test]
    fn test_error_is_client_error() {
        assert!(Error::missing("filters").is_client_error());
        assert!(Error::InvalidFilter("bad op".to_string()).is_client_error());
        assert!(Error::invalid_parameter("limit", "not a number").is_client_error());
        assert!(!Error::internal("bug").is_client_error());
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = Error::invalid_parameter("limit", "expected an integer");
        let msg = err.to_string();
        assert!(msg.contains("limit"));
        assert!(msg.contains("expected an integer"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "user_header must not be empty".to_string(),
        };
        assert!(err.to_string().contains("user_header"));
    }

    #[test]
    fn test_duplicate_entry_display() {
        let err = Error::DuplicateEntry {
            doctype: "Location".to_string(),
            name: "Main Hospital".to_string(),
        };
        assert_eq!(err.to_string(), "Location Main Hospital already exists");
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
