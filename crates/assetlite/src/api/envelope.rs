//! The uniform response envelope.
//!
//! Success: `{"success": true, "data": ..., "message": ...}`.
//! Failure: `{"success": false, "error": "...", "data": ...}` where `data` is
//! the method's empty result, if it has one. The status code follows the
//! error kind; the body text never does.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Payload of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Result data.
    pub data: Value,
    /// Human-readable outcome, set by mutations.
    pub message: Option<String>,
}

impl Reply {
    /// Data without a message.
    #[must_use]
    pub fn data(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            message: None,
        }
    }

    /// Data with a message.
    #[must_use]
    pub fn with_message(data: impl Into<Value>, message: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            message: Some(message.into()),
        }
    }

    /// A message and no data.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_message(Value::Null, message)
    }
}

#[derive(Debug, Serialize)]
struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// HTTP status for an error.
#[must_use]
pub fn error_status(err: &Error) -> StatusCode {
    if err.is_permission_error() {
        StatusCode::FORBIDDEN
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// 200 response carrying a reply.
#[must_use]
pub fn success(reply: Reply) -> Response {
    let body = Envelope {
        success: true,
        data: Some(reply.data),
        error: None,
        message: reply.message,
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Error response carrying the error text and an optional empty result.
#[must_use]
pub fn failure(err: &Error, empty: Option<Value>) -> Response {
    let body = Envelope {
        success: false,
        data: empty,
        error: Some(err.to_string()),
        message: None,
    };
    (error_status(err), Json(body)).into_response()
}
