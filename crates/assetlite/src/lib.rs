//! `assetlite` - asset, work order and preventive maintenance service.
//!
//! Documents live in a single `SQLite` database behind the
//! [`DocumentStore`](store::DocumentStore) trait. Access goes through a
//! [`Desk`], which applies role grants and per-user permission filters before
//! anything is read or written. The [`api`] module exposes the operations as
//! RPC-style HTTP endpoints; [`reports`] computes the maintenance and supplier
//! aggregates.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod api;
pub mod cli;
pub mod config;
pub mod doctype;
pub mod document;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod permission;
pub mod reports;
pub mod service;
pub mod storage;
pub mod store;

pub use config::Config;
pub use doctype::DocType;
pub use document::Document;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use service::{Desk, Site};
pub use storage::{Storage, StorageStats};
