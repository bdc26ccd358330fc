//! Shared state of the HTTP server.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{HeaderMap, HeaderName};

use crate::error::{Error, Result};
use crate::permission::access::GUEST;
use crate::service::{Desk, Site};
use crate::storage::Storage;

/// State cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    storage: Arc<Mutex<Storage>>,
    site: Arc<Site>,
    user_header: HeaderName,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("user_header", &self.user_header)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wrap a storage handle and site policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `user_header` is not a valid header name.
    pub fn new(storage: Storage, site: Site, user_header: &str) -> Result<Self> {
        let user_header = HeaderName::from_bytes(user_header.as_bytes()).map_err(|e| {
            Error::ConfigValidation {
                message: format!("invalid user_header {user_header}: {e}"),
            }
        })?;
        Ok(Self {
            storage: Arc::new(Mutex::new(storage)),
            site: Arc::new(site),
            user_header,
        })
    }

    /// Session user named by the request headers, `Guest` when absent.
    #[must_use]
    pub fn user_from(&self, headers: &HeaderMap) -> String {
        headers
            .get(&self.user_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .unwrap_or(GUEST)
            .to_string()
    }

    /// Run `f` on the blocking pool with a desk for `user`.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or an internal error if the worker
    /// panicked.
    pub async fn with_desk<T, F>(&self, user: String, f: F) -> Result<T>
    where
        F: FnOnce(&Desk<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_storage(move |storage, site| {
            let desk = Desk::open(storage, site, &user)?;
            f(&desk)
        })
        .await
    }

    /// Run `f` on the blocking pool with direct storage access.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or an internal error if the worker
    /// panicked.
    pub async fn with_storage<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Storage, &Site) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        let site = Arc::clone(&self.site);
        tokio::task::spawn_blocking(move || {
            // A panicked request rolled back its transaction on unwind, so
            // the connection is still usable.
            let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            f(&storage, &site)
        })
        .await
        .map_err(|e| Error::internal(format!("request worker failed: {e}")))?
    }
}
