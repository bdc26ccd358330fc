//! Document lifecycle hooks.
//!
//! Hooks run after a document is inserted or saved, inside the same store
//! transaction as the save itself.

mod qr;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::doctype::DocType;
use crate::document::Document;
use crate::error::Result;
use crate::store::DocumentStore;

pub use qr::{AssetQrCode, QR_FIELD};
pub(crate) use qr::find_public_file;

/// A callback run after a document is saved.
pub trait DocumentHook: fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run against the saved document.
    ///
    /// # Errors
    ///
    /// Any error aborts the surrounding save.
    fn after_save(&self, store: &dyn DocumentStore, doc: &Document, user: &str) -> Result<()>;
}

/// Hooks keyed by the entity type they watch.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<DocType, Vec<Arc<dyn DocumentHook>>>,
}

impl HookRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard hooks: QR codes on assets.
    #[must_use]
    pub fn standard(site_url: &str) -> Self {
        let mut registry = Self::new();
        registry.register(DocType::Asset, Arc::new(AssetQrCode::new(site_url)));
        registry
    }

    /// Watch an entity type.
    pub fn register(&mut self, doctype: DocType, hook: Arc<dyn DocumentHook>) {
        self.hooks.entry(doctype).or_default().push(hook);
    }

    /// Number of hooks watching an entity type.
    #[must_use]
    pub fn count(&self, doctype: DocType) -> usize {
        self.hooks.get(&doctype).map_or(0, Vec::len)
    }

    /// Run every hook for the document's type, in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first hook error.
    pub fn after_save(&self, store: &dyn DocumentStore, doc: &Document, user: &str) -> Result<()> {
        for hook in self.hooks.get(&doc.doctype).into_iter().flatten() {
            debug!("Running hook {} on {} {}", hook.name(), doc.doctype, doc.name);
            hook.after_save(store, doc, user)?;
        }
        Ok(())
    }
}
