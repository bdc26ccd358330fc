//! Permission-checked document operations for one session.
//!
//! [`Site`] holds the process-wide policy (access grants, permission mappings,
//! hooks). A [`Desk`] binds it to a storage handle and a session user, and is
//! what request handlers and CLI commands go through.

use std::fmt;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::doctype::DocType;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::hooks::HookRegistry;
use crate::permission::{
    AccessPolicy, HomePage, PermissionMappings, PermissionResolver, Ptype, Session,
};
use crate::storage::Storage;
use crate::store::{DocumentStore, Filter, ListQuery};

/// Process-wide policy shared by every request.
#[derive(Debug, Clone)]
pub struct Site {
    /// Role grants.
    pub policy: AccessPolicy,
    /// Entity type to permission category fields.
    pub mappings: PermissionMappings,
    /// Post-save hooks.
    pub hooks: HookRegistry,
    /// Role to workspace route.
    pub home_pages: Vec<HomePage>,
    /// Language used when a request names none.
    pub default_language: String,
}

impl Site {
    /// Build the site policy from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the permission mapping table is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            policy: AccessPolicy::new(config.permissions.roles.clone()),
            mappings: PermissionMappings::from_entries(&config.permissions.mappings)?,
            hooks: HookRegistry::standard(&config.site.url),
            home_pages: config.permissions.home_pages.clone(),
            default_language: config.site.default_language.clone(),
        })
    }
}

/// A session bound to storage.
pub struct Desk<'a> {
    storage: &'a Storage,
    site: &'a Site,
    session: Session,
}

impl fmt::Debug for Desk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Desk")
            .field("user", &self.session.user)
            .field("roles", &self.session.roles)
            .finish_non_exhaustive()
    }
}

impl<'a> Desk<'a> {
    /// Open a desk for `user`, loading their roles.
    ///
    /// # Errors
    ///
    /// Returns an error if the user's roles cannot be read.
    pub fn open(storage: &'a Storage, site: &'a Site, user: &str) -> Result<Self> {
        let session = Session::load(storage, user)?;
        Ok(Self {
            storage,
            site,
            session,
        })
    }

    /// Session user and roles.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Session user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.session.user
    }

    /// Shared site policy.
    #[must_use]
    pub fn site(&self) -> &Site {
        self.site
    }

    /// Backing storage, bypassing permission checks.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        self.storage
    }

    /// Resolver over the same store and mappings.
    #[must_use]
    pub fn resolver(&self) -> PermissionResolver<'_> {
        PermissionResolver::new(self.storage, &self.site.mappings)
    }

    /// Whether the session may perform `ptype` on `doctype`, and on the named
    /// document when one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn has_permission(&self, doctype: DocType, ptype: Ptype, name: Option<&str>) -> Result<bool> {
        if self.session.is_admin() {
            return Ok(true);
        }
        if !self.site.policy.allows(&self.session.roles, doctype, ptype) {
            return Ok(false);
        }
        match name {
            Some(name) => Ok(self
                .resolver()
                .check_document_access(doctype, name, &self.session.user)?
                .has_access),
            None => Ok(true),
        }
    }

    /// Like [`Self::has_permission`], but failing with a permission error.
    ///
    /// A named document that does not exist fails with not found instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`], [`Error::NotFound`] or a store error.
    pub fn check(&self, doctype: DocType, ptype: Ptype, name: Option<&str>) -> Result<()> {
        if self.session.is_admin() {
            return Ok(());
        }
        if !self.site.policy.allows(&self.session.roles, doctype, ptype) {
            return Err(denied(doctype, ptype, None));
        }
        let Some(name) = name else {
            return Ok(());
        };
        let access = self
            .resolver()
            .check_document_access(doctype, name, &self.session.user)?;
        if access.error.is_some() {
            return Err(Error::not_found(doctype.as_str(), name));
        }
        if !access.has_access {
            debug!(
                "{} denied {} on {} {} by {:?}",
                self.session.user, ptype, doctype, name, access.denied_by
            );
            return Err(denied(doctype, ptype, Some(name)));
        }
        Ok(())
    }

    /// Filters the session's permission grants impose on `doctype`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn scope(&self, doctype: DocType) -> Result<Vec<Filter>> {
        if self.session.is_admin() {
            return Ok(Vec::new());
        }
        Ok(self
            .resolver()
            .permission_filters(doctype.as_str(), &self.session.user)?
            .to_filters())
    }

    /// Reject a document whose mapped fields fall outside the session's
    /// grants. Unset fields pass, as they do when listing.
    fn check_within_scope(&self, doc: &Document, ptype: Ptype) -> Result<()> {
        if self.session.is_admin() {
            return Ok(());
        }
        let scope = self
            .resolver()
            .permission_filters(doc.doctype.as_str(), &self.session.user)?;
        for (field, allowed) in &scope.filters {
            let value = match doc.value(field) {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };
            if !value.is_empty() && !allowed.0.contains(&value) {
                debug!(
                    "{} denied {} on {} with {} {}",
                    self.session.user, ptype, doc.doctype, field, value
                );
                return Err(Error::permission_denied(format!(
                    "Not permitted to {ptype} {} with {field} {value}",
                    doc.doctype
                )));
            }
        }
        Ok(())
    }

    /// List documents the session may read.
    ///
    /// # Errors
    ///
    /// Returns an error if read is not permitted or the store fails.
    pub fn list(&self, doctype: DocType, mut query: ListQuery) -> Result<Vec<Document>> {
        self.check(doctype, Ptype::Read, None)?;
        query.filters.extend(self.scope(doctype)?);
        self.storage.list(doctype, &query)
    }

    /// Count documents the session may read.
    ///
    /// # Errors
    ///
    /// Returns an error if read is not permitted or the store fails.
    pub fn count(&self, doctype: DocType, filters: &[Filter]) -> Result<usize> {
        self.check(doctype, Ptype::Read, None)?;
        let mut filters = filters.to_vec();
        filters.extend(self.scope(doctype)?);
        self.storage.count(doctype, &filters)
    }

    /// Fetch one document the session may read.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing or not readable.
    pub fn get(&self, doctype: DocType, name: &str) -> Result<Document> {
        self.check(doctype, Ptype::Read, Some(name))?;
        self.storage.get_doc(doctype, name)
    }

    /// Insert a document and run its hooks, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if create is not permitted, a mapped field is outside
    /// the session's grants, naming fails, the name is taken or a hook fails.
    pub fn insert(&self, doc: Document) -> Result<Document> {
        self.check(doc.doctype, Ptype::Create, None)?;
        self.check_within_scope(&doc, Ptype::Create)?;
        let doctype = doc.doctype;
        let user = self.session.user.as_str();
        let saved = self.storage.transaction(|storage| {
            let saved = storage.insert(doc, user)?;
            self.site.hooks.after_save(storage, &saved, user)?;
            storage.get_doc(doctype, &saved.name)
        })?;
        info!("{} created {} {}", user, doctype, saved.name);
        Ok(saved)
    }

    /// Save changes to an existing document and run its hooks, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if write is not permitted, a mapped field is outside
    /// the session's grants, the document is gone or a hook fails.
    pub fn save(&self, doc: Document) -> Result<Document> {
        self.check(doc.doctype, Ptype::Write, Some(&doc.name))?;
        self.check_within_scope(&doc, Ptype::Write)?;
        let doctype = doc.doctype;
        let user = self.session.user.as_str();
        let saved = self.storage.transaction(|storage| {
            let saved = storage.update(doc, user)?;
            self.site.hooks.after_save(storage, &saved, user)?;
            storage.get_doc(doctype, &saved.name)
        })?;
        info!("{} updated {} {}", user, doctype, saved.name);
        Ok(saved)
    }

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns an error if delete is not permitted or the document is missing.
    pub fn delete(&self, doctype: DocType, name: &str) -> Result<()> {
        self.check(doctype, Ptype::Delete, Some(name))?;
        let deleted = self
            .storage
            .transaction(|storage| storage.delete(doctype, name))?;
        if !deleted {
            return Err(Error::not_found(doctype.as_str(), name));
        }
        info!("{} deleted {} {}", self.session.user, doctype, name);
        Ok(())
    }
}

impl Desk<'_> {
    /// Insert fixture documents, each an object with a `doctype` key, in one
    /// transaction. Hooks run as for any other insert.
    ///
    /// # Errors
    ///
    /// Returns an error, and imports nothing, if any entry is not an object,
    /// names no known entity type or fails to insert.
    pub fn import(&self, entries: Vec<Value>) -> Result<Vec<Document>> {
        self.storage.transaction(|_| {
            entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| {
                    let Value::Object(fields) = entry else {
                        return Err(Error::validation(format!("entry {index} is not an object")));
                    };
                    let doctype: DocType = fields
                        .get("doctype")
                        .and_then(Value::as_str)
                        .ok_or_else(|| Error::missing(format!("doctype of entry {index}")))?
                        .parse()?;
                    self.insert(Document::from_fields(doctype, fields)?)
                })
                .collect()
        })
    }
}

fn denied(doctype: DocType, ptype: Ptype, name: Option<&str>) -> Error {
    match name {
        Some(name) => Error::permission_denied(format!("Not permitted to {ptype} {doctype} {name}")),
        None => Error::permission_denied(format!("Not permitted to {ptype} {doctype}")),
    }
}
