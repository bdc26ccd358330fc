//! Role-based access policy and request sessions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::doctype::DocType;
use crate::error::Result;
use crate::store::DocumentStore;

use super::{stored_roles, ADMINISTRATOR, SYSTEM_MANAGER};

/// The anonymous user and its implicit role.
pub const GUEST: &str = "Guest";

/// Implicit role of every signed-in user.
pub const ALL_ROLE: &str = "All";

/// Kind of access requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ptype {
    /// List and fetch.
    Read,
    /// Modify an existing document.
    Write,
    /// Insert a new document.
    Create,
    /// Remove a document.
    Delete,
}

impl Ptype {
    /// Every access kind.
    pub const ALL: [Ptype; 4] = [Self::Read, Self::Write, Self::Create, Self::Delete];

    /// Lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Ptype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access kinds a role holds on an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Role name.
    pub role: String,
    /// Entity type.
    pub doctype: DocType,
    /// Granted access kinds.
    pub ptypes: Vec<Ptype>,
}

impl RoleGrant {
    fn new(role: &str, doctype: DocType, ptypes: &[Ptype]) -> Self {
        Self {
            role: role.to_string(),
            doctype,
            ptypes: ptypes.to_vec(),
        }
    }
}

/// Workspace route a role lands on after sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomePage {
    /// Role name.
    pub role: String,
    /// Route, e.g. `/app/asset-management`.
    pub route: String,
}

/// The shipped role grants.
#[must_use]
pub fn default_role_grants() -> Vec<RoleGrant> {
    use Ptype::{Create, Read, Write};

    let managed = [
        DocType::Asset,
        DocType::WorkOrder,
        DocType::AssetMaintenance,
        DocType::AssetMaintenanceLog,
        DocType::MaterialRequest,
    ];
    let mut grants: Vec<RoleGrant> = managed
        .iter()
        .map(|dt| RoleGrant::new("Maintenance Manager", *dt, &Ptype::ALL))
        .collect();

    for dt in managed {
        let ptypes: &[Ptype] = match dt {
            DocType::WorkOrder | DocType::AssetMaintenanceLog => &[Read, Write, Create],
            _ => &[Read],
        };
        grants.push(RoleGrant::new("Maintenance User", dt, ptypes));
    }

    for dt in [
        DocType::Location,
        DocType::Company,
        DocType::Department,
        DocType::FinanceBook,
        DocType::Translation,
        DocType::SupplierScorecard,
    ] {
        grants.push(RoleGrant::new(ALL_ROLE, dt, &[Read]));
    }
    grants.push(RoleGrant::new(GUEST, DocType::Translation, &[Read]));
    grants
}

/// The shipped home pages.
#[must_use]
pub fn default_home_pages() -> Vec<HomePage> {
    vec![HomePage {
        role: "Maintenance Manager".to_string(),
        route: "/app/asset-management".to_string(),
    }]
}

/// Which roles may do what to which entity types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    grants: Vec<RoleGrant>,
}

impl AccessPolicy {
    /// Policy from configured grants.
    #[must_use]
    pub fn new(grants: Vec<RoleGrant>) -> Self {
        Self { grants }
    }

    /// Whether any of `roles` holds `ptype` on `doctype`.
    #[must_use]
    pub fn allows(&self, roles: &[String], doctype: DocType, ptype: Ptype) -> bool {
        self.grants.iter().any(|grant| {
            grant.doctype == doctype
                && grant.ptypes.contains(&ptype)
                && roles.iter().any(|role| *role == grant.role)
        })
    }
}

/// The user a request acts as, with their effective roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// User name, usually an email.
    pub user: String,
    /// Stored roles plus the implicit ones.
    pub roles: Vec<String>,
}

impl Session {
    /// Build a session, reading roles from the user's document.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn load(store: &dyn DocumentStore, user: &str) -> Result<Self> {
        let user = if user.trim().is_empty() { GUEST } else { user.trim() };
        let mut roles = if user == GUEST {
            Vec::new()
        } else {
            stored_roles(store, user)?
        };
        let implicit = if user == GUEST { GUEST } else { ALL_ROLE };
        if !roles.iter().any(|role| role == implicit) {
            roles.push(implicit.to_string());
        }
        Ok(Self {
            user: user.to_string(),
            roles,
        })
    }

    /// Whether the session bypasses every check.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user == ADMINISTRATOR || self.roles.iter().any(|role| role == SYSTEM_MANAGER)
    }

    /// Whether the session is anonymous.
    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.user == GUEST
    }

    /// First configured home page for one of the session's roles.
    #[must_use]
    pub fn home_page(&self, pages: &[HomePage]) -> Option<String> {
        pages
            .iter()
            .find(|page| self.roles.contains(&page.role))
            .map(|page| page.route.clone())
    }
}
