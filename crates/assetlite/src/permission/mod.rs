//! User permission resolution.
//!
//! A [`PermissionMappings`] table says, per entity type, which document field
//! each permission category restricts. The [`PermissionResolver`] reads the
//! user's `User Permission` grants from the store and turns them into list
//! filters and access decisions.

pub mod access;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::doctype::DocType;
use crate::document::{cint, is_truthy, Document};
use crate::error::{Error, Result};
use crate::store::{validate_field_name, DocumentStore, Filter, ListQuery, OrderBy};

pub use access::{AccessPolicy, HomePage, Ptype, RoleGrant, Session};

/// The built-in administrator account.
pub const ADMINISTRATOR: &str = "Administrator";

/// Role that bypasses every restriction.
pub const SYSTEM_MANAGER: &str = "System Manager";

/// A restriction dimension a user can be granted values of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionCategory {
    /// Owning company.
    Company,
    /// Site.
    Location,
    /// Department.
    Department,
    /// Device manufacturer.
    Manufacturer,
    /// Supplier or vendor.
    Supplier,
    /// Imaging or device modality.
    Modality,
    /// Cost center.
    #[serde(rename = "Cost Center")]
    CostCenter,
    /// Asset type.
    #[serde(rename = "Asset Type")]
    AssetType,
    /// Asset category.
    #[serde(rename = "Asset Category")]
    AssetCategory,
    /// A single asset.
    Asset,
}

impl PermissionCategory {
    /// Name as stored in the `allow` field of a grant.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "Company",
            Self::Location => "Location",
            Self::Department => "Department",
            Self::Manufacturer => "Manufacturer",
            Self::Supplier => "Supplier",
            Self::Modality => "Modality",
            Self::CostCenter => "Cost Center",
            Self::AssetType => "Asset Type",
            Self::AssetCategory => "Asset Category",
            Self::Asset => "Asset",
        }
    }
}

impl fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(Value::from(s.trim()))
            .map_err(|_| Error::invalid_parameter("allow_doctype", format!("unknown permission category: {s}")))
    }
}

/// One row of the mapping table, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Entity type being restricted.
    pub doctype: DocType,
    /// Category granting access.
    pub category: PermissionCategory,
    /// Field on the entity holding the category value.
    pub field: String,
}

impl MappingEntry {
    fn new(doctype: DocType, category: PermissionCategory, field: &str) -> Self {
        Self {
            doctype,
            category,
            field: field.to_string(),
        }
    }
}

/// The shipped mapping table.
#[must_use]
pub fn default_mapping_entries() -> Vec<MappingEntry> {
    use PermissionCategory as C;
    vec![
        MappingEntry::new(DocType::Asset, C::Company, "company"),
        MappingEntry::new(DocType::Asset, C::Location, "location"),
        MappingEntry::new(DocType::Asset, C::Department, "department"),
        MappingEntry::new(DocType::Asset, C::Manufacturer, "custom_manufacturer"),
        MappingEntry::new(DocType::Asset, C::Supplier, "supplier"),
        MappingEntry::new(DocType::Asset, C::Modality, "custom_modality"),
        MappingEntry::new(DocType::Asset, C::CostCenter, "cost_center"),
        MappingEntry::new(DocType::Asset, C::AssetType, "custom_asset_type"),
        MappingEntry::new(DocType::Asset, C::AssetCategory, "asset_category"),
        MappingEntry::new(DocType::WorkOrder, C::Company, "company"),
        MappingEntry::new(DocType::WorkOrder, C::Location, "location"),
        MappingEntry::new(DocType::WorkOrder, C::Department, "department"),
        MappingEntry::new(DocType::AssetMaintenance, C::Company, "company"),
        MappingEntry::new(DocType::AssetMaintenance, C::Asset, "asset_name"),
        MappingEntry::new(DocType::AssetMaintenance, C::Supplier, "supplier"),
        MappingEntry::new(DocType::AssetMaintenanceLog, C::Company, "company"),
        MappingEntry::new(DocType::AssetMaintenanceLog, C::Asset, "asset_name"),
    ]
}

/// Entity type to `category -> field` lookup, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMappings {
    order: Vec<DocType>,
    by_doctype: BTreeMap<DocType, Vec<(PermissionCategory, String)>>,
}

impl PermissionMappings {
    /// Build the lookup from configuration rows.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid field name or a repeated
    /// `(doctype, category)` pair.
    pub fn from_entries(entries: &[MappingEntry]) -> Result<Self> {
        let mut mappings = Self::default();
        for entry in entries {
            validate_field_name(&entry.field).map_err(|_| Error::ConfigValidation {
                message: format!(
                    "invalid field '{}' in permission mapping for {}",
                    entry.field, entry.doctype
                ),
            })?;
            if !mappings.by_doctype.contains_key(&entry.doctype) {
                mappings.order.push(entry.doctype);
            }
            let fields = mappings.by_doctype.entry(entry.doctype).or_default();
            if fields.iter().any(|(category, _)| *category == entry.category) {
                return Err(Error::ConfigValidation {
                    message: format!(
                        "duplicate permission mapping for {} / {}",
                        entry.doctype, entry.category
                    ),
                });
            }
            fields.push((entry.category, entry.field.clone()));
        }
        Ok(mappings)
    }

    /// Category to field pairs for an entity type; empty when unconfigured.
    #[must_use]
    pub fn fields_for(&self, doctype: DocType) -> &[(PermissionCategory, String)] {
        self.by_doctype.get(&doctype).map_or(&[], Vec::as_slice)
    }

    /// Configured entity types in configuration order.
    #[must_use]
    pub fn doctypes(&self) -> &[DocType] {
        &self.order
    }
}

/// An `["in", [values]]` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFilter(pub Vec<String>);

impl Serialize for InFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ("in", &self.0).serialize(serializer)
    }
}

/// Per-category detail of the applied restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Restriction {
    /// Restricted field.
    pub field: String,
    /// Allowed values, sorted.
    pub values: Vec<String>,
    /// Number of allowed values.
    pub count: usize,
}

/// Result of resolving the filters for an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionFilters {
    /// Whether the user bypasses restrictions.
    pub is_admin: bool,
    /// Field to allowed values.
    pub filters: BTreeMap<String, InFilter>,
    /// Category to restriction detail.
    pub restrictions: BTreeMap<String, Restriction>,
    /// Entity type asked about.
    pub target_doctype: String,
    /// User asked about.
    pub user: String,
    /// Set when the entity type has no mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Number of restricted categories, for non-admin results with a mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_restrictions: Option<usize>,
}

impl PermissionFilters {
    /// Store filters equivalent to [`Self::filters`].
    #[must_use]
    pub fn to_filters(&self) -> Vec<Filter> {
        self.filters
            .iter()
            .map(|(field, values)| Filter::is_in(field, values.0.iter().map(String::as_str)))
            .collect()
    }
}

/// One grant as reported by [`PermissionResolver::user_permissions`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrantView {
    /// Granted value.
    pub for_value: Value,
    /// Whether the value is the user's default for the category.
    pub is_default: i64,
    /// Whether the grant applies to every entity type.
    pub apply_to_all_doctypes: i64,
    /// Entity type the grant is limited to, if any.
    pub applicable_for: Value,
}

/// A user's grants grouped by category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPermissions {
    /// Whether the user bypasses restrictions.
    pub is_admin: bool,
    /// Category to grants.
    pub permissions: BTreeMap<String, Vec<GrantView>>,
    /// User asked about.
    pub user: String,
    /// Number of grants.
    pub total_permissions: usize,
    /// Categories with at least one grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_types: Option<Vec<String>>,
}

/// Values of one category a user may see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllowedValues {
    /// Whether the user bypasses restrictions.
    pub is_admin: bool,
    /// Distinct granted values, sorted.
    pub allowed_values: Vec<String>,
    /// Value of the first default grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Whether any value was granted.
    pub has_restriction: bool,
    /// Category asked about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_doctype: Option<String>,
}

/// Outcome of a single-document access check.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentAccess {
    /// The decision.
    pub has_access: bool,
    /// Set for administrators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    /// Set when the document does not exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the user has no restrictions on the entity type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_restrictions: Option<bool>,
    /// Category that denied access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_by: Option<String>,
    /// Field that denied access.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The document's value of that field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_value: Option<Value>,
    /// Values the user may see for that field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

/// The mapping table as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfiguredDoctypes {
    /// Configured entity types.
    pub doctypes: Vec<String>,
    /// Entity type to its categories.
    pub mappings: BTreeMap<String, Vec<String>>,
}

/// A user's default value per category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDefaults {
    /// Whether the user bypasses restrictions.
    pub is_admin: bool,
    /// Category to default value.
    pub defaults: BTreeMap<String, Value>,
}

/// Roles of a user as recorded on their `User` document.
///
/// `roles` may hold plain role names or `{"role": ...}` rows.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn stored_roles(store: &dyn DocumentStore, user: &str) -> Result<Vec<String>> {
    let Some(doc) = store.get(DocType::User, user)? else {
        return Ok(Vec::new());
    };
    let roles = match doc.fields.get("roles") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(role) => Some(role.clone()),
                Value::Object(row) => row.get("role").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(roles)
}

/// Whether a user is `Administrator` or holds `System Manager`.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn is_system_user(store: &dyn DocumentStore, user: &str) -> Result<bool> {
    if user == ADMINISTRATOR {
        return Ok(true);
    }
    Ok(stored_roles(store, user)?.iter().any(|role| role == SYSTEM_MANAGER))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads grants from a store and applies the mapping table.
pub struct PermissionResolver<'a> {
    store: &'a dyn DocumentStore,
    mappings: &'a PermissionMappings,
}

impl fmt::Debug for PermissionResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("mappings", self.mappings)
            .finish_non_exhaustive()
    }
}

impl<'a> PermissionResolver<'a> {
    /// Resolver over a store and mapping table.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore, mappings: &'a PermissionMappings) -> Self {
        Self { store, mappings }
    }

    fn grants(&self, user: &str, category: Option<&str>) -> Result<Vec<Document>> {
        let mut query = ListQuery::new()
            .filter(Filter::eq("user", user))
            .order_by(OrderBy::asc("allow"));
        if let Some(category) = category {
            query = query.filter(Filter::eq("allow", category));
        }
        self.store.list(DocType::UserPermission, &query)
    }

    /// Filters restricting what `user` may list of `target`.
    ///
    /// `target` is an entity type name; names without a mapping yield an
    /// unrestricted result with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn permission_filters(&self, target: &str, user: &str) -> Result<PermissionFilters> {
        let mut result = PermissionFilters {
            is_admin: false,
            filters: BTreeMap::new(),
            restrictions: BTreeMap::new(),
            target_doctype: target.to_string(),
            user: user.to_string(),
            warning: None,
            total_restrictions: None,
        };

        if is_system_user(self.store, user)? {
            result.is_admin = true;
            return Ok(result);
        }

        let doctype = target.parse::<DocType>().ok();
        let fields = doctype.map_or(&[][..], |dt| self.mappings.fields_for(dt));
        if fields.is_empty() {
            result.warning = Some(format!("No permission mapping defined for {target}"));
            return Ok(result);
        }
        let canonical = doctype.map(|dt| dt.as_str()).unwrap_or(target);

        for (category, field) in fields {
            let values: BTreeSet<String> = self
                .grants(user, Some(category.as_str()))?
                .iter()
                .filter(|grant| {
                    cint(&grant.value("apply_to_all_doctypes")) == 1
                        || !is_truthy(&grant.value("applicable_for"))
                        || grant.get_str("applicable_for") == Some(canonical)
                        || grant.get_str("applicable_for") == Some(target)
                })
                .map(|grant| value_text(&grant.value("for_value")))
                .filter(|value| !value.is_empty())
                .collect();
            if values.is_empty() {
                continue;
            }
            let values: Vec<String> = values.into_iter().collect();
            result.filters.insert(field.clone(), InFilter(values.clone()));
            result.restrictions.insert(
                category.to_string(),
                Restriction {
                    field: field.clone(),
                    count: values.len(),
                    values,
                },
            );
        }

        result.total_restrictions = Some(result.restrictions.len());
        debug!(
            "Resolved {} restrictions on {} for {}",
            result.restrictions.len(),
            target,
            user
        );
        Ok(result)
    }

    /// All grants of a user, grouped by category.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn user_permissions(&self, user: &str) -> Result<UserPermissions> {
        if is_system_user(self.store, user)? {
            return Ok(UserPermissions {
                is_admin: true,
                permissions: BTreeMap::new(),
                user: user.to_string(),
                total_permissions: 0,
                permission_types: None,
            });
        }

        let grants = self.grants(user, None)?;
        let mut permissions: BTreeMap<String, Vec<GrantView>> = BTreeMap::new();
        for grant in &grants {
            let allow = value_text(&grant.value("allow"));
            permissions.entry(allow).or_default().push(GrantView {
                for_value: grant.value("for_value"),
                is_default: cint(&grant.value("is_default")),
                apply_to_all_doctypes: cint(&grant.value("apply_to_all_doctypes")),
                applicable_for: grant.value("applicable_for"),
            });
        }
        let permission_types = permissions.keys().cloned().collect();

        Ok(UserPermissions {
            is_admin: false,
            permissions,
            user: user.to_string(),
            total_permissions: grants.len(),
            permission_types: Some(permission_types),
        })
    }

    /// Values of one category granted to a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn allowed_values(&self, category: &str, user: &str) -> Result<AllowedValues> {
        if is_system_user(self.store, user)? {
            return Ok(AllowedValues {
                is_admin: true,
                allowed_values: Vec::new(),
                default_value: None,
                has_restriction: false,
                allow_doctype: None,
            });
        }

        let grants = self.grants(user, Some(category))?;
        let allowed_values: Vec<String> = grants
            .iter()
            .map(|grant| value_text(&grant.value("for_value")))
            .filter(|value| !value.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let default_value = grants
            .iter()
            .find(|grant| cint(&grant.value("is_default")) == 1)
            .map(|grant| value_text(&grant.value("for_value")));

        Ok(AllowedValues {
            is_admin: false,
            has_restriction: !allowed_values.is_empty(),
            allowed_values,
            default_value,
            allow_doctype: Some(category.to_string()),
        })
    }

    /// Whether a user may see one document.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn check_document_access(
        &self,
        doctype: DocType,
        name: &str,
        user: &str,
    ) -> Result<DocumentAccess> {
        if is_system_user(self.store, user)? {
            return Ok(DocumentAccess {
                has_access: true,
                is_admin: Some(true),
                ..DocumentAccess::default()
            });
        }

        let Some(doc) = self.store.get(doctype, name)? else {
            return Ok(DocumentAccess {
                has_access: false,
                error: Some(format!("{doctype} '{name}' not found")),
                ..DocumentAccess::default()
            });
        };

        let resolved = self.permission_filters(doctype.as_str(), user)?;
        if resolved.restrictions.is_empty() {
            return Ok(DocumentAccess {
                has_access: true,
                no_restrictions: Some(true),
                ..DocumentAccess::default()
            });
        }

        for (category, restriction) in &resolved.restrictions {
            let value = doc.value(&restriction.field);
            if is_truthy(&value) && !restriction.values.contains(&value_text(&value)) {
                return Ok(DocumentAccess {
                    has_access: false,
                    denied_by: Some(category.clone()),
                    field: Some(restriction.field.clone()),
                    document_value: Some(value),
                    allowed_values: Some(restriction.values.clone()),
                    ..DocumentAccess::default()
                });
            }
        }

        Ok(DocumentAccess {
            has_access: true,
            ..DocumentAccess::default()
        })
    }

    /// The mapping table in client form.
    #[must_use]
    pub fn configured_doctypes(&self) -> ConfiguredDoctypes {
        let doctypes = self
            .mappings
            .doctypes()
            .iter()
            .map(|dt| dt.as_str().to_string())
            .collect();
        let mappings = self
            .mappings
            .doctypes()
            .iter()
            .map(|dt| {
                let categories = self
                    .mappings
                    .fields_for(*dt)
                    .iter()
                    .map(|(category, _)| category.to_string())
                    .collect();
                (dt.as_str().to_string(), categories)
            })
            .collect();
        ConfiguredDoctypes { doctypes, mappings }
    }

    /// Default value per category for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn user_defaults(&self, user: &str) -> Result<UserDefaults> {
        if is_system_user(self.store, user)? {
            return Ok(UserDefaults {
                is_admin: true,
                defaults: BTreeMap::new(),
            });
        }
        let defaults = self
            .grants(user, None)?
            .iter()
            .filter(|grant| cint(&grant.value("is_default")) == 1)
            .map(|grant| (value_text(&grant.value("allow")), grant.value("for_value")))
            .collect();
        Ok(UserDefaults {
            is_admin: false,
            defaults,
        })
    }
}
