//! Entity types known to the document store.
//!
//! A [`DocType`] names a record schema. Parent types may own child tables,
//! whose rows live in their own table and are returned inline on the parent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A named record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocType {
    /// A physical asset.
    #[serde(rename = "Asset")]
    Asset,
    /// A corrective maintenance work order.
    #[serde(rename = "Work_Order", alias = "Work Order")]
    WorkOrder,
    /// A preventive maintenance (PPM) schedule for one asset.
    #[serde(rename = "Asset Maintenance")]
    AssetMaintenance,
    /// One performed or planned maintenance visit.
    #[serde(rename = "Asset Maintenance Log")]
    AssetMaintenanceLog,
    /// Spare parts request raised against a work order.
    #[serde(rename = "Material Request")]
    MaterialRequest,
    /// A grant restricting a user to one value of a permission category.
    #[serde(rename = "User Permission")]
    UserPermission,
    /// A user account and its roles.
    #[serde(rename = "User")]
    User,
    /// An attachment.
    #[serde(rename = "File")]
    File,
    /// A site, usually a hospital.
    #[serde(rename = "Location")]
    Location,
    /// An owning company.
    #[serde(rename = "Company")]
    Company,
    /// A department.
    #[serde(rename = "Department")]
    Department,
    /// A depreciation book.
    #[serde(rename = "Finance Book")]
    FinanceBook,
    /// Periodic supplier evaluation.
    #[serde(rename = "Supplier Scorecard")]
    SupplierScorecard,
    /// A UI string translation.
    #[serde(rename = "Translation")]
    Translation,
    /// Child of Asset: depreciation settings per finance book.
    #[serde(rename = "Asset Finance Book")]
    AssetFinanceBook,
    /// Child of Asset: one planned depreciation posting.
    #[serde(rename = "Depreciation Schedule")]
    DepreciationSchedule,
    /// Child of Asset Maintenance: a recurring task.
    #[serde(rename = "Asset Maintenance Task")]
    AssetMaintenanceTask,
    /// Child of Asset Maintenance: contract coverage line.
    #[serde(rename = "Service Coverage")]
    ServiceCoverage,
    /// Child of Material Request: one requested item.
    #[serde(rename = "Material Request Item")]
    MaterialRequestItem,
}

/// A child table owned by a parent entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildTable {
    /// Field on the parent holding the rows.
    pub fieldname: &'static str,
    /// Entity type of the rows.
    pub doctype: DocType,
}

/// How a new document gets its name when the payload carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingRule {
    /// `<prefix><year>-<5 digit counter>`.
    Series(&'static str),
    /// Copy the value of a field.
    Field(&'static str),
    /// Ten hex characters.
    Hash,
}

const ASSET_CHILDREN: &[ChildTable] = &[
    ChildTable {
        fieldname: "finance_books",
        doctype: DocType::AssetFinanceBook,
    },
    ChildTable {
        fieldname: "schedules",
        doctype: DocType::DepreciationSchedule,
    },
];

const ASSET_MAINTENANCE_CHILDREN: &[ChildTable] = &[
    ChildTable {
        fieldname: "asset_maintenance_tasks",
        doctype: DocType::AssetMaintenanceTask,
    },
    ChildTable {
        fieldname: "custom_service_coverage_table",
        doctype: DocType::ServiceCoverage,
    },
];

const MATERIAL_REQUEST_CHILDREN: &[ChildTable] = &[ChildTable {
    fieldname: "items",
    doctype: DocType::MaterialRequestItem,
}];

impl DocType {
    /// Every entity type, parents first.
    pub const ALL: &'static [DocType] = &[
        Self::Asset,
        Self::WorkOrder,
        Self::AssetMaintenance,
        Self::AssetMaintenanceLog,
        Self::MaterialRequest,
        Self::UserPermission,
        Self::User,
        Self::File,
        Self::Location,
        Self::Company,
        Self::Department,
        Self::FinanceBook,
        Self::SupplierScorecard,
        Self::Translation,
        Self::AssetFinanceBook,
        Self::DepreciationSchedule,
        Self::AssetMaintenanceTask,
        Self::ServiceCoverage,
        Self::MaterialRequestItem,
    ];

    /// Canonical display name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "Asset",
            Self::WorkOrder => "Work_Order",
            Self::AssetMaintenance => "Asset Maintenance",
            Self::AssetMaintenanceLog => "Asset Maintenance Log",
            Self::MaterialRequest => "Material Request",
            Self::UserPermission => "User Permission",
            Self::User => "User",
            Self::File => "File",
            Self::Location => "Location",
            Self::Company => "Company",
            Self::Department => "Department",
            Self::FinanceBook => "Finance Book",
            Self::SupplierScorecard => "Supplier Scorecard",
            Self::Translation => "Translation",
            Self::AssetFinanceBook => "Asset Finance Book",
            Self::DepreciationSchedule => "Depreciation Schedule",
            Self::AssetMaintenanceTask => "Asset Maintenance Task",
            Self::ServiceCoverage => "Service Coverage",
            Self::MaterialRequestItem => "Material Request Item",
        }
    }

    /// Whether rows of this type only exist inside a parent document.
    #[must_use]
    pub fn is_child(&self) -> bool {
        matches!(
            self,
            Self::AssetFinanceBook
                | Self::DepreciationSchedule
                | Self::AssetMaintenanceTask
                | Self::ServiceCoverage
                | Self::MaterialRequestItem
        )
    }

    /// Child tables owned by this type.
    #[must_use]
    pub fn child_tables(&self) -> &'static [ChildTable] {
        match self {
            Self::Asset => ASSET_CHILDREN,
            Self::AssetMaintenance => ASSET_MAINTENANCE_CHILDREN,
            Self::MaterialRequest => MATERIAL_REQUEST_CHILDREN,
            _ => &[],
        }
    }

    /// Look up a child table by its parent field.
    #[must_use]
    pub fn child_table(&self, fieldname: &str) -> Option<ChildTable> {
        self.child_tables()
            .iter()
            .copied()
            .find(|table| table.fieldname == fieldname)
    }

    /// Naming rule for new documents.
    #[must_use]
    pub fn naming_rule(&self) -> NamingRule {
        match self {
            Self::Asset => NamingRule::Series("ACC-ASS-"),
            Self::WorkOrder => NamingRule::Series("WO-"),
            Self::AssetMaintenanceLog => NamingRule::Series("ACC-AML-"),
            Self::MaterialRequest => NamingRule::Series("MAT-MR-"),
            Self::AssetMaintenance => NamingRule::Field("asset_name"),
            Self::User => NamingRule::Field("email"),
            Self::Location => NamingRule::Field("location_name"),
            Self::Company => NamingRule::Field("company_name"),
            Self::Department => NamingRule::Field("department_name"),
            Self::FinanceBook => NamingRule::Field("finance_book_name"),
            Self::SupplierScorecard => NamingRule::Field("supplier"),
            _ => NamingRule::Hash,
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "Work Order" {
            return Ok(Self::WorkOrder);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|doctype| doctype.as_str() == trimmed)
            .ok_or_else(|| Error::UnknownDocType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for doctype in DocType::ALL {
            let parsed: DocType = doctype.as_str().parse().unwrap();
            assert_eq!(parsed, *doctype);
        }
    }

    #[test]
    fn test_work_order_alias() {
        assert_eq!("Work Order".parse::<DocType>().unwrap(), DocType::WorkOrder);
        assert_eq!(DocType::WorkOrder.to_string(), "Work_Order");
    }

    #[test]
    fn test_unknown_doctype() {
        let err = "Project".parse::<DocType>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown DocType: Project");
    }

    #[test]
    fn test_child_tables() {
        let asset = DocType::Asset;
        assert_eq!(asset.child_tables().len(), 2);
        assert_eq!(
            asset.child_table("finance_books").unwrap().doctype,
            DocType::AssetFinanceBook
        );
        assert!(asset.child_table("items").is_none());
        assert!(DocType::WorkOrder.child_tables().is_empty());
    }

    #[test]
    fn test_every_child_table_points_at_a_child_type() {
        for doctype in DocType::ALL {
            for table in doctype.child_tables() {
                assert!(table.doctype.is_child(), "{}", table.fieldname);
            }
        }
    }

    #[test]
    fn test_naming_rules() {
        assert_eq!(DocType::Asset.naming_rule(), NamingRule::Series("ACC-ASS-"));
        assert_eq!(
            DocType::AssetMaintenance.naming_rule(),
            NamingRule::Field("asset_name")
        );
        assert_eq!(DocType::UserPermission.naming_rule(), NamingRule::Hash);
    }

    #[test]
    fn test_serde_uses_display_names() {
        let json = serde_json::to_string(&DocType::AssetMaintenanceLog).unwrap();
        assert_eq!(json, "\"Asset Maintenance Log\"");
        let parsed: DocType = serde_json::from_str("\"Work Order\"").unwrap();
        assert_eq!(parsed, DocType::WorkOrder);
    }
}
