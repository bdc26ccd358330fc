//! Maintenance visit logs.

use chrono::Local;

use crate::doctype::DocType;
use crate::error::Result;
use crate::service::Desk;
use crate::store::{Filter, Operator, OrderBy};

use super::{Entity, Page, Params, Reply};

const LOG: Entity = Entity {
    doctype: DocType::AssetMaintenanceLog,
    label: "Asset Maintenance Log",
    singular: "asset_maintenance_log",
    plural: "asset_maintenance_logs",
    name_param: "log_name",
    data_param: "log_data",
    default_fields: &[
        "name",
        "asset_maintenance",
        "naming_series",
        "asset_name",
        "custom_asset_type",
        "item_code",
        "item_name",
        "custom_asset_names",
        "custom_hospital_name",
        "task",
        "task_name",
        "maintenance_type",
        "periodicity",
        "has_certificate",
        "custom_early_completion",
        "maintenance_status",
        "custom_pm_overdue_reason",
        "custom_accepted_by_moh",
        "assign_to_name",
        "due_date",
        "custom_accepted_by_moh_",
        "custom_template",
        "workflow_state",
        "creation",
        "modified",
        "owner",
        "modified_by",
        "docstatus",
        "idx",
    ],
};

pub(super) fn get_asset_maintenance_logs(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    LOG.list(desk, params)
}

pub(super) fn get_asset_maintenance_log_details(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    LOG.details(desk, params)
}

pub(super) fn create_asset_maintenance_log(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    LOG.create(desk, params)
}

pub(super) fn update_asset_maintenance_log(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    LOG.update(desk, params)
}

pub(super) fn delete_asset_maintenance_log(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    LOG.delete(desk, params)
}

pub(super) fn update_maintenance_status(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    LOG.set_status(desk, params, &["maintenance_status", "workflow_state"])
}

pub(super) fn get_maintenance_logs_by_asset(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let asset = params.require("asset_name", "Asset name")?;
    let page = Page::from_params(
        desk,
        params,
        DocType::AssetMaintenanceLog,
        vec![Filter::eq("asset_name", asset)],
        OrderBy::desc("due_date"),
    )?;
    Ok(Reply::data(page.render(LOG.plural, |doc| doc.to_json())))
}

pub(super) fn get_overdue_maintenance_logs(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let today = Local::now().format("%Y-%m-%d").to_string();
    let overdue = vec![
        Filter::new("due_date", Operator::Lt, today)?,
        Filter::new("maintenance_status", Operator::NotEq, "Completed")?,
    ];
    let page = Page::from_params(
        desk,
        params,
        DocType::AssetMaintenanceLog,
        overdue,
        OrderBy::asc("due_date"),
    )?;
    Ok(Reply::data(page.render(LOG.plural, |doc| doc.to_json())))
}
