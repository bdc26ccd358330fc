//! Corrective maintenance work orders.

use crate::doctype::DocType;
use crate::error::Result;
use crate::service::Desk;

use super::{Entity, Params, Reply};

const WORK_ORDER: Entity = Entity {
    doctype: DocType::WorkOrder,
    label: "Work Order",
    singular: "work_order",
    plural: "work_orders",
    name_param: "work_order_name",
    data_param: "work_order_data",
    default_fields: &[
        "name",
        "company",
        "naming_series",
        "work_order_type",
        "asset_type",
        "manufacturer",
        "serial_number",
        "custom_priority_",
        "asset",
        "custom_maintenance_manager",
        "department",
        "repair_status",
        "asset_name",
        "supplier",
        "custom_pending_reason",
        "model",
        "custom_site_contractor",
        "custom_subcontractor",
        "custom_service_agreement",
        "custom_service_coverage",
        "custom_start_date",
        "custom_end_date",
        "custom_total_amount",
        "warranty",
        "service_contract",
        "covering_spare_parts",
        "spare_parts_labour",
        "covering_labour",
        "ppm_only",
        "failure_date",
        "total_hours_spent",
        "job_completed",
        "custom_difference",
        "custom_vendors_hrs",
        "custom_deadline_date",
        "custom_diffrence",
        "feedback_rating",
        "first_responded_on",
        "penalty",
        "custom_assigned_supervisor",
        "stock_consumption",
        "need_procurement",
        "repair_cost",
        "total_repair_cost",
        "capitalize_repair_cost",
        "increase_in_asset_life",
        "description",
        "actions_performed",
        "bio_med_dept",
        "workflow_state",
        "creation",
        "modified",
        "owner",
        "modified_by",
        "docstatus",
        "idx",
    ],
};

pub(super) fn get_work_orders(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    WORK_ORDER.list(desk, params)
}

pub(super) fn get_work_order_details(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    WORK_ORDER.details(desk, params)
}

pub(super) fn create_work_order(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    WORK_ORDER.create(desk, params)
}

pub(super) fn update_work_order(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    WORK_ORDER.update(desk, params)
}

pub(super) fn delete_work_order(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    WORK_ORDER.delete(desk, params)
}

pub(super) fn update_work_order_status(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    WORK_ORDER.set_status(desk, params, &["repair_status", "workflow_state"])
}
