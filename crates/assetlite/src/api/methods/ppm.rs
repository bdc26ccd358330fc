//! Preventive maintenance schedules, their tasks and service coverage.

use serde_json::{json, Value};

use crate::doctype::DocType;
use crate::error::{Error, Result};
use crate::service::Desk;
use crate::store::{DocumentStore, Filter, OrderBy};

use super::{modify, Entity, Page, Params, Reply};

const TASKS: &str = "asset_maintenance_tasks";
const COVERAGE: &str = "custom_service_coverage_table";

const SCHEDULE: Entity = Entity {
    doctype: DocType::AssetMaintenance,
    label: "Asset Maintenance",
    singular: "asset_maintenance",
    plural: "asset_maintenances",
    name_param: "maintenance_name",
    data_param: "maintenance_data",
    default_fields: &[
        "name",
        "company",
        "asset_name",
        "custom_asset_type",
        "asset_category",
        "custom_type_of_maintenance",
        "custom_asset_name",
        "item_code",
        "item_name",
        "maintenance_team",
        "custom_pm_schedule",
        "maintenance_manager",
        "maintenance_manager_name",
        "custom_warranty",
        "custom_warranty_status",
        "custom_service_contract",
        "custom_service_contract_status",
        "custom_frequency",
        "custom_total_amount",
        "custom_no_of_pms",
        "custom_price_per_pm",
        "creation",
        "modified",
        "owner",
        "modified_by",
        "docstatus",
        "idx",
    ],
};

fn maintenance_name(params: &Params) -> Result<String> {
    params.require("maintenance_name", "Asset Maintenance name")
}

pub(super) fn get_asset_maintenances(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    SCHEDULE.list(desk, params)
}

pub(super) fn get_asset_maintenance_details(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    SCHEDULE.details(desk, params)
}

pub(super) fn create_asset_maintenance(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    SCHEDULE.create(desk, params)
}

pub(super) fn update_asset_maintenance(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    SCHEDULE.update(desk, params)
}

pub(super) fn delete_asset_maintenance(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    SCHEDULE.delete(desk, params)
}

/// Rows of one child table of a readable schedule, in table order.
fn child_rows(desk: &Desk<'_>, params: &Params, table: &str, key: &str) -> Result<Reply> {
    let name = maintenance_name(params)?;
    let schedule = desk.get(DocType::AssetMaintenance, &name)?;
    let rows: Vec<Value> = schedule
        .rows(table)
        .iter()
        .map(|row| row.to_json(&schedule, table))
        .collect();
    let total_count = rows.len();
    Ok(Reply::data(json!({ key: rows, "total_count": total_count })))
}

pub(super) fn get_maintenance_tasks(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    child_rows(desk, params, TASKS, "maintenance_tasks")
}

pub(super) fn get_service_coverage(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    child_rows(desk, params, COVERAGE, "service_coverage")
}

pub(super) fn add_maintenance_task(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let name = maintenance_name(params)?;
    let task = params.object("task_data")?;
    let schedule = modify(desk, DocType::AssetMaintenance, &name, |schedule| {
        schedule.append(TASKS, task).map(|_| ())
    })?;
    Ok(Reply::with_message(
        json!({ "asset_maintenance": schedule.to_json() }),
        "Maintenance task added successfully",
    ))
}

/// Update one task row in place. Write access is checked on its schedule.
pub(super) fn update_maintenance_task(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let task_name = params.require("task_name", "Maintenance task name")?;
    let updates = params.object("task_data")?;
    let located = desk
        .storage()
        .find_child(DocType::AssetMaintenanceTask, &task_name)?
        .ok_or_else(|| Error::not_found(DocType::AssetMaintenanceTask.as_str(), &task_name))?;

    let schedule = modify(desk, DocType::AssetMaintenance, &located.parent, |schedule| {
        let row = schedule
            .rows_mut(&located.parentfield)?
            .iter_mut()
            .find(|row| row.name == task_name)
            .ok_or_else(|| Error::not_found(DocType::AssetMaintenanceTask.as_str(), &task_name))?;
        row.apply(updates);
        Ok(())
    })?;

    let task = schedule
        .rows(&located.parentfield)
        .iter()
        .find(|row| row.name == task_name)
        .map(|row| row.to_json(&schedule, &located.parentfield))
        .unwrap_or(Value::Null);
    Ok(Reply::with_message(
        json!({ "maintenance_task": task }),
        "Maintenance task updated successfully",
    ))
}

pub(super) fn get_maintenances_by_asset(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let asset = params.require("asset_name", "Asset name")?;
    let page = Page::from_params(
        desk,
        params,
        DocType::AssetMaintenance,
        vec![Filter::eq("asset_name", asset)],
        OrderBy::default(),
    )?;
    Ok(Reply::data(page.render(SCHEDULE.plural, |doc| doc.to_json())))
}

pub(super) fn get_active_service_contracts(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let page = Page::from_params(
        desk,
        params,
        DocType::AssetMaintenance,
        vec![Filter::eq("custom_service_contract", 1)],
        OrderBy::default(),
    )?;
    Ok(Reply::data(page.render(SCHEDULE.plural, |doc| doc.to_json())))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{call, insert, site, user};
    use super::*;
    use crate::permission::ADMINISTRATOR;
    use crate::storage::Storage;

    fn schedule(storage: &Storage) -> String {
        insert(
            storage,
            DocType::AssetMaintenance,
            json!({
                "asset_name": "ACC-ASS-2025-00001",
                "company": "Corp1",
                "custom_service_contract": 1,
                "asset_maintenance_tasks": [
                    {"maintenance_task": "Calibrate", "periodicity": "Monthly"},
                    {"maintenance_task": "Inspect", "periodicity": "Quarterly"}
                ],
                "custom_service_coverage_table": [{"coverage": "Spare parts"}]
            }),
        )
        .name
    }

    #[test]
    fn test_tasks_and_coverage() {
        let storage = Storage::open_in_memory().unwrap();
        let name = schedule(&storage);
        assert_eq!(name, "ACC-ASS-2025-00001");
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let data = call(&desk, "get_maintenance_tasks", json!({"maintenance_name": name}))
            .unwrap()
            .data;
        assert_eq!(data["total_count"], json!(2));
        assert_eq!(data["maintenance_tasks"][0]["maintenance_task"], json!("Calibrate"));
        assert_eq!(data["maintenance_tasks"][1]["idx"], json!(2));

        let data = call(&desk, "get_service_coverage", json!({"maintenance_name": name}))
            .unwrap()
            .data;
        assert_eq!(data["total_count"], json!(1));

        let err = call(&desk, "get_maintenance_tasks", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Asset Maintenance name is required");
    }

    #[test]
    fn test_add_and_update_task() {
        let storage = Storage::open_in_memory().unwrap();
        let name = schedule(&storage);
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let reply = call(
            &desk,
            "add_maintenance_task",
            json!({"maintenance_name": name, "task_data": "{\"maintenance_task\": \"Clean\"}"}),
        )
        .unwrap();
        assert_eq!(reply.message.as_deref(), Some("Maintenance task added successfully"));
        let tasks = reply.data["asset_maintenance"][TASKS].as_array().unwrap().clone();
        assert_eq!(tasks.len(), 3);
        let task_name = tasks[2]["name"].as_str().unwrap().to_string();

        let reply = call(
            &desk,
            "update_maintenance_task",
            json!({"task_name": task_name, "task_data": {"periodicity": "Yearly"}}),
        )
        .unwrap();
        let task = &reply.data["maintenance_task"];
        assert_eq!(task["periodicity"], json!("Yearly"));
        assert_eq!(task["maintenance_task"], json!("Clean"));
        assert_eq!(task["parent"], json!(name));

        let err = call(
            &desk,
            "update_maintenance_task",
            json!({"task_name": "nope", "task_data": {}}),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_task_update_needs_write_on_schedule() {
        let storage = Storage::open_in_memory().unwrap();
        schedule(&storage);
        user(&storage, "tech@example.com", &["Maintenance User"]);
        let located = storage
            .get_doc(DocType::AssetMaintenance, "ACC-ASS-2025-00001")
            .unwrap();
        let task_name = located.rows(TASKS)[0].name.clone();
        let site = site();
        let desk = Desk::open(&storage, &site, "tech@example.com").unwrap();

        let err = call(
            &desk,
            "update_maintenance_task",
            json!({"task_name": task_name, "task_data": {"periodicity": "Weekly"}}),
        )
        .unwrap_err();
        assert!(err.is_permission_error());
    }

    #[test]
    fn test_by_asset_and_active_contracts() {
        let storage = Storage::open_in_memory().unwrap();
        schedule(&storage);
        insert(
            &storage,
            DocType::AssetMaintenance,
            json!({"asset_name": "ACC-ASS-2025-00002", "custom_service_contract": 0}),
        );
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let data = call(
            &desk,
            "get_maintenances_by_asset",
            json!({"asset_name": "ACC-ASS-2025-00002"}),
        )
        .unwrap()
        .data;
        assert_eq!(data["total_count"], json!(1));
        assert_eq!(data["asset_maintenances"][0]["name"], json!("ACC-ASS-2025-00002"));

        let data = call(&desk, "get_active_service_contracts", json!({})).unwrap().data;
        assert_eq!(data["total_count"], json!(1));
        assert_eq!(data["asset_maintenances"][0]["name"], json!("ACC-ASS-2025-00001"));
    }
}
