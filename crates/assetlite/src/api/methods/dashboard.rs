//! Dashboard cards, the site map and report charts.

use serde_json::{json, Value};

use crate::doctype::DocType;
use crate::error::Result;
use crate::permission::Ptype;
use crate::reports::{Report, ReportFilters};
use crate::service::Desk;
use crate::store::{Filter, ListQuery, OrderBy};

use super::{Params, Reply};

const OPEN: &[&str] = &["Not Started", "Open", "Pending"];
const IN_PROGRESS: &[&str] = &["In Process", "In Progress", "Started", "Work In Progress"];
const COMPLETED: &[&str] = &["Completed", "Closed", "Finished"];
const ACTIVE: &[&str] = &["Open", "Work In Progress"];

fn work_orders_in(desk: &Desk<'_>, statuses: &[&str]) -> Result<usize> {
    desk.count(
        DocType::WorkOrder,
        &[Filter::is_in("repair_status", statuses.iter().copied())],
    )
}

pub(super) fn get_number_cards(desk: &Desk<'_>, _params: &Params) -> Result<Reply> {
    Ok(Reply::data(json!({
        "total_assets": desk.count(DocType::Asset, &[])?,
        "work_orders_open": work_orders_in(desk, OPEN)?,
        "work_orders_in_progress": work_orders_in(desk, IN_PROGRESS)?,
        "work_orders_completed": work_orders_in(desk, COMPLETED)?,
    })))
}

/// Counts for one site, keyed the way the map widget reads them.
fn site_markers(desk: &Desk<'_>, site: &str) -> Result<Value> {
    let orders = |extra: Vec<Filter>| -> Result<usize> {
        let mut filters = vec![Filter::eq("company", site)];
        filters.extend(extra);
        desk.count(DocType::WorkOrder, &filters)
    };
    let logs = |status: &'static str| -> Result<usize> {
        desk.count(
            DocType::AssetMaintenanceLog,
            &[
                Filter::eq("custom_hospital_name", site),
                Filter::eq("maintenance_status", status),
            ],
        )
    };
    let active = |priority: &'static str| {
        orders(vec![
            Filter::eq("custom_priority_", priority),
            Filter::is_in("repair_status", ACTIVE.iter().copied()),
        ])
    };
    let status = |status: &'static str| orders(vec![Filter::eq("repair_status", status)]);

    Ok(json!({
        "assets": desk.count(DocType::Asset, &[Filter::eq("company", site)])?,
        "normal_work_orders": active("Normal")?,
        "urgent_work_orders": active("Urgent")?,
        "wo_open": status("Open")?,
        "wo_progress": status("Work In Progress")?,
        "wo_review": status("Pending Review")?,
        "wo_completed": status("Completed")?,
        "planned_maintenance": logs("Planned")?,
        "completed_maintenance": logs("Completed")?,
        "overdue_maintenance": logs("Overdue")?,
    }))
}

pub(super) fn get_active_map_data(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let mut query = ListQuery::new()
        .filter(Filter::is_set("latitude"))
        .filter(Filter::is_set("longitude"))
        .order_by(OrderBy::asc("name"));
    if let Some(hospital) = params.text("hospital") {
        query = query.filter(Filter::eq("name", hospital));
    }
    let mut markers = Vec::new();
    for location in desk.list(DocType::Location, query)? {
        let mut marker = site_markers(desk, &location.name)?;
        marker["name"] = Value::from(location.name.clone());
        marker["latitude"] = location.value("latitude");
        marker["longitude"] = location.value("longitude");
        markers.push(marker);
    }
    Ok(Reply::data(markers))
}

/// Entity type a report reads; running it needs read access there.
fn source(report: Report) -> DocType {
    match report {
        Report::Mtbf | Report::SupplierDownTime => DocType::Asset,
        Report::PlannedMaintenancePercentage | Report::PreventiveMaintenanceCompliance => {
            DocType::AssetMaintenanceLog
        }
        Report::MaintenancePercentageOfReplacementValue
        | Report::MaintenanceResponseTime
        | Report::SupplierScore => DocType::WorkOrder,
        Report::SupplierTotalScore => DocType::SupplierScorecard,
    }
}

fn run(desk: &Desk<'_>, params: &Params, name_key: &str, filters_key: &str) -> Result<(Report, Value)> {
    let report: Report = params.require(name_key, name_key)?.parse()?;
    desk.check(source(report), Ptype::Read, None)?;
    let filters = ReportFilters::from_json(&params.json(filters_key)?.unwrap_or(Value::Null))?;
    let output = report.run(desk.storage(), &filters)?;
    Ok((report, serde_json::to_value(output)?))
}

pub(super) fn list_dashboard_charts(_desk: &Desk<'_>, _params: &Params) -> Result<Reply> {
    let charts: Vec<Value> = Report::ALL
        .iter()
        .map(|report| {
            json!({
                "name": report.title(),
                "slug": report.slug(),
                "chart_type": "Report",
                "x_field": report.x_field(),
                "filters": report.filter_keys(),
            })
        })
        .collect();
    Ok(Reply::data(json!({ "charts": charts })))
}

pub(super) fn get_dashboard_chart_data(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let (report, mut output) = run(desk, params, "chart_name", "report_filters")?;
    let mut chart = output["chart"].take();
    chart["source"] = json!({ "report": report.title() });
    Ok(Reply::data(chart))
}

pub(super) fn run_report(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let (_, output) = run(desk, params, "report_name", "filters")?;
    Ok(Reply::data(output))
}
