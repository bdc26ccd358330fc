//! Asset reliability and maintenance performance reports.

use std::collections::BTreeMap;

use rusqlite::params_from_iter;
use serde_json::{json, Value};

use crate::document::round_to;
use crate::error::Result;
use crate::storage::Storage;

use super::{
    field, ratio, row, sort_by_period, text, Chart, ChartKind, Column, Conditions, Dataset,
    ReportFilters, Tabular,
};

/// Uptime to downtime ratio per asset.
pub(super) fn mtbf(storage: &Storage, filters: &ReportFilters) -> Result<Tabular> {
    let mut conditions = Conditions::asset_dimensions(filters, true);
    conditions.push("asset.name", filters.asset.as_ref());

    let sql = format!(
        "SELECT asset.name, {asset_name}, strftime('%m-%Y', {available}),
                SUM({up}), SUM({down})
         FROM documents asset
         WHERE asset.doctype = 'Asset'{conditions}
         GROUP BY asset.name
         ORDER BY asset.name",
        asset_name = field("asset", "asset_name"),
        available = field("asset", "available_for_use_date"),
        up = field("asset", "custom_up_time"),
        down = field("asset", "custom_down_time"),
        conditions = conditions.sql,
    );
    let mut stmt = storage.conn().prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(conditions.params.iter()), |r| {
            let uptime = r.get::<_, Option<f64>>(3)?.unwrap_or(0.0);
            let downtime = r.get::<_, Option<f64>>(4)?.unwrap_or(0.0);
            Ok(row(json!({
                "asset_name": r.get::<_, String>(0)?,
                "asset": text(r, 1)?,
                "available_date": r.get::<_, Option<String>>(2)?,
                "total_uptime_hours": uptime,
                "total_downtime_hours": downtime,
                "uptime_downtime_ratio": round_to(ratio(uptime, downtime), 2),
            })))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let columns = vec![
        Column::new("Asset", "asset_name", "Link"),
        Column::new("Asset Name", "asset", "Data"),
        Column::new("Available Date", "available_date", "Data"),
        Column::new("Total Uptime Hours", "total_uptime_hours", "Float"),
        Column::new("Total Downtime Hours", "total_downtime_hours", "Float"),
        Column::new("Uptime to Downtime Ratio", "uptime_downtime_ratio", "Float"),
    ];
    let chart = Chart::single(
        ChartKind::Bar,
        "Uptime to Downtime Ratio",
        &rows,
        "asset_name",
        "uptime_downtime_ratio",
    );
    Ok((columns, rows, chart))
}

/// Count maintenance logs per due date bucket, joined to their asset.
fn logs_per_period(
    storage: &Storage,
    filters: &ReportFilters,
    completed_on_time: bool,
) -> Result<Vec<(Option<String>, i64)>> {
    let conditions = Conditions::asset_dimensions(filters, true);
    let due = field("aml", "due_date");
    let on_time = if completed_on_time {
        format!(
            " AND {status} = 'Completed' AND {done} <= {due}",
            status = field("aml", "maintenance_status"),
            done = field("aml", "completion_date"),
        )
    } else {
        String::new()
    };
    let sql = format!(
        "SELECT {bucket} AS period, COUNT(aml.name)
         FROM documents aml
         JOIN documents asset
           ON asset.doctype = 'Asset' AND asset.name = {maintenance}
         WHERE aml.doctype = 'Asset Maintenance Log'{on_time}{conditions}
         GROUP BY period",
        bucket = filters.periodicity.bucket_sql(&due),
        maintenance = field("aml", "asset_maintenance"),
        conditions = conditions.sql,
    );
    let mut stmt = storage.conn().prepare(&sql)?;
    let counts = stmt
        .query_map(params_from_iter(conditions.params.iter()), |r| {
            Ok((r.get(0)?, r.get(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(counts)
}

/// Maintenance logs per period as a share of all work orders.
pub(super) fn planned_percentage(storage: &Storage, filters: &ReportFilters) -> Result<Tabular> {
    let logs = logs_per_period(storage, filters, false)?;

    let conditions = Conditions::asset_dimensions(filters, true);
    let sql = format!(
        "SELECT COUNT(wo.name)
         FROM documents wo
         JOIN documents asset ON asset.doctype = 'Asset' AND asset.name = {asset}
         WHERE wo.doctype = 'Work_Order'{conditions}",
        asset = field("wo", "asset"),
        conditions = conditions.sql,
    );
    let total_work_orders: i64 =
        storage
            .conn()
            .query_row(&sql, params_from_iter(conditions.params.iter()), |r| r.get(0))?;

    #[allow(clippy::cast_precision_loss)]
    let mut rows: Vec<_> = logs
        .into_iter()
        .map(|(period, total)| {
            let percentage = round_to(ratio(total as f64, total_work_orders as f64) * 100.0, 3);
            row(json!({
                "period": period,
                "total_logs": total,
                "total_work_orders": total_work_orders,
                "percentage": percentage,
            }))
        })
        .collect();
    sort_by_period(&mut rows, "period");

    let columns = vec![
        Column::new("Period", "period", "Data"),
        Column::new("Total Asset Maintenance Logs", "total_logs", "Int"),
        Column::new("Total Work Orders", "total_work_orders", "Int"),
        Column::new("Percentage", "percentage", "Percent"),
    ];
    let chart = Chart::single(ChartKind::Bar, "Percentage", &rows, "period", "percentage");
    Ok((columns, rows, chart))
}

/// Share of logs completed on or before their due date.
pub(super) fn compliance(storage: &Storage, filters: &ReportFilters) -> Result<Tabular> {
    let totals = logs_per_period(storage, filters, false)?;
    let completed: BTreeMap<Option<String>, i64> =
        logs_per_period(storage, filters, true)?.into_iter().collect();

    #[allow(clippy::cast_precision_loss)]
    let mut rows: Vec<_> = totals
        .into_iter()
        .map(|(period, total)| {
            let done = completed.get(&period).copied().unwrap_or(0);
            row(json!({
                "period": period,
                "total_logs": total,
                "completed_logs": done,
                "percentage": ratio(done as f64, total as f64) * 100.0,
            }))
        })
        .collect();
    sort_by_period(&mut rows, "period");

    let columns = vec![
        Column::new("Period", "period", "Data"),
        Column::new("Total Asset Maintenance Logs", "total_logs", "Int"),
        Column::new("Completed Asset Maintenance Logs", "completed_logs", "Int"),
        Column::new("Percentage Completed", "percentage", "Percent"),
    ];
    let chart = Chart::single(
        ChartKind::Bar,
        "Percentage Completed",
        &rows,
        "period",
        "percentage",
    );
    Ok((columns, rows, chart))
}

/// Purchase spend on work orders as a share of asset purchase value.
pub(super) fn replacement_value(storage: &Storage, filters: &ReportFilters) -> Result<Tabular> {
    let conditions = Conditions::asset_dimensions(filters, true);
    let sql = format!(
        "SELECT {bucket} AS period, SUM({amount})
         FROM child_rows item
         JOIN documents mr
           ON mr.doctype = 'Material Request' AND mr.name = item.parent
         JOIN documents wo
           ON wo.doctype = 'Work_Order' AND wo.name = {work_order}
         JOIN documents asset
           ON asset.doctype = 'Asset' AND asset.name = {asset}
         WHERE item.parenttype = 'Material Request'
           AND item.parentfield = 'items'
           AND {request_type} = 'Purchase'{conditions}
         GROUP BY period",
        bucket = filters.periodicity.bucket_sql(&field("wo", "failure_date")),
        amount = field("item", "amount"),
        work_order = field("mr", "custom_work_orders"),
        asset = field("wo", "asset"),
        request_type = field("mr", "material_request_type"),
        conditions = conditions.sql,
    );
    let mut stmt = storage.conn().prepare(&sql)?;
    let costs: Vec<(Option<String>, f64)> = stmt
        .query_map(params_from_iter(conditions.params.iter()), |r| {
            Ok((r.get(0)?, r.get::<_, Option<f64>>(1)?.unwrap_or(0.0)))
        })?
        .collect::<std::result::Result<_, _>>()?;

    let sql = format!(
        "SELECT SUM({gross}) FROM documents asset WHERE asset.doctype = 'Asset'{conditions}",
        gross = field("asset", "gross_purchase_amount"),
        conditions = conditions.sql,
    );
    let total_actual_cost = storage
        .conn()
        .query_row(&sql, params_from_iter(conditions.params.iter()), |r| {
            r.get::<_, Option<f64>>(0)
        })?
        .unwrap_or(0.0);

    let mut rows: Vec<_> = costs
        .into_iter()
        .map(|(period, repair)| {
            row(json!({
                "date": period,
                "total_repair_cost": repair,
                "total_actual_cost": total_actual_cost,
                "cost_ratio": round_to(ratio(repair * 100.0, total_actual_cost), 2),
            }))
        })
        .collect();
    sort_by_period(&mut rows, "date");

    let columns = vec![
        Column::new("Date", "date", "Data"),
        Column::new("Total Repair Cost", "total_repair_cost", "Currency"),
        Column::new("Total Actual Asset Cost", "total_actual_cost", "Currency"),
        Column::new("Repair Cost to Asset Cost Ratio (%)", "cost_ratio", "Percent"),
    ];
    let mut chart = Chart::single(
        ChartKind::Bar,
        "Repair Cost to Asset Cost Ratio (%)",
        &rows,
        "date",
        "cost_ratio",
    );
    chart.datasets[0].color = Some("#FF5733".to_string());
    chart.options = json!({"height": 300, "barWidth": 15});
    Ok((columns, rows, chart))
}

/// Average whole hours from failure to first response, per failure bucket.
fn response_hours(
    storage: &Storage,
    filters: &ReportFilters,
    vendor: Option<&String>,
) -> Result<Vec<(Option<String>, i64, Option<f64>)>> {
    let mut conditions = Conditions::asset_dimensions(filters, false);
    conditions.push(&field("asset", "custom_vendor"), vendor);
    let failed = field("wo", "failure_date");
    let responded = field("wo", "first_responded_on");
    let sql = format!(
        "SELECT {bucket} AS period, COUNT(wo.name),
                AVG((strftime('%s', {responded}) - strftime('%s', {failed})) / 3600)
         FROM documents wo
         JOIN documents asset ON asset.doctype = 'Asset' AND asset.name = {asset}
         WHERE wo.doctype = 'Work_Order'
           AND {failed} IS NOT NULL
           AND {responded} IS NOT NULL{conditions}
         GROUP BY period",
        bucket = filters.periodicity.bucket_sql(&failed),
        asset = field("wo", "asset"),
        conditions = conditions.sql,
    );
    let mut stmt = storage.conn().prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(conditions.params.iter()), |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Response times overall, plus a vendor series when a vendor is given.
pub(super) fn response_time(storage: &Storage, filters: &ReportFilters) -> Result<Tabular> {
    let overall = response_hours(storage, filters, None)?;
    let by_vendor: BTreeMap<Option<String>, f64> = match filters.vendor.as_ref() {
        Some(vendor) => response_hours(storage, filters, Some(vendor))?
            .into_iter()
            .map(|(period, _, avg)| (period, round_to(avg.unwrap_or(0.0), 2)))
            .collect(),
        None => BTreeMap::new(),
    };

    let mut rows: Vec<_> = overall
        .into_iter()
        .map(|(period, count, avg)| {
            let vendor_average = by_vendor.get(&period).map_or(Value::Null, |v| json!(v));
            let mut out = row(json!({
                "period": period,
                "total_work_orders": count,
                "average_response_time": round_to(avg.unwrap_or(0.0), 2),
            }));
            if filters.vendor.is_some() {
                out.insert("vendor_average_response_time".to_string(), vendor_average);
            }
            out
        })
        .collect();
    sort_by_period(&mut rows, "period");

    let mut columns = vec![
        Column::new("Period", "period", "Data"),
        Column::new("Total Work Orders", "total_work_orders", "Int"),
        Column::new(
            "Overall Avg Response Time (Hours)",
            "average_response_time",
            "Float",
        ),
    ];
    let mut chart = Chart::single(
        ChartKind::Line,
        "Overall Avg Response Time (Hours)",
        &rows,
        "period",
        "average_response_time",
    );
    chart.datasets.push(Dataset {
        name: "Total Work Orders".to_string(),
        values: super::column_values(&rows, "total_work_orders"),
        color: None,
    });

    if let Some(vendor) = filters.vendor.as_ref() {
        columns.push(Column::new(
            "Vendor Avg Response Time (Hours)",
            "vendor_average_response_time",
            "Float",
        ));
        let values = rows
            .iter()
            .map(|r| match r.get("vendor_average_response_time") {
                Some(Value::Null) | None => json!(0.0),
                Some(v) => v.clone(),
            })
            .collect();
        chart.datasets.push(Dataset {
            name: format!("Vendor Avg Response Time ({vendor})"),
            values,
            color: None,
        });
    }
    chart.options = json!({"colors": ["#FF5733", "#33B5FF", "#28A745"]});
    Ok((columns, rows, chart))
}
