//! Supplier performance reports.

use std::collections::HashMap;

use rusqlite::params_from_iter;
use serde_json::{json, Value};

use crate::doctype::DocType;
use crate::document::{flt, round_to, Fields};
use crate::error::Result;
use crate::storage::Storage;
use crate::store::{DocumentStore, Filter, ListQuery};

use super::{
    field, ratio, row, status_band, text, Chart, ChartKind, Column, Conditions, Dataset,
    ReportFilters, Tabular,
};

const PALETTE: [&str; 5] = ["#FF5733", "#33FF57", "#3357FF", "#F1C40F", "#9B59B6"];

/// Downtime as a share of total hours per supplier, over submitted assets.
pub(super) fn down_time(storage: &Storage, filters: &ReportFilters) -> Result<Tabular> {
    let vendor = field("a", "custom_vendor");
    let mut conditions = Conditions::default();
    conditions.push(&vendor, filters.supplier.as_ref());
    let sql = format!(
        "SELECT {vendor}, SUM({total}) AS total_hours, SUM({down})
         FROM documents a
         WHERE a.doctype = 'Asset' AND a.docstatus = 1{conditions}
         GROUP BY {vendor}
         ORDER BY total_hours DESC",
        total = field("a", "custom_total_hours"),
        down = field("a", "custom_down_time"),
        conditions = conditions.sql,
    );
    let mut stmt = storage.conn().prepare(&sql)?;
    let mut rows = stmt
        .query_map(params_from_iter(conditions.params.iter()), |r| {
            let total_hours = r.get::<_, Option<f64>>(1)?.unwrap_or(0.0);
            let downtime = r.get::<_, Option<f64>>(2)?.unwrap_or(0.0);
            let percentage = if total_hours > 0.0 {
                round_to(downtime / total_hours * 100.0, 2)
            } else {
                0.0
            };
            Ok(row(json!({
                "supplier": text(r, 0)?,
                "total_hours": total_hours,
                "downtime": downtime,
                "percentage": percentage,
                "status": status_band(percentage),
            })))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.sort_by(|a, b| number(a, "percentage").total_cmp(&number(b, "percentage")));

    let columns = vec![
        Column::new("Supplier", "supplier", "Link"),
        Column::new("Sum of Total Hours", "total_hours", "Float"),
        Column::new("Sum of Downtime", "downtime", "Float"),
        Column::new("Downtime Percentage", "percentage", "Percent"),
        Column::new("Status", "status", "Data"),
    ];
    let chart = Chart::single(
        ChartKind::Bar,
        "Downtime Percentage",
        &rows,
        "supplier",
        "percentage",
    );
    Ok((columns, rows, chart))
}

/// Repair hours on submitted work orders per submitted asset, per vendor.
pub(super) fn score(storage: &Storage, filters: &ReportFilters) -> Result<Tabular> {
    let vendor = field("wo", "vendor");
    let mut conditions = Conditions::default();
    conditions.push(&vendor, filters.vendor.as_ref());
    let sql = format!(
        "SELECT {vendor}, SUM({hours}) AS total_hours
         FROM documents wo
         WHERE wo.doctype = 'Work_Order' AND wo.docstatus = 1
           AND {vendor} IS NOT NULL{conditions}
         GROUP BY {vendor}
         ORDER BY total_hours DESC",
        hours = field("wo", "total_hours_spent"),
        conditions = conditions.sql,
    );
    let mut stmt = storage.conn().prepare(&sql)?;
    let hours: Vec<(String, f64)> = stmt
        .query_map(params_from_iter(conditions.params.iter()), |r| {
            Ok((text(r, 0)?, r.get::<_, Option<f64>>(1)?.unwrap_or(0.0)))
        })?
        .filter_map(|entry| match entry {
            Ok((vendor, hours)) => vendor.map(|vendor| Ok((vendor, hours))),
            Err(e) => Some(Err(e)),
        })
        .collect::<std::result::Result<_, _>>()?;

    let asset_vendor = field("asset", "custom_vendor");
    let sql = format!(
        "SELECT {asset_vendor}, COUNT(asset.name)
         FROM documents asset
         WHERE asset.doctype = 'Asset' AND asset.docstatus = 1 AND {asset_vendor} IS NOT NULL
         GROUP BY {asset_vendor}"
    );
    let mut stmt = storage.conn().prepare(&sql)?;
    let assets: HashMap<String, i64> = stmt
        .query_map([], |r| Ok((text(r, 0)?, r.get(1)?)))?
        .filter_map(|entry| match entry {
            Ok((vendor, count)) => vendor.map(|vendor| Ok((vendor, count))),
            Err(e) => Some(Err(e)),
        })
        .collect::<std::result::Result<_, _>>()?;

    #[allow(clippy::cast_precision_loss)]
    let rows: Vec<_> = hours
        .into_iter()
        .map(|(vendor, total_hours)| {
            let total_assets = assets.get(&vendor).copied().unwrap_or(0);
            let hours_per_asset = round_to(ratio(total_hours, total_assets as f64), 2);
            row(json!({
                "vendor": vendor,
                "total_hours": round_to(total_hours, 2),
                "total_assets": total_assets,
                "hours_per_asset": hours_per_asset,
                "status": status_band(hours_per_asset),
            }))
        })
        .collect();

    let columns = vec![
        Column::new("Supplier", "vendor", "Link"),
        Column::new("Total Repair Hours", "total_hours", "Float"),
        Column::new("Total Assets", "total_assets", "Int"),
        Column::new("Repair Hours per Asset", "hours_per_asset", "Float"),
        Column::new("Status", "status", "Data"),
    ];
    let chart = Chart::single(
        ChartKind::Bar,
        "Repair Hours per Asset",
        &rows,
        "vendor",
        "hours_per_asset",
    );
    Ok((columns, rows, chart))
}

/// Scorecard totals per supplier, ascending, one stacked series per supplier.
pub(super) fn total_score(storage: &Storage, filters: &ReportFilters) -> Result<Tabular> {
    let mut query = ListQuery::new();
    if let Some(supplier) = filters.supplier.as_ref() {
        query = query.filter(Filter::eq("supplier", supplier.as_str()));
    }
    let mut rows: Vec<Fields> = storage
        .list(DocType::SupplierScorecard, &query)?
        .iter()
        .map(|card| {
            row(json!({
                "supplier": card.value("supplier"),
                "supplier_score": flt(&card.value("supplier_score")),
                "status": card.value("status"),
            }))
        })
        .collect();
    rows.sort_by(|a, b| number(a, "supplier_score").total_cmp(&number(b, "supplier_score")));

    let mut suppliers: Vec<Value> = Vec::new();
    for r in &rows {
        if !suppliers.contains(&r["supplier"]) {
            suppliers.push(r["supplier"].clone());
        }
    }
    let datasets = suppliers
        .iter()
        .enumerate()
        .map(|(i, supplier)| Dataset {
            name: supplier.as_str().unwrap_or_default().to_string(),
            values: rows
                .iter()
                .map(|r| {
                    if r["supplier"] == *supplier {
                        r["supplier_score"].clone()
                    } else {
                        Value::Null
                    }
                })
                .collect(),
            color: Some(PALETTE[i % PALETTE.len()].to_string()),
        })
        .collect();
    let chart = Chart {
        labels: super::column_values(&rows, "supplier"),
        datasets,
        kind: ChartKind::Bar,
        options: json!({"scales": {"x": {"stacked": true}, "y": {"stacked": true}}}),
    };

    let columns = vec![
        Column::new("Supplier", "supplier", "Link"),
        Column::new("Supplier Score", "supplier_score", "Float"),
        Column::new("Status", "status", "Data"),
    ];
    Ok((columns, rows, chart))
}

fn number(row: &Fields, key: &str) -> f64 {
    row.get(key).map_or(0.0, flt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::permission::ADMINISTRATOR;
    use crate::reports::Report;

    fn insert(storage: &Storage, doctype: DocType, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("expected object");
        };
        let doc = Document::from_fields(doctype, fields).unwrap();
        storage.insert(doc, ADMINISTRATOR).unwrap();
    }

    fn seed(storage: &Storage) {
        for (vendor, total, down, docstatus) in [
            ("MedCo", 100, 40, 1),
            ("MedCo", 100, 20, 1),
            ("Acme", 200, 10, 1),
            ("Acme", 500, 500, 0),
            ("Idle", 0, 0, 1),
        ] {
            insert(
                storage,
                DocType::Asset,
                json!({
                    "asset_name": "Pump", "custom_vendor": vendor,
                    "custom_total_hours": total, "custom_down_time": down,
                    "docstatus": docstatus
                }),
            );
        }
    }

    #[test]
    fn test_down_time_percentages_sorted() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage);

        let output = Report::SupplierDownTime
            .run(&storage, &ReportFilters::default())
            .unwrap();
        let suppliers: Vec<_> = output.rows.iter().map(|r| r["supplier"].clone()).collect();
        assert_eq!(suppliers, vec![json!("Idle"), json!("Acme"), json!("MedCo")]);

        assert_eq!(output.rows[0]["percentage"], json!(0.0));
        assert_eq!(output.rows[1]["percentage"], json!(5.0));
        assert_eq!(output.rows[1]["status"], json!("Excellent"));
        assert_eq!(output.rows[2]["percentage"], json!(30.0));
        assert_eq!(output.rows[2]["downtime"], json!(60.0));
    }

    #[test]
    fn test_down_time_supplier_filter() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage);

        let filters = ReportFilters {
            supplier: Some("Acme".to_string()),
            ..ReportFilters::default()
        };
        let output = Report::SupplierDownTime.run(&storage, &filters).unwrap();
        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0]["total_hours"], json!(200.0));
    }

    #[test]
    fn test_score_hours_per_asset() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage);
        for (vendor, hours, docstatus) in [
            ("MedCo", 70.0, 1),
            ("MedCo", 50.5, 1),
            ("Acme", 12.0, 0),
            ("Nobody", 9.0, 1),
        ] {
            insert(
                &storage,
                DocType::WorkOrder,
                json!({"vendor": vendor, "total_hours_spent": hours, "docstatus": docstatus}),
            );
        }

        let output = Report::SupplierScore
            .run(&storage, &ReportFilters::default())
            .unwrap();
        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0]["vendor"], json!("MedCo"));
        assert_eq!(output.rows[0]["total_assets"], json!(2));
        assert_eq!(output.rows[0]["hours_per_asset"], json!(60.25));
        assert_eq!(output.rows[0]["status"], json!("Poor"));
        assert_eq!(output.rows[1]["vendor"], json!("Nobody"));
        assert_eq!(output.rows[1]["total_assets"], json!(0));
        assert_eq!(output.rows[1]["hours_per_asset"], json!(0.0));
    }

    #[test]
    fn test_numeric_vendor_codes_are_reported() {
        let storage = Storage::open_in_memory().unwrap();
        insert(
            &storage,
            DocType::Asset,
            json!({"custom_vendor": 4012, "custom_total_hours": 50, "custom_down_time": 5, "docstatus": 1}),
        );
        insert(
            &storage,
            DocType::WorkOrder,
            json!({"vendor": 4012, "total_hours_spent": 8, "docstatus": 1}),
        );
        insert(
            &storage,
            DocType::WorkOrder,
            json!({"vendor": ["odd"], "total_hours_spent": 1, "docstatus": 1}),
        );

        let output = Report::SupplierDownTime
            .run(&storage, &ReportFilters::default())
            .unwrap();
        assert_eq!(output.rows[0]["supplier"], json!("4012"));
        assert_eq!(output.rows[0]["percentage"], json!(10.0));

        let output = Report::SupplierScore
            .run(&storage, &ReportFilters::default())
            .unwrap();
        let vendors: Vec<_> = output.rows.iter().map(|r| r["vendor"].clone()).collect();
        assert!(vendors.contains(&json!("4012")));
        let row = output.rows.iter().find(|r| r["vendor"] == json!("4012")).unwrap();
        assert_eq!(row["total_assets"], json!(1));
        assert_eq!(row["hours_per_asset"], json!(8.0));
    }

    #[test]
    fn test_total_score_stacked_chart() {
        let storage = Storage::open_in_memory().unwrap();
        for (supplier, score) in [("MedCo", json!("72.5")), ("Acme", json!(40)), ("Zed", Value::Null)] {
            insert(
                &storage,
                DocType::SupplierScorecard,
                json!({"supplier": supplier, "supplier_score": score, "status": "Active"}),
            );
        }

        let output = Report::SupplierTotalScore
            .run(&storage, &ReportFilters::default())
            .unwrap();
        let scores: Vec<_> = output.rows.iter().map(|r| r["supplier_score"].clone()).collect();
        assert_eq!(scores, vec![json!(0.0), json!(40.0), json!(72.5)]);

        assert_eq!(output.chart.datasets.len(), 3);
        assert_eq!(output.chart.datasets[1].name, "Acme");
        assert_eq!(output.chart.datasets[1].values, vec![Value::Null, json!(40.0), Value::Null]);
    }
}
