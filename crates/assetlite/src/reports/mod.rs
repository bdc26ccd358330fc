//! Aggregate maintenance and supplier reports.
//!
//! Every report runs a few aggregate queries straight against the `SQLite`
//! tables, derives a ratio or percentage per group and returns rows plus a
//! chart. A zero denominator yields 0, never an error.

mod maintenance;
mod supplier;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value as SqlValue;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::document::Fields;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// A named report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Report {
    /// Uptime to downtime ratio per asset.
    Mtbf,
    /// Maintenance logs as a share of work orders.
    PlannedMaintenancePercentage,
    /// Logs completed on time as a share of all logs.
    PreventiveMaintenanceCompliance,
    /// Repair spend as a share of asset purchase value.
    MaintenancePercentageOfReplacementValue,
    /// Hours from failure to first response.
    MaintenanceResponseTime,
    /// Downtime share per supplier.
    SupplierDownTime,
    /// Repair hours per asset per supplier.
    SupplierScore,
    /// Scorecard totals per supplier.
    SupplierTotalScore,
}

impl Report {
    /// Every report, in catalogue order.
    pub const ALL: [Report; 8] = [
        Self::Mtbf,
        Self::PlannedMaintenancePercentage,
        Self::PreventiveMaintenanceCompliance,
        Self::MaintenancePercentageOfReplacementValue,
        Self::MaintenanceResponseTime,
        Self::SupplierDownTime,
        Self::SupplierScore,
        Self::SupplierTotalScore,
    ];

    /// Display title.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Mtbf => "MTBF",
            Self::PlannedMaintenancePercentage => "Planned Maintenance Percentage (PMP)",
            Self::PreventiveMaintenanceCompliance => "Preventive Maintenance Compliance (PMC)",
            Self::MaintenancePercentageOfReplacementValue => {
                "Maintenance Percentage of Replacement Asset Value (MPRAV)"
            }
            Self::MaintenanceResponseTime => "Maintenance Response Time",
            Self::SupplierDownTime => "Supplier Down Time",
            Self::SupplierScore => "Supplier Score",
            Self::SupplierTotalScore => "Supplier Total Score",
        }
    }

    /// Short identifier used on the command line.
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Mtbf => "mtbf",
            Self::PlannedMaintenancePercentage => "pmp",
            Self::PreventiveMaintenanceCompliance => "pmc",
            Self::MaintenancePercentageOfReplacementValue => "mprav",
            Self::MaintenanceResponseTime => "maintenance_response_time",
            Self::SupplierDownTime => "supplier_down_time",
            Self::SupplierScore => "supplier_score",
            Self::SupplierTotalScore => "supplier_total_score",
        }
    }

    /// Filter keys the report understands.
    #[must_use]
    pub fn filter_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Mtbf => &["department", "asset", "asset_class", "vendor"],
            Self::PlannedMaintenancePercentage
            | Self::PreventiveMaintenanceCompliance
            | Self::MaintenancePercentageOfReplacementValue
            | Self::MaintenanceResponseTime => {
                &["department", "vendor", "asset_class", "periodicity"]
            }
            Self::SupplierDownTime | Self::SupplierTotalScore => &["supplier"],
            Self::SupplierScore => &["vendor"],
        }
    }

    /// Row field plotted on the x axis.
    #[must_use]
    pub fn x_field(&self) -> &'static str {
        match self {
            Self::Mtbf => "asset_name",
            Self::PlannedMaintenancePercentage
            | Self::PreventiveMaintenanceCompliance
            | Self::MaintenanceResponseTime => "period",
            Self::MaintenancePercentageOfReplacementValue => "date",
            Self::SupplierDownTime | Self::SupplierTotalScore => "supplier",
            Self::SupplierScore => "vendor",
        }
    }

    /// Run the report.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn run(&self, storage: &Storage, filters: &ReportFilters) -> Result<ReportOutput> {
        debug!("Running report {} with {:?}", self.title(), filters);
        let (columns, rows, chart) = match self {
            Self::Mtbf => maintenance::mtbf(storage, filters)?,
            Self::PlannedMaintenancePercentage => maintenance::planned_percentage(storage, filters)?,
            Self::PreventiveMaintenanceCompliance => maintenance::compliance(storage, filters)?,
            Self::MaintenancePercentageOfReplacementValue => {
                maintenance::replacement_value(storage, filters)?
            }
            Self::MaintenanceResponseTime => maintenance::response_time(storage, filters)?,
            Self::SupplierDownTime => supplier::down_time(storage, filters)?,
            Self::SupplierScore => supplier::score(storage, filters)?,
            Self::SupplierTotalScore => supplier::total_score(storage, filters)?,
        };
        Ok(ReportOutput {
            report: self.title().to_string(),
            columns,
            rows,
            chart,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Report {
    type Err = Error;

    /// Accepts the title or the slug, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|report| {
                report.title().eq_ignore_ascii_case(wanted) || report.slug().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| Error::UnknownReport(wanted.to_string()))
    }
}

/// Time bucket for period reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Periodicity {
    /// `MM-YYYY`.
    #[default]
    Monthly,
    /// `YYYY Qn`.
    Quarterly,
    /// `YYYY Hn`.
    HalfYearly,
    /// `YYYY`.
    Yearly,
}

impl Periodicity {
    /// SQL expression bucketing a date expression. `NULL` dates stay `NULL`.
    #[must_use]
    pub fn bucket_sql(&self, date: &str) -> String {
        let month = format!("CAST(strftime('%m', {date}) AS INTEGER)");
        match self {
            Self::Monthly => format!("strftime('%m-%Y', {date})"),
            Self::Quarterly => format!("strftime('%Y', {date}) || ' Q' || (({month} + 2) / 3)"),
            Self::HalfYearly => format!(
                "strftime('%Y', {date}) || ' H' || (CASE WHEN {month} <= 6 THEN 1 ELSE 2 END)"
            ),
            Self::Yearly => format!("strftime('%Y', {date})"),
        }
    }
}

impl FromStr for Periodicity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "half-yearly" | "half_yearly" | "halfyearly" => Ok(Self::HalfYearly),
            "yearly" => Ok(Self::Yearly),
            other => Err(Error::invalid_parameter(
                "periodicity",
                format!("unknown periodicity: {other}"),
            )),
        }
    }
}

/// Dimension filters shared by the reports. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilters {
    /// `asset.department`.
    pub department: Option<String>,
    /// `asset.custom_vendor`, or the work order vendor for supplier scores.
    pub vendor: Option<String>,
    /// `asset.custom_class`.
    pub asset_class: Option<String>,
    /// Asset name.
    pub asset: Option<String>,
    /// Supplier for the supplier reports.
    pub supplier: Option<String>,
    /// Time bucket.
    pub periodicity: Periodicity,
}

impl ReportFilters {
    /// Build from `key -> value` pairs. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown periodicity.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut filters = Self::default();
        for (key, value) in pairs {
            let value = value.trim();
            let slot = match key {
                "department" => &mut filters.department,
                "vendor" => &mut filters.vendor,
                "asset_class" => &mut filters.asset_class,
                "asset" => &mut filters.asset,
                "supplier" => &mut filters.supplier,
                "periodicity" => {
                    filters.periodicity = value.parse()?;
                    continue;
                }
                _ => continue,
            };
            *slot = (!value.is_empty()).then(|| value.to_string());
        }
        Ok(filters)
    }

    /// Build from a JSON object. `null` and non-object values mean no filters.
    ///
    /// # Errors
    ///
    /// Returns an error on an unknown periodicity.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Ok(Self::default());
        };
        let pairs: BTreeMap<&str, String> = map
            .iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key.as_str(), s.clone())),
                Value::Number(n) => Some((key.as_str(), n.to_string())),
                _ => None,
            })
            .collect();
        Self::from_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())))
    }
}

/// A column of a report table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Header text.
    pub label: &'static str,
    /// Row key.
    pub fieldname: &'static str,
    /// Display type: Data, Int, Float, Percent, Currency or Link.
    pub fieldtype: &'static str,
}

impl Column {
    const fn new(label: &'static str, fieldname: &'static str, fieldtype: &'static str) -> Self {
        Self {
            label,
            fieldname,
            fieldtype,
        }
    }
}

/// Chart style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    /// Vertical bars.
    Bar,
    /// Lines.
    Line,
}

/// One plotted series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    /// Legend text.
    pub name: String,
    /// One value per label; `null` leaves a gap.
    pub values: Vec<Value>,
    /// Bar or line color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Chart descriptor for a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    /// X axis labels.
    pub labels: Vec<Value>,
    /// Plotted series.
    pub datasets: Vec<Dataset>,
    /// Chart style.
    #[serde(rename = "type")]
    pub kind: ChartKind,
    /// Renderer options.
    pub options: Value,
}

impl Chart {
    /// A single-series chart of `y` against `x` over `rows`.
    fn single(kind: ChartKind, name: &str, rows: &[Fields], x: &str, y: &str) -> Self {
        Self {
            labels: column_values(rows, x),
            datasets: vec![Dataset {
                name: name.to_string(),
                values: column_values(rows, y),
                color: None,
            }],
            kind,
            options: Value::Object(Fields::new()),
        }
    }
}

/// Output of one report run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutput {
    /// Report title.
    pub report: String,
    /// Table columns.
    pub columns: Vec<Column>,
    /// Table rows keyed by column fieldname.
    pub rows: Vec<Fields>,
    /// Chart of the derived value.
    pub chart: Chart,
}

type Tabular = (Vec<Column>, Vec<Fields>, Chart);

/// Supplier rating for a percentage or hours-per-asset figure.
#[must_use]
pub fn status_band(value: f64) -> &'static str {
    if value <= 30.0 {
        "Excellent"
    } else if value <= 50.0 {
        "Average"
    } else if value <= 80.0 {
        "Poor"
    } else if value <= 100.0 {
        "Very Poor"
    } else {
        "Critical"
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
#[must_use]
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// `json_extract` of a field on an aliased `documents` or `child_rows` row.
fn field(alias: &str, name: &str) -> String {
    format!("json_extract({alias}.data, '$.{name}')")
}

/// Extra `AND` conditions with their parameters.
#[derive(Debug, Default)]
struct Conditions {
    sql: String,
    params: Vec<SqlValue>,
}

impl Conditions {
    fn push(&mut self, expr: &str, value: Option<&String>) {
        if let Some(value) = value {
            self.sql.push_str(" AND ");
            self.sql.push_str(expr);
            self.sql.push_str(" = ?");
            self.params.push(SqlValue::Text(value.clone()));
        }
    }

    /// Department, vendor and class conditions on the `asset` alias.
    fn asset_dimensions(filters: &ReportFilters, with_vendor: bool) -> Self {
        let mut conditions = Self::default();
        conditions.push(&field("asset", "department"), filters.department.as_ref());
        if with_vendor {
            conditions.push(&field("asset", "custom_vendor"), filters.vendor.as_ref());
        }
        conditions.push(&field("asset", "custom_class"), filters.asset_class.as_ref());
        conditions
    }
}

/// Chronological sort key of a bucket label; missing labels sort last.
fn period_key(label: Option<&str>) -> (bool, i64, i64) {
    let Some(label) = label else {
        return (true, 0, 0);
    };
    let number = |s: &str| s.trim_start_matches(['Q', 'H']).parse::<i64>().unwrap_or(0);
    if let Some((month, year)) = label.split_once('-') {
        (false, number(year), number(month))
    } else if let Some((year, part)) = label.split_once(' ') {
        (false, number(year), number(part))
    } else {
        (false, number(label), 0)
    }
}

/// Sort rows by their period label.
fn sort_by_period(rows: &mut [Fields], key: &str) {
    rows.sort_by_key(|row| period_key(row.get(key).and_then(Value::as_str)));
}

/// Values of one column across rows.
fn column_values(rows: &[Fields], key: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get(key).cloned().unwrap_or(Value::Null))
        .collect()
}

/// JSON object literal to row.
/// A JSON-extracted column as text. Numbers are rendered; other types read
/// as absent.
fn text(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match r.get::<_, SqlValue>(idx)? {
        SqlValue::Text(s) => Some(s),
        SqlValue::Integer(n) => Some(n.to_string()),
        SqlValue::Real(f) => Some(f.to_string()),
        SqlValue::Null | SqlValue::Blob(_) => None,
    })
}

fn row(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}
