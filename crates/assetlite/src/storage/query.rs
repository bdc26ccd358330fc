//! Translation of filters and ordering into `SQLite` SQL.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use crate::document::STANDARD_FIELDS;
use crate::error::Result;
use crate::store::{validate_field_name, Filter, Operator, OrderBy};

/// A `WHERE` clause with its positional parameters.
#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// SQL expression reading a field of a `documents` row.
pub(crate) fn column_expr(field: &str) -> Result<String> {
    validate_field_name(field)?;
    if STANDARD_FIELDS.contains(&field) {
        Ok(field.to_string())
    } else {
        Ok(format!("json_extract(data, '$.{field}')"))
    }
}

/// Convert a JSON value into a bindable SQL value.
pub(crate) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .unwrap_or_else(|| SqlValue::Real(n.as_f64().unwrap_or(0.0))),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Build `doctype = ? AND <filters...>`.
pub(crate) fn build_where(doctype: &str, filters: &[Filter]) -> Result<WhereClause> {
    let mut clause = WhereClause {
        sql: "doctype = ?".to_string(),
        params: vec![SqlValue::Text(doctype.to_string())],
    };
    for filter in filters {
        let condition = condition(&mut clause, filter)?;
        clause.sql.push_str(" AND ");
        clause.sql.push_str(&condition);
    }
    Ok(clause)
}

/// Append `AND (<a> OR <b> ...)` to a clause. No-op for an empty list.
pub(crate) fn push_any(clause: &mut WhereClause, filters: &[Filter]) -> Result<()> {
    if filters.is_empty() {
        return Ok(());
    }
    let mut parts = Vec::with_capacity(filters.len());
    for filter in filters {
        parts.push(condition(clause, filter)?);
    }
    clause.sql.push_str(" AND (");
    clause.sql.push_str(&parts.join(" OR "));
    clause.sql.push(')');
    Ok(())
}

fn condition(clause: &mut WhereClause, filter: &Filter) -> Result<String> {
    let expr = column_expr(&filter.field)?;
    let value = &filter.value;
    let condition = match filter.op {
        Operator::Eq => binary(clause, format!("IFNULL({expr}, '')"), "=", value),
        Operator::NotEq => binary(clause, format!("IFNULL({expr}, '')"), "!=", value),
        Operator::Lt => range(clause, expr, "<", value),
        Operator::Le => range(clause, expr, "<=", value),
        Operator::Gt => range(clause, expr, ">", value),
        Operator::Ge => range(clause, expr, ">=", value),
        Operator::Like => binary(clause, expr, "LIKE", value),
        Operator::NotLike => binary(clause, format!("IFNULL({expr}, '')"), "NOT LIKE", value),
        Operator::In => membership(clause, &expr, false, value),
        Operator::NotIn => membership(clause, &expr, true, value),
        Operator::Is => {
            if value.as_str() == Some("not set") {
                format!("IFNULL({expr}, '') = ''")
            } else {
                format!("IFNULL({expr}, '') != ''")
            }
        }
    };
    Ok(condition)
}

fn binary(clause: &mut WhereClause, lhs: String, op: &str, value: &Value) -> String {
    let rhs = match value {
        Value::Null => SqlValue::Text(String::new()),
        other => to_sql_value(other),
    };
    clause.params.push(rhs);
    format!("{lhs} {op} ?")
}

/// Numeric operand of a range comparison, including numbers sent as text.
fn numeric_operand(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Number(_) => Some(to_sql_value(value)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(SqlValue::Real),
        _ => None,
    }
}

/// Range comparison. Numeric operands compare numerically on both sides;
/// anything else (dates, names) compares as stored.
fn range(clause: &mut WhereClause, expr: String, op: &str, value: &Value) -> String {
    match numeric_operand(value) {
        Some(number) => {
            clause.params.push(number);
            format!("CAST({expr} AS REAL) {op} ?")
        }
        None => binary(clause, expr, op, value),
    }
}

fn membership(clause: &mut WhereClause, expr: &str, negate: bool, value: &Value) -> String {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    if items.is_empty() {
        return if negate { "1".to_string() } else { "0".to_string() };
    }
    let placeholders = vec!["?"; items.len()].join(", ");
    for item in items {
        let param = match item {
            Value::Null => SqlValue::Text(String::new()),
            other => to_sql_value(other),
        };
        clause.params.push(param);
    }
    let keyword = if negate { "NOT IN" } else { "IN" };
    format!("IFNULL({expr}, '') {keyword} ({placeholders})")
}

/// Build the `ORDER BY` clause body. Insertion order breaks ties.
pub(crate) fn build_order(order_by: &OrderBy) -> Result<String> {
    let expr = column_expr(&order_by.field)?;
    let direction = if order_by.descending { "DESC" } else { "ASC" };
    Ok(format!("{expr} {direction}, rowid {direction}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_expr() {
        assert_eq!(column_expr("creation").unwrap(), "creation");
        assert_eq!(
            column_expr("company").unwrap(),
            "json_extract(data, '$.company')"
        );
        assert!(column_expr("company') OR 1=1 --").is_err());
    }

    #[test]
    fn test_build_where_equality() {
        let clause = build_where("Asset", &[Filter::eq("company", "Corp1")]).unwrap();
        assert_eq!(
            clause.sql,
            "doctype = ? AND IFNULL(json_extract(data, '$.company'), '') = ?"
        );
        assert_eq!(clause.params.len(), 2);
    }

    #[test]
    fn test_build_where_in_list() {
        let clause =
            build_where("Asset", &[Filter::is_in("location", ["Ward 1", "Ward 2"])]).unwrap();
        assert!(clause.sql.ends_with("IN (?, ?)"));
        assert_eq!(clause.params.len(), 3);
    }

    #[test]
    fn test_build_where_empty_in_list_matches_nothing() {
        let filter = Filter::new("location", Operator::In, json!([])).unwrap();
        let clause = build_where("Asset", &[filter]).unwrap();
        assert!(clause.sql.ends_with("AND 0"));

        let filter = Filter::new("location", Operator::NotIn, json!([])).unwrap();
        let clause = build_where("Asset", &[filter]).unwrap();
        assert!(clause.sql.ends_with("AND 1"));
    }

    #[test]
    fn test_push_any() {
        let mut clause = build_where("Asset", &[]).unwrap();
        push_any(
            &mut clause,
            &[
                Filter::new("asset_name", Operator::Like, "%vent%").unwrap(),
                Filter::new("location", Operator::Like, "%vent%").unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(
            clause.sql,
            "doctype = ? AND (json_extract(data, '$.asset_name') LIKE ? OR json_extract(data, '$.location') LIKE ?)"
        );
        assert_eq!(clause.params.len(), 3);
    }

    #[test]
    fn test_build_where_is_set() {
        let clause = build_where("Location", &[Filter::is_set("latitude")]).unwrap();
        assert!(clause.sql.ends_with("IFNULL(json_extract(data, '$.latitude'), '') != ''"));
        assert_eq!(clause.params.len(), 1);
    }

    #[test]
    fn test_range_on_numbers_casts() {
        let filter = Filter::new("gross_purchase_amount", Operator::Gt, "1000").unwrap();
        let clause = build_where("Asset", &[filter]).unwrap();
        assert!(clause
            .sql
            .ends_with("CAST(json_extract(data, '$.gross_purchase_amount') AS REAL) > ?"));
        assert_eq!(clause.params[1], SqlValue::Real(1000.0));

        let filter = Filter::new("due_date", Operator::Lt, "2025-01-31").unwrap();
        let clause = build_where("Asset Maintenance Log", &[filter]).unwrap();
        assert!(clause.sql.ends_with("json_extract(data, '$.due_date') < ?"));
        assert_eq!(clause.params[1], SqlValue::Text("2025-01-31".to_string()));
    }

    #[test]
    fn test_to_sql_value() {
        assert_eq!(to_sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&json!(3)), SqlValue::Integer(3));
        assert_eq!(to_sql_value(&json!(2.5)), SqlValue::Real(2.5));
        assert_eq!(to_sql_value(&json!("x")), SqlValue::Text("x".to_string()));
        assert_eq!(to_sql_value(&Value::Null), SqlValue::Null);
    }

    #[test]
    fn test_build_order() {
        assert_eq!(
            build_order(&OrderBy::desc("creation")).unwrap(),
            "creation DESC, rowid DESC"
        );
        assert_eq!(
            build_order(&OrderBy::asc("due_date")).unwrap(),
            "json_extract(data, '$.due_date') ASC, rowid ASC"
        );
    }
}
