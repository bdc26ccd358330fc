//! Asset methods, including finance books and depreciation.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use crate::doctype::DocType;
use crate::document::{cint, flt, is_truthy, ChildRow, Document};
use crate::error::{Error, Result};
use crate::service::Desk;
use crate::store::{Filter, ListQuery, Operator, OrderBy};

use super::{modify, projection, Entity, Page, Params, Reply};

const DEFAULT_FIELDS: &[&str] = &[
    "name",
    "asset_name",
    "company",
    "custom_serial_number",
    "location",
    "custom_manufacturer",
    "department",
    "custom_asset_type",
    "custom_manufacturing_year",
    "custom_model",
    "custom_class",
    "custom_device_status",
    "custom_down_time",
    "asset_owner_company",
    "custom_up_time",
    "custom_modality",
    "custom_attach_image",
    "custom_site_contractor",
    "custom_total_amount",
    "creation",
    "modified",
    "owner",
    "modified_by",
    "calculate_depreciation",
    "opening_accumulated_depreciation",
    "opening_number_of_booked_depreciations",
    "is_fully_depreciated",
    "depreciation_method",
    "value_after_depreciation",
    "total_number_of_depreciations",
    "frequency_of_depreciation",
    "gross_purchase_amount",
    "total_asset_cost",
    "available_for_use_date",
    "status",
];

const SEARCH_FIELDS: &[&str] = &[
    "name",
    "asset_name",
    "custom_serial_number",
    "location",
    "company",
    "custom_device_status",
    "calculate_depreciation",
    "value_after_depreciation",
    "is_fully_depreciated",
];

const SEARCHED: &[&str] = &[
    "asset_name",
    "custom_serial_number",
    "location",
    "custom_manufacturer",
];

const DEPRECIATION_METHODS: &[&str] = &[
    "Straight Line",
    "Double Declining Balance",
    "Written Down Value",
    "Manual",
];

const FINANCE_BOOKS: &str = "finance_books";
const SCHEDULES: &str = "schedules";

const ASSET: Entity = Entity {
    doctype: DocType::Asset,
    label: "Asset",
    singular: "asset",
    plural: "assets",
    name_param: "asset_name",
    data_param: "asset_data",
    default_fields: DEFAULT_FIELDS,
};

fn asset_name(params: &Params) -> Result<String> {
    params.require("asset_name", "Asset name")
}

fn finance_book_name(params: &Params) -> Result<String> {
    params.require("finance_book_name", "Finance book name")
}

fn is_posted(row: &ChildRow) -> bool {
    row.fields.get("journal_entry").is_some_and(is_truthy)
}

pub(super) fn get_assets(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let fields = projection(params, DEFAULT_FIELDS)?;
    let with_books = params.flag_or("include_finance_books", true);
    let page = Page::from_params(desk, params, DocType::Asset, Vec::new(), params.order_by()?)?;
    Ok(Reply::data(page.render("assets", |doc| {
        let mut row = doc.project(&fields);
        if with_books {
            row[FINANCE_BOOKS] = doc.value(FINANCE_BOOKS);
        }
        row
    })))
}

pub(super) fn get_asset_details(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let name = asset_name(params)?;
    let asset = desk.get(DocType::Asset, &name)?;
    let mut out = asset.to_json();
    if params.flag_or("include_depreciation_schedule", false) {
        out["depreciation_schedule"] = Value::Array(
            schedule(&asset, None)
                .into_iter()
                .map(|row| row.to_json(&asset, SCHEDULES))
                .collect(),
        );
    }
    out["depreciation_summary"] = depreciation_summary(&asset);
    Ok(Reply::data(out))
}

/// Depreciation schedule rows by date, optionally for one finance book.
fn schedule<'a>(asset: &'a Document, finance_book: Option<&str>) -> Vec<&'a ChildRow> {
    let mut rows: Vec<&ChildRow> = asset
        .rows(SCHEDULES)
        .iter()
        .filter(|row| finance_book.map_or(true, |book| row.get_str("finance_book") == Some(book)))
        .collect();
    rows.sort_by_key(|row| row.get_str("schedule_date").unwrap_or_default().to_string());
    rows
}

/// Booked and pending depreciation of one asset.
pub(crate) fn depreciation_summary(asset: &Document) -> Value {
    let rows = asset.rows(SCHEDULES);
    let booked: f64 = rows
        .iter()
        .filter(|row| is_posted(row))
        .map(|row| row.fields.get("depreciation_amount").map_or(0.0, flt))
        .sum();
    let completed = rows.iter().filter(|row| is_posted(row)).count();
    json!({
        "gross_purchase_amount": asset.get_f64("gross_purchase_amount"),
        "total_asset_cost": asset.get_f64("total_asset_cost"),
        "opening_accumulated_depreciation": asset.get_f64("opening_accumulated_depreciation"),
        "total_depreciation_booked": booked,
        "value_after_depreciation": asset.get_f64("value_after_depreciation"),
        "is_fully_depreciated": asset.value("is_fully_depreciated"),
        "pending_depreciation_entries": rows.len() - completed,
        "completed_depreciation_entries": completed,
        "calculate_depreciation": asset.value("calculate_depreciation"),
    })
}

pub(super) fn get_asset_finance_books(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let name = asset_name(params)?;
    let asset = desk.get(DocType::Asset, &name)?;
    let books: Vec<Value> = asset
        .rows(FINANCE_BOOKS)
        .iter()
        .map(|row| row.to_json(&asset, FINANCE_BOOKS))
        .collect();
    Ok(Reply::data(json!({
        "asset_name": name,
        "count": books.len(),
        "finance_books": books,
    })))
}

pub(super) fn get_asset_depreciation_schedule(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let name = asset_name(params)?;
    let asset = desk.get(DocType::Asset, &name)?;
    let finance_book = params.text("finance_book");
    let rows = schedule(&asset, finance_book.as_deref());
    let posted = rows.iter().filter(|row| is_posted(row)).count();
    let entries: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut entry = row.to_json(&asset, SCHEDULES);
            entry["status"] = Value::from(if is_posted(row) { "Posted" } else { "Pending" });
            entry
        })
        .collect();
    Ok(Reply::data(json!({
        "asset_name": name,
        "total_entries": entries.len(),
        "posted_entries": posted,
        "pending_entries": entries.len() - posted,
        "depreciation_schedule": entries,
    })))
}

pub(super) fn create_asset(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    ASSET.create(desk, params)
}

pub(super) fn update_asset(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    ASSET.update(desk, params)
}

pub(super) fn delete_asset(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    ASSET.delete(desk, params)
}

fn finance_book_reply(asset: &Document, action: &str) -> Reply {
    Reply::with_message(
        json!({ "asset": asset.to_json() }),
        format!("Finance book {action} successfully"),
    )
}

fn entry_not_found() -> Error {
    Error::validation("Finance book entry not found")
}

pub(super) fn add_asset_finance_book(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let name = asset_name(params)?;
    let payload = params.object("finance_book_data")?;
    let asset = modify(desk, DocType::Asset, &name, |asset| {
        asset.append(FINANCE_BOOKS, payload).map(|_| ())
    })?;
    Ok(finance_book_reply(&asset, "added"))
}

pub(super) fn update_asset_finance_book(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let name = asset_name(params)?;
    let row_name = finance_book_name(params)?;
    let payload = params.object("finance_book_data")?;
    let asset = modify(desk, DocType::Asset, &name, |asset| {
        let row = asset
            .rows_mut(FINANCE_BOOKS)?
            .iter_mut()
            .find(|row| row.name == row_name)
            .ok_or_else(entry_not_found)?;
        row.apply(payload);
        Ok(())
    })?;
    Ok(finance_book_reply(&asset, "updated"))
}

pub(super) fn delete_asset_finance_book(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let name = asset_name(params)?;
    let row_name = finance_book_name(params)?;
    let asset = modify(desk, DocType::Asset, &name, |asset| {
        let rows = asset.rows_mut(FINANCE_BOOKS)?;
        let position = rows
            .iter()
            .position(|row| row.name == row_name)
            .ok_or_else(entry_not_found)?;
        rows.remove(position);
        Ok(())
    })?;
    Ok(finance_book_reply(&asset, "deleted"))
}

/// Distinct non-empty string values of `field` over `docs`, sorted.
fn distinct(docs: &[Document], field: &str) -> Vec<String> {
    docs.iter()
        .filter_map(|doc| doc.get_str(field))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn names(desk: &Desk<'_>, doctype: DocType) -> Result<Vec<String>> {
    let query = ListQuery::new().order_by(OrderBy::asc("name"));
    Ok(desk
        .list(doctype, query)?
        .into_iter()
        .map(|doc| doc.name)
        .collect())
}

pub(super) fn get_asset_filters(desk: &Desk<'_>, _params: &Params) -> Result<Reply> {
    let assets = desk.list(DocType::Asset, ListQuery::new())?;
    Ok(Reply::data(json!({
        "companies": names(desk, DocType::Company)?,
        "locations": distinct(&assets, "location"),
        "departments": names(desk, DocType::Department)?,
        "asset_types": distinct(&assets, "custom_asset_type"),
        "manufacturers": distinct(&assets, "custom_manufacturer"),
        "device_statuses": distinct(&assets, "custom_device_status"),
        "finance_books": names(desk, DocType::FinanceBook)?,
        "depreciation_methods": DEPRECIATION_METHODS,
    })))
}

fn tally<'a>(values: impl Iterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Fleet statistics over a set of assets.
pub(crate) fn asset_stats(assets: &[Document]) -> Value {
    let by = |field: &str| tally(assets.iter().filter_map(|doc| doc.get_str(field)));
    let schedules = || assets.iter().flat_map(|doc| doc.rows(SCHEDULES));
    let accumulated: f64 = schedules()
        .filter(|row| is_posted(row))
        .map(|row| row.fields.get("depreciation_amount").map_or(0.0, flt))
        .sum();
    let flag_count = |field: &str| {
        assets
            .iter()
            .filter(|doc| cint(&doc.value(field)) == 1)
            .count()
    };
    let by_method = tally(
        assets
            .iter()
            .flat_map(|doc| doc.rows(FINANCE_BOOKS))
            .filter_map(|row| row.get_str("depreciation_method")),
    );

    json!({
        "total_assets": assets.len(),
        "by_status": by("custom_device_status"),
        "by_company": by("company"),
        "by_type": by("custom_asset_type"),
        "total_amount": assets.iter().map(|doc| doc.get_f64("custom_total_amount")).sum::<f64>(),
        "depreciation_stats": {
            "total_gross_amount": assets.iter().map(|doc| doc.get_f64("gross_purchase_amount")).sum::<f64>(),
            "total_accumulated_depreciation": accumulated,
            "total_value_after_depreciation": assets.iter().map(|doc| doc.get_f64("value_after_depreciation")).sum::<f64>(),
            "assets_with_depreciation": flag_count("calculate_depreciation"),
            "fully_depreciated_assets": flag_count("is_fully_depreciated"),
            "pending_depreciation_entries": schedules().filter(|row| !is_posted(row)).count(),
            "by_depreciation_method": by_method,
        },
    })
}

pub(super) fn get_asset_stats(desk: &Desk<'_>, _params: &Params) -> Result<Reply> {
    let assets = desk.list(DocType::Asset, ListQuery::new())?;
    Ok(Reply::data(asset_stats(&assets)))
}

pub(super) fn search_assets(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let Some(term) = params.text("search_term") else {
        return Ok(Reply::data(json!([])));
    };
    let limit = params.usize_or("limit", 10)?;
    let pattern = format!("%{term}%");
    let any = SEARCHED
        .iter()
        .map(|field| Filter::new(*field, Operator::Like, pattern.as_str()))
        .collect::<Result<Vec<_>>>()?;
    let fields: Vec<String> = SEARCH_FIELDS.iter().map(|f| (*f).to_string()).collect();
    let found = desk.list(DocType::Asset, ListQuery::new().any_of(any).limit(limit))?;
    Ok(Reply::data(
        found.iter().map(|doc| doc.project(&fields)).collect::<Vec<_>>(),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{call, insert, site, user};
    use super::*;
    use crate::hooks::QR_FIELD;
    use crate::permission::ADMINISTRATOR;
    use crate::storage::Storage;
    use crate::store::DocumentStore;

    fn seeded() -> (Storage, Document) {
        let storage = Storage::open_in_memory().unwrap();
        let asset = insert(
            &storage,
            DocType::Asset,
            json!({
                "asset_name": "Infusion Pump",
                "company": "Corp1",
                "location": "North Wing",
                "custom_serial_number": "SN-778",
                "custom_device_status": "Working",
                "custom_asset_type": "Medical",
                "gross_purchase_amount": 12000,
                "value_after_depreciation": 9000,
                "calculate_depreciation": 1,
                "finance_books": [
                    {"finance_book": "Main", "depreciation_method": "Straight Line"}
                ],
                "schedules": [
                    {"schedule_date": "2025-06-30", "depreciation_amount": 1000, "finance_book": "Main"},
                    {"schedule_date": "2025-03-31", "depreciation_amount": 2000, "journal_entry": "JE-1", "finance_book": "Main"},
                    {"schedule_date": "2025-09-30", "depreciation_amount": 500, "finance_book": "Tax"}
                ]
            }),
        );
        (storage, asset)
    }

    #[test]
    fn test_get_assets_with_finance_books() {
        let (storage, asset) = seeded();
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let data = call(&desk, "get_assets", json!({"limit": "1"})).unwrap().data;
        assert_eq!(data["total_count"], json!(1));
        assert_eq!(data["has_more"], json!(false));
        let row = &data["assets"][0];
        assert_eq!(row["name"], json!(asset.name));
        assert_eq!(row["custom_model"], Value::Null);
        assert_eq!(row["finance_books"][0]["finance_book"], json!("Main"));
        assert!(row.get("schedules").is_none());

        let data = call(
            &desk,
            "get_assets",
            json!({"fields": "[\"asset_name\"]", "include_finance_books": "0"}),
        )
        .unwrap()
        .data;
        assert_eq!(data["assets"][0], json!({"asset_name": "Infusion Pump"}));
    }

    #[test]
    fn test_get_asset_details_summary() {
        let (storage, asset) = seeded();
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let data = call(
            &desk,
            "get_asset_details",
            json!({"asset_name": asset.name, "include_depreciation_schedule": true}),
        )
        .unwrap()
        .data;
        let summary = &data["depreciation_summary"];
        assert_eq!(summary["total_depreciation_booked"], json!(2000.0));
        assert_eq!(summary["pending_depreciation_entries"], json!(2));
        assert_eq!(summary["completed_depreciation_entries"], json!(1));
        assert_eq!(summary["gross_purchase_amount"], json!(12000.0));
        assert_eq!(
            data["depreciation_schedule"][0]["schedule_date"],
            json!("2025-03-31")
        );
    }

    #[test]
    fn test_get_asset_details_requires_name() {
        let (storage, _) = seeded();
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();
        let err = call(&desk, "get_asset_details", json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Asset name is required");
    }

    #[test]
    fn test_depreciation_schedule_by_book() {
        let (storage, asset) = seeded();
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let data = call(
            &desk,
            "get_asset_depreciation_schedule",
            json!({"asset_name": asset.name, "finance_book": "Main"}),
        )
        .unwrap()
        .data;
        assert_eq!(data["total_entries"], json!(2));
        assert_eq!(data["posted_entries"], json!(1));
        assert_eq!(data["pending_entries"], json!(1));
        assert_eq!(data["depreciation_schedule"][0]["status"], json!("Posted"));
        assert_eq!(data["depreciation_schedule"][1]["status"], json!("Pending"));
    }

    #[test]
    fn test_create_update_delete_asset() {
        let storage = Storage::open_in_memory().unwrap();
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let reply = call(
            &desk,
            "create_asset",
            json!({"asset_data": "{\"asset_name\": \"Monitor\", \"company\": \"Corp1\"}"}),
        )
        .unwrap();
        assert_eq!(reply.message.as_deref(), Some("Asset created successfully"));
        let name = reply.data["asset"]["name"].as_str().unwrap().to_string();
        assert!(name.starts_with("ACC-ASS-"));
        assert!(reply.data["asset"][QR_FIELD].is_string());

        let reply = call(
            &desk,
            "update_asset",
            json!({
                "asset_name": name,
                "asset_data": {"location": "ICU", "finance_books": [{"finance_book": "Tax"}]}
            }),
        )
        .unwrap();
        assert_eq!(reply.message.as_deref(), Some("Asset updated successfully"));
        assert_eq!(reply.data["asset"]["location"], json!("ICU"));
        assert_eq!(reply.data["asset"]["finance_books"][0]["finance_book"], json!("Tax"));

        let reply = call(&desk, "delete_asset", json!({"asset_name": name})).unwrap();
        assert_eq!(reply.message.as_deref(), Some("Asset deleted successfully"));
        assert!(storage.get(DocType::Asset, &name).unwrap().is_none());
    }

    #[test]
    fn test_finance_book_rows() {
        let (storage, asset) = seeded();
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let reply = call(
            &desk,
            "add_asset_finance_book",
            json!({"asset_name": asset.name, "finance_book_data": {"finance_book": "Tax"}}),
        )
        .unwrap();
        assert_eq!(reply.message.as_deref(), Some("Finance book added successfully"));
        let books = reply.data["asset"]["finance_books"].as_array().unwrap().clone();
        assert_eq!(books.len(), 2);
        let row_name = books[1]["name"].as_str().unwrap().to_string();

        let reply = call(
            &desk,
            "update_asset_finance_book",
            json!({
                "asset_name": asset.name,
                "finance_book_name": row_name,
                "finance_book_data": {"rate_of_depreciation": 20}
            }),
        )
        .unwrap();
        assert_eq!(
            reply.data["asset"]["finance_books"][1]["rate_of_depreciation"],
            json!(20)
        );

        let err = call(
            &desk,
            "delete_asset_finance_book",
            json!({"asset_name": asset.name, "finance_book_name": "missing"}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Finance book entry not found");

        call(
            &desk,
            "delete_asset_finance_book",
            json!({"asset_name": asset.name, "finance_book_name": row_name}),
        )
        .unwrap();
        let data = call(&desk, "get_asset_finance_books", json!({"asset_name": asset.name}))
            .unwrap()
            .data;
        assert_eq!(data["count"], json!(1));
    }

    #[test]
    fn test_asset_filters_and_stats() {
        let (storage, _) = seeded();
        insert(&storage, DocType::Company, json!({"company_name": "Corp1"}));
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let data = call(&desk, "get_asset_filters", json!({})).unwrap().data;
        assert_eq!(data["companies"], json!(["Corp1"]));
        assert_eq!(data["locations"], json!(["North Wing"]));
        assert_eq!(data["depreciation_methods"].as_array().unwrap().len(), 4);

        let data = call(&desk, "get_asset_stats", json!({})).unwrap().data;
        assert_eq!(data["total_assets"], json!(1));
        assert_eq!(data["by_status"], json!({"Working": 1}));
        let stats = &data["depreciation_stats"];
        assert_eq!(stats["total_accumulated_depreciation"], json!(2000.0));
        assert_eq!(stats["assets_with_depreciation"], json!(1));
        assert_eq!(stats["pending_depreciation_entries"], json!(2));
        assert_eq!(stats["by_depreciation_method"], json!({"Straight Line": 1}));
    }

    #[test]
    fn test_search_assets() {
        let (storage, asset) = seeded();
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let data = call(&desk, "search_assets", json!({"search_term": "SN-7"})).unwrap().data;
        assert_eq!(data[0]["name"], json!(asset.name));
        let data = call(&desk, "search_assets", json!({"search_term": "nothing"})).unwrap().data;
        assert_eq!(data, json!([]));
        let data = call(&desk, "search_assets", json!({"search_term": ""})).unwrap().data;
        assert_eq!(data, json!([]));
    }

    #[test]
    fn test_scoped_user_sees_only_granted_company() {
        let (storage, _) = seeded();
        insert(&storage, DocType::Asset, json!({"asset_name": "Other", "company": "Corp2"}));
        user(&storage, "tech@example.com", &["Maintenance User"]);
        insert(
            &storage,
            DocType::UserPermission,
            json!({"user": "tech@example.com", "allow": "Company", "for_value": "Corp2"}),
        );
        let site = site();
        let desk = Desk::open(&storage, &site, "tech@example.com").unwrap();

        let data = call(&desk, "get_assets", json!({})).unwrap().data;
        assert_eq!(data["total_count"], json!(1));
        assert_eq!(data["assets"][0]["asset_name"], json!("Other"));

        let err = call(&desk, "create_asset", json!({"asset_data": {"asset_name": "X"}})).unwrap_err();
        assert!(err.is_permission_error());
    }
}
