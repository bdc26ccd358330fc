//! Whitelisted methods and their dispatch table.
//!
//! A method is called by name; a fully qualified name such as
//! `asset_lite.api.asset_api.get_assets` dispatches on its last segment.

mod assets;
mod dashboard;
mod maintenance_logs;
mod permissions;
mod ppm;
mod records;
mod translations;
mod work_orders;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::doctype::DocType;
use crate::document::{Document, Fields};
use crate::error::{Error, Result};
use crate::permission::Ptype;
use crate::service::Desk;
use crate::store::{DocumentStore, Filter, ListQuery, OrderBy};

use super::envelope::Reply;
use super::params::Params;

type Handler = fn(&Desk<'_>, &Params) -> Result<Reply>;

/// What a failed call returns as `data`.
#[derive(Clone, Copy)]
enum Empty {
    Nothing,
    /// `{key: [], total_count: 0}`
    List(&'static str),
    /// `{key: {}}`
    Map(&'static str),
    /// Built from the call's parameters.
    With(fn(&Params) -> Value),
}

/// One whitelisted method.
#[derive(Clone, Copy)]
pub struct Method {
    name: &'static str,
    handler: Handler,
    empty: Empty,
}

impl Method {
    const fn new(name: &'static str, handler: Handler) -> Self {
        Self {
            name,
            handler,
            empty: Empty::Nothing,
        }
    }

    const fn listing(name: &'static str, handler: Handler, key: &'static str) -> Self {
        Self {
            name,
            handler,
            empty: Empty::List(key),
        }
    }

    const fn or_empty(name: &'static str, handler: Handler, empty: Empty) -> Self {
        Self {
            name,
            handler,
            empty,
        }
    }

    /// Short method name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the method.
    ///
    /// # Errors
    ///
    /// Returns whatever the method fails with.
    pub fn call(&self, desk: &Desk<'_>, params: &Params) -> Result<Reply> {
        debug!("{} calling {}", desk.user(), self.name);
        (self.handler)(desk, params)
    }

    /// Data returned alongside a failure.
    #[must_use]
    pub fn empty_result(&self, params: &Params) -> Option<Value> {
        match self.empty {
            Empty::Nothing => None,
            Empty::List(key) => Some(json!({ key: [], "total_count": 0 })),
            Empty::Map(key) => Some(json!({ key: {} })),
            Empty::With(build) => Some(build(params)),
        }
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish_non_exhaustive()
    }
}

const METHODS: &[Method] = &[
    Method::new("ping", ping),
    // assets
    Method::listing("get_assets", assets::get_assets, "assets"),
    Method::new("get_asset_details", assets::get_asset_details),
    Method::new("get_asset_finance_books", assets::get_asset_finance_books),
    Method::new(
        "get_asset_depreciation_schedule",
        assets::get_asset_depreciation_schedule,
    ),
    Method::new("create_asset", assets::create_asset),
    Method::new("update_asset", assets::update_asset),
    Method::new("delete_asset", assets::delete_asset),
    Method::new("add_asset_finance_book", assets::add_asset_finance_book),
    Method::new("update_asset_finance_book", assets::update_asset_finance_book),
    Method::new("delete_asset_finance_book", assets::delete_asset_finance_book),
    Method::new("get_asset_filters", assets::get_asset_filters),
    Method::new("get_asset_stats", assets::get_asset_stats),
    Method::or_empty(
        "search_assets",
        assets::search_assets,
        Empty::With(|_| json!([])),
    ),
    // work orders
    Method::listing("get_work_orders", work_orders::get_work_orders, "work_orders"),
    Method::new("get_work_order_details", work_orders::get_work_order_details),
    Method::new("create_work_order", work_orders::create_work_order),
    Method::new("update_work_order", work_orders::update_work_order),
    Method::new("delete_work_order", work_orders::delete_work_order),
    Method::new(
        "update_work_order_status",
        work_orders::update_work_order_status,
    ),
    // maintenance logs
    Method::listing(
        "get_asset_maintenance_logs",
        maintenance_logs::get_asset_maintenance_logs,
        "asset_maintenance_logs",
    ),
    Method::new(
        "get_asset_maintenance_log_details",
        maintenance_logs::get_asset_maintenance_log_details,
    ),
    Method::new(
        "create_asset_maintenance_log",
        maintenance_logs::create_asset_maintenance_log,
    ),
    Method::new(
        "update_asset_maintenance_log",
        maintenance_logs::update_asset_maintenance_log,
    ),
    Method::new(
        "delete_asset_maintenance_log",
        maintenance_logs::delete_asset_maintenance_log,
    ),
    Method::new(
        "update_maintenance_status",
        maintenance_logs::update_maintenance_status,
    ),
    Method::listing(
        "get_maintenance_logs_by_asset",
        maintenance_logs::get_maintenance_logs_by_asset,
        "asset_maintenance_logs",
    ),
    Method::listing(
        "get_overdue_maintenance_logs",
        maintenance_logs::get_overdue_maintenance_logs,
        "asset_maintenance_logs",
    ),
    // ppm
    Method::listing(
        "get_asset_maintenances",
        ppm::get_asset_maintenances,
        "asset_maintenances",
    ),
    Method::new(
        "get_asset_maintenance_details",
        ppm::get_asset_maintenance_details,
    ),
    Method::new("create_asset_maintenance", ppm::create_asset_maintenance),
    Method::new("update_asset_maintenance", ppm::update_asset_maintenance),
    Method::new("delete_asset_maintenance", ppm::delete_asset_maintenance),
    Method::listing(
        "get_maintenance_tasks",
        ppm::get_maintenance_tasks,
        "maintenance_tasks",
    ),
    Method::listing(
        "get_service_coverage",
        ppm::get_service_coverage,
        "service_coverage",
    ),
    Method::new("add_maintenance_task", ppm::add_maintenance_task),
    Method::new("update_maintenance_task", ppm::update_maintenance_task),
    Method::listing(
        "get_maintenances_by_asset",
        ppm::get_maintenances_by_asset,
        "asset_maintenances",
    ),
    Method::listing(
        "get_active_service_contracts",
        ppm::get_active_service_contracts,
        "asset_maintenances",
    ),
    // permissions
    Method::new("get_user_permissions", permissions::get_user_permissions),
    Method::new("get_permission_filters", permissions::get_permission_filters),
    Method::new("get_allowed_values", permissions::get_allowed_values),
    Method::new("check_document_access", permissions::check_document_access),
    Method::new("get_configured_doctypes", permissions::get_configured_doctypes),
    Method::new("get_user_defaults", permissions::get_user_defaults),
    // dashboard
    Method::new("get_number_cards", dashboard::get_number_cards),
    Method::or_empty(
        "get_active_map_data",
        dashboard::get_active_map_data,
        Empty::With(|_| json!([])),
    ),
    Method::new("list_dashboard_charts", dashboard::list_dashboard_charts),
    Method::new("get_dashboard_chart_data", dashboard::get_dashboard_chart_data),
    Method::new("run_report", dashboard::run_report),
    // translations
    Method::or_empty(
        "get_translations",
        translations::get_translations,
        Empty::Map("translations"),
    ),
    Method::or_empty(
        "get_available_languages",
        translations::get_available_languages,
        Empty::With(|_| json!({"languages": ["en"]})),
    ),
    Method::or_empty(
        "get_translation",
        translations::get_translation,
        Empty::With(|params| json!({"translated_text": params.text("source_text")})),
    ),
    // generic
    Method::listing("get_doctype_records", records::get_doctype_records, "records"),
    Method::new("get_user_details", records::get_user_details),
];

/// Every whitelisted method.
#[must_use]
pub fn all() -> &'static [Method] {
    METHODS
}

/// Look up a method by its short or fully qualified name.
///
/// # Errors
///
/// Returns [`Error::UnknownMethod`] if there is none.
pub fn resolve(name: &str) -> Result<&'static Method> {
    let short = name.rsplit('.').next().unwrap_or(name);
    METHODS
        .iter()
        .find(|method| method.name == short)
        .ok_or_else(|| Error::UnknownMethod(name.to_string()))
}

fn ping(_desk: &Desk<'_>, _params: &Params) -> Result<Reply> {
    Ok(Reply::data("pong"))
}

/// A page of documents plus its totals.
pub(crate) struct Page {
    docs: Vec<Document>,
    total_count: usize,
    limit: usize,
    offset: usize,
}

impl Page {
    /// Fetch a page the session may read. A `limit` of 0 means everything.
    pub(crate) fn fetch(
        desk: &Desk<'_>,
        doctype: DocType,
        filters: Vec<Filter>,
        order_by: OrderBy,
        limit: usize,
        offset: usize,
    ) -> Result<Self> {
        let total_count = desk.count(doctype, &filters)?;
        let mut query = ListQuery::new()
            .filters(filters)
            .order_by(order_by)
            .offset(offset);
        if limit > 0 {
            query = query.limit(limit);
        }
        let docs = desk.list(doctype, query)?;
        Ok(Self {
            docs,
            total_count,
            limit,
            offset,
        })
    }

    /// Fetch using the `filters`, `limit` and `offset` parameters on top of
    /// fixed filters.
    pub(crate) fn from_params(
        desk: &Desk<'_>,
        params: &Params,
        doctype: DocType,
        mut fixed: Vec<Filter>,
        order_by: OrderBy,
    ) -> Result<Self> {
        fixed.extend(params.filters()?);
        let limit = params.usize_or("limit", 20)?;
        let offset = params.usize_or("offset", 0)?;
        Self::fetch(desk, doctype, fixed, order_by, limit, offset)
    }

    pub(crate) fn docs(&self) -> &[Document] {
        &self.docs
    }

    /// `{key: rows, total_count, limit, offset, has_more}`.
    pub(crate) fn render(&self, key: &str, row: impl Fn(&Document) -> Value) -> Value {
        let has_more = self.limit > 0 && self.offset + self.limit < self.total_count;
        json!({
            key: self.docs.iter().map(row).collect::<Vec<_>>(),
            "total_count": self.total_count,
            "limit": self.limit,
            "offset": self.offset,
            "has_more": has_more,
        })
    }
}

/// Projection to use: the requested fields, else the endpoint default.
/// An empty default selects whole documents.
pub(crate) fn projection(params: &Params, default: &[&str]) -> Result<Vec<String>> {
    Ok(params
        .fields()?
        .unwrap_or_else(|| default.iter().map(|f| (*f).to_string()).collect()))
}

/// Load a document for writing, change it and save it with its hooks.
pub(crate) fn modify(
    desk: &Desk<'_>,
    doctype: DocType,
    name: &str,
    change: impl FnOnce(&mut Document) -> Result<()>,
) -> Result<Document> {
    desk.check(doctype, Ptype::Write, Some(name))?;
    let mut doc = desk.storage().get_doc(doctype, name)?;
    change(&mut doc)?;
    desk.save(doc)
}

/// A top-level entity served with the standard CRUD methods.
pub(crate) struct Entity {
    pub doctype: DocType,
    /// Display label used in messages.
    pub label: &'static str,
    /// Key of a single document in mutation replies.
    pub singular: &'static str,
    /// Key of the rows in listings.
    pub plural: &'static str,
    /// Parameter naming the document.
    pub name_param: &'static str,
    /// Parameter carrying the payload.
    pub data_param: &'static str,
    /// Listing projection.
    pub default_fields: &'static [&'static str],
}

impl Entity {
    fn name(&self, params: &Params) -> Result<String> {
        params.require(self.name_param, &format!("{} name", self.label))
    }

    fn wrap(&self, doc: &Document) -> Value {
        let mut out = Map::new();
        out.insert(self.singular.to_string(), doc.to_json());
        Value::Object(out)
    }

    pub(crate) fn list(&self, desk: &Desk<'_>, params: &Params) -> Result<Reply> {
        let fields = projection(params, self.default_fields)?;
        let page = Page::from_params(desk, params, self.doctype, Vec::new(), params.order_by()?)?;
        Ok(Reply::data(page.render(self.plural, |doc| doc.project(&fields))))
    }

    pub(crate) fn details(&self, desk: &Desk<'_>, params: &Params) -> Result<Reply> {
        let name = self.name(params)?;
        Ok(Reply::data(desk.get(self.doctype, &name)?.to_json()))
    }

    pub(crate) fn create(&self, desk: &Desk<'_>, params: &Params) -> Result<Reply> {
        let payload = params.object(self.data_param)?;
        let doc = desk.insert(Document::from_fields(self.doctype, payload)?)?;
        Ok(Reply::with_message(
            self.wrap(&doc),
            format!("{} created successfully", self.label),
        ))
    }

    pub(crate) fn update(&self, desk: &Desk<'_>, params: &Params) -> Result<Reply> {
        let name = self.name(params)?;
        let payload = params.object(self.data_param)?;
        let doc = modify(desk, self.doctype, &name, |doc| doc.apply(payload))?;
        Ok(Reply::with_message(
            self.wrap(&doc),
            format!("{} updated successfully", self.label),
        ))
    }

    pub(crate) fn delete(&self, desk: &Desk<'_>, params: &Params) -> Result<Reply> {
        let name = self.name(params)?;
        desk.delete(self.doctype, &name)?;
        Ok(Reply::message(format!("{} deleted successfully", self.label)))
    }

    /// Set whichever of `fields` were given; at least one must be.
    pub(crate) fn set_status(
        &self,
        desk: &Desk<'_>,
        params: &Params,
        fields: &[&str],
    ) -> Result<Reply> {
        let name = self.name(params)?;
        let updates: Fields = fields
            .iter()
            .filter_map(|field| params.text(field).map(|v| ((*field).to_string(), Value::from(v))))
            .collect();
        if updates.is_empty() {
            return Err(Error::missing(fields.join(" or ")));
        }
        let doc = modify(desk, self.doctype, &name, |doc| doc.apply(updates))?;
        Ok(Reply::with_message(
            self.wrap(&doc),
            format!("{} status updated successfully", self.label),
        ))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{call, insert, site};
    use super::*;
    use crate::permission::ADMINISTRATOR;
    use crate::storage::Storage;

    #[test]
    fn test_resolve_short_and_qualified_names() {
        assert_eq!(resolve("get_assets").unwrap().name(), "get_assets");
        assert_eq!(
            resolve("asset_lite.api.asset_api.get_assets").unwrap().name(),
            "get_assets"
        );
        let err = resolve("asset_lite.api.nothing").unwrap_err();
        assert_eq!(err.to_string(), "Unknown method: asset_lite.api.nothing");
    }

    #[test]
    fn test_method_names_are_unique() {
        let mut names: Vec<_> = all().iter().map(Method::name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn test_empty_results() {
        let params = Params::from_value(json!({"source_text": "Asset"}));
        assert_eq!(
            resolve("get_work_orders").unwrap().empty_result(&params),
            Some(json!({"work_orders": [], "total_count": 0}))
        );
        assert_eq!(
            resolve("get_translation").unwrap().empty_result(&params),
            Some(json!({"translated_text": "Asset"}))
        );
        assert_eq!(resolve("create_asset").unwrap().empty_result(&params), None);
    }

    #[test]
    fn test_ping() {
        let storage = Storage::open_in_memory().unwrap();
        let site = site();
        let desk = Desk::open(&storage, &site, "Guest").unwrap();
        assert_eq!(call(&desk, "ping", json!({})).unwrap().data, json!("pong"));
    }

    #[test]
    fn test_page_render_has_more() {
        let storage = Storage::open_in_memory().unwrap();
        for n in 0..5 {
            insert(&storage, DocType::Location, json!({"location_name": format!("Site {n}")}));
        }
        let site = site();
        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();

        let page = Page::fetch(&desk, DocType::Location, Vec::new(), OrderBy::default(), 2, 2).unwrap();
        let value = page.render("locations", |doc| Value::from(doc.name.clone()));
        assert_eq!(value["total_count"], json!(5));
        assert_eq!(value["locations"].as_array().unwrap().len(), 2);
        assert_eq!(value["has_more"], json!(true));

        let page = Page::fetch(&desk, DocType::Location, Vec::new(), OrderBy::default(), 0, 0).unwrap();
        let value = page.render("locations", |doc| Value::from(doc.name.clone()));
        assert_eq!(value["locations"].as_array().unwrap().len(), 5);
        assert_eq!(value["has_more"], json!(false));
    }
}
