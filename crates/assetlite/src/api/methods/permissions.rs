//! Permission resolver queries.
//!
//! Each method answers for the `user` parameter, defaulting to the session
//! user. Only administrators may ask about someone else.

use serde::Serialize;

use crate::doctype::DocType;
use crate::error::{Error, Result};
use crate::service::Desk;

use super::{Params, Reply};

fn subject(desk: &Desk<'_>, params: &Params) -> Result<String> {
    match params.text("user") {
        Some(user) if user != desk.user() && !desk.session().is_admin() => Err(
            Error::permission_denied("Not permitted to view permissions of other users"),
        ),
        Some(user) => Ok(user),
        None => Ok(desk.user().to_string()),
    }
}

fn reply(value: impl Serialize) -> Result<Reply> {
    Ok(Reply::data(serde_json::to_value(value)?))
}

pub(super) fn get_user_permissions(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let user = subject(desk, params)?;
    reply(desk.resolver().user_permissions(&user)?)
}

pub(super) fn get_permission_filters(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let target = params.require("target_doctype", "target_doctype")?;
    let user = subject(desk, params)?;
    reply(desk.resolver().permission_filters(&target, &user)?)
}

pub(super) fn get_allowed_values(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let category = params.require("allow_doctype", "allow_doctype")?;
    let user = subject(desk, params)?;
    reply(desk.resolver().allowed_values(&category, &user)?)
}

pub(super) fn check_document_access(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let doctype: DocType = params.require("doctype", "doctype")?.parse()?;
    let name = params.require("docname", "docname")?;
    let user = subject(desk, params)?;
    reply(desk.resolver().check_document_access(doctype, &name, &user)?)
}

pub(super) fn get_configured_doctypes(desk: &Desk<'_>, _params: &Params) -> Result<Reply> {
    reply(desk.resolver().configured_doctypes())
}

pub(super) fn get_user_defaults(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let user = subject(desk, params)?;
    reply(desk.resolver().user_defaults(&user)?)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{call, insert, site, user};
    use super::*;
    use crate::permission::ADMINISTRATOR;
    use crate::storage::Storage;
    use serde_json::json;

    fn storage() -> Storage {
        let storage = Storage::open_in_memory().unwrap();
        user(&storage, "tech@example.com", &["Maintenance User"]);
        insert(
            &storage,
            DocType::UserPermission,
            json!({"user": "tech@example.com", "allow": "Company", "for_value": "Corp1", "is_default": 1}),
        );
        storage
    }

    #[test]
    fn test_filters_for_session_user() {
        let storage = storage();
        let site = site();
        let desk = Desk::open(&storage, &site, "tech@example.com").unwrap();

        let data = call(&desk, "get_permission_filters", json!({"target_doctype": "Asset"}))
            .unwrap()
            .data;
        assert_eq!(data["filters"], json!({"company": ["in", ["Corp1"]]}));
        assert_eq!(data["is_admin"], json!(false));
        assert_eq!(data["user"], json!("tech@example.com"));

        let data = call(&desk, "get_user_defaults", json!({})).unwrap().data;
        assert_eq!(data["defaults"], json!({"Company": "Corp1"}));

        let data = call(&desk, "get_allowed_values", json!({"allow_doctype": "Company"}))
            .unwrap()
            .data;
        assert_eq!(data["allowed_values"], json!(["Corp1"]));
        assert_eq!(data["default_value"], json!("Corp1"));
    }

    #[test]
    fn test_other_users_need_admin() {
        let storage = storage();
        let site = site();
        let desk = Desk::open(&storage, &site, "tech@example.com").unwrap();
        let err = call(&desk, "get_user_permissions", json!({"user": ADMINISTRATOR})).unwrap_err();
        assert!(err.is_permission_error());

        let desk = Desk::open(&storage, &site, ADMINISTRATOR).unwrap();
        let data = call(&desk, "get_user_permissions", json!({"user": "tech@example.com"}))
            .unwrap()
            .data;
        assert_eq!(data["total_permissions"], json!(1));
    }

    #[test]
    fn test_check_document_access() {
        let storage = storage();
        let allowed = insert(&storage, DocType::Asset, json!({"company": "Corp1"}));
        let denied = insert(&storage, DocType::Asset, json!({"company": "Corp2"}));
        let site = site();
        let desk = Desk::open(&storage, &site, "tech@example.com").unwrap();

        let data = call(
            &desk,
            "check_document_access",
            json!({"doctype": "Asset", "docname": allowed.name}),
        )
        .unwrap()
        .data;
        assert_eq!(data["has_access"], json!(true));

        let data = call(
            &desk,
            "check_document_access",
            json!({"doctype": "Asset", "docname": denied.name}),
        )
        .unwrap()
        .data;
        assert_eq!(data["has_access"], json!(false));
        assert_eq!(data["denied_by"], json!("Company"));

        let err = call(
            &desk,
            "check_document_access",
            json!({"doctype": "Spaceship", "docname": "X"}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Unknown DocType: Spaceship");
    }

    #[test]
    fn test_configured_doctypes() {
        let storage = storage();
        let site = site();
        let desk = Desk::open(&storage, &site, "Guest").unwrap();
        let data = call(&desk, "get_configured_doctypes", json!({})).unwrap().data;
        assert_eq!(data["doctypes"][0], json!("Asset"));
        assert!(data["mappings"]["Work_Order"]
            .as_array()
            .unwrap()
            .contains(&json!("Location")));
    }
}
