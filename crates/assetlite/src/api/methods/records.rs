//! Generic record listing and the session user's profile.

use serde_json::json;

use crate::doctype::DocType;
use crate::error::{Error, Result};
use crate::permission::{stored_roles, Ptype, Session};
use crate::service::Desk;
use crate::store::{DocumentStore, OrderBy};

use super::{projection, Page, Params, Reply};

pub(super) fn get_doctype_records(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let doctype: DocType = params.require("doctype", "doctype")?.parse()?;
    if doctype.is_child() {
        return Err(Error::invalid_parameter(
            "doctype",
            format!("{doctype} rows are only listed through their parent"),
        ));
    }
    let fields = projection(params, &[])?;
    let page = Page::from_params(desk, params, doctype, Vec::new(), OrderBy::default())?;
    Ok(Reply::data(page.render("records", |doc| doc.project(&fields))))
}

pub(super) fn get_user_details(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    if desk.session().is_guest() {
        return Err(Error::permission_denied("Not permitted for Guest"));
    }
    let user_id = params
        .text("user_id")
        .unwrap_or_else(|| desk.user().to_string());
    if user_id != desk.user() {
        desk.check(DocType::User, Ptype::Read, Some(&user_id))?;
    }
    let storage = desk.storage();
    let user = storage.get_doc(DocType::User, &user_id)?;
    let home_page = Session::load(storage, &user_id)?.home_page(&desk.site().home_pages);
    Ok(Reply::data(json!({
        "user_id": user_id,
        "full_name": user.value("full_name"),
        "email": user.value("email"),
        "user_image": user.value("user_image"),
        "roles": stored_roles(storage, &user.name)?,
        "last_login": user.value("last_login"),
        "enabled": user.value("enabled"),
        "creation": user.creation,
        "modified": user.modified,
        "home_page": home_page,
    })))
}
