//! UI string translations.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use crate::doctype::DocType;
use crate::error::Result;
use crate::service::Desk;
use crate::store::{Filter, ListQuery, OrderBy};

use super::{Params, Reply};

const ENGLISH: &str = "en";

pub(super) fn get_translations(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let language = params
        .text("language")
        .unwrap_or_else(|| desk.site().default_language.clone());
    let query = ListQuery::new()
        .filter(Filter::eq("language", language.as_str()))
        .order_by(OrderBy::asc("creation"));
    let translations: BTreeMap<String, String> = desk
        .list(DocType::Translation, query)?
        .iter()
        .filter_map(|doc| {
            let source = doc.get_str("source_text").filter(|s| !s.is_empty())?;
            let translated = doc.get_str("translated_text").filter(|s| !s.is_empty())?;
            Some((source.to_string(), translated.to_string()))
        })
        .collect();
    Ok(Reply::data(json!({
        "language": language,
        "count": translations.len(),
        "translations": translations,
    })))
}

pub(super) fn get_available_languages(desk: &Desk<'_>, _params: &Params) -> Result<Reply> {
    let found: BTreeSet<String> = desk
        .list(DocType::Translation, ListQuery::new())?
        .iter()
        .filter_map(|doc| doc.get_str("language"))
        .filter(|language| !language.is_empty() && *language != ENGLISH)
        .map(str::to_string)
        .collect();
    let languages: Vec<String> = std::iter::once(ENGLISH.to_string()).chain(found).collect();
    Ok(Reply::data(json!({ "languages": languages })))
}

pub(super) fn get_translation(desk: &Desk<'_>, params: &Params) -> Result<Reply> {
    let source_text = params.require("source_text", "source_text")?;
    let language = params.text("language").unwrap_or_else(|| "ar".to_string());
    let query = ListQuery::new()
        .filter(Filter::eq("language", language.as_str()))
        .filter(Filter::eq("source_text", source_text.as_str()))
        .limit(1);
    let translated = desk
        .list(DocType::Translation, query)?
        .into_iter()
        .find_map(|doc| doc.get_str("translated_text").filter(|s| !s.is_empty()).map(str::to_string));
    Ok(Reply::data(json!({
        "found": translated.is_some(),
        "translated_text": translated.as_deref().unwrap_or(&source_text),
        "source_text": source_text,
    })))
}
