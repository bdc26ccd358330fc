//! QR code attachment for assets.

use std::io::Cursor;

use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use serde_json::Value;
use tracing::{debug, info};

use crate::doctype::DocType;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::store::{DocumentStore, Filter, ListQuery};

use super::DocumentHook;

/// Asset field holding the QR image URL.
pub const QR_FIELD: &str = "custom_attach_image";

/// Pixels per QR module.
const MODULE_SIZE: u32 = 8;

/// Attaches a QR code linking to the asset's detail page.
#[derive(Debug, Clone)]
pub struct AssetQrCode {
    site_url: String,
}

impl AssetQrCode {
    /// Hook building links under `site_url`.
    #[must_use]
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Deep link encoded in the code.
    #[must_use]
    pub fn asset_url(&self, name: &str) -> String {
        format!("{}/app/asset/{}", self.site_url, urlencoding::encode(name))
    }

    /// Render `data` as a PNG QR code.
    ///
    /// # Errors
    ///
    /// Returns an error if the data does not fit a QR code or PNG encoding fails.
    pub fn render_png(data: &str) -> Result<Vec<u8>> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)?;
        let image = code
            .render::<Luma<u8>>()
            .module_dimensions(MODULE_SIZE, MODULE_SIZE)
            .quiet_zone(true)
            .build();

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }

    fn attachment_filters(name: &str) -> Vec<Filter> {
        vec![
            Filter::eq("attached_to_doctype", DocType::Asset.as_str()),
            Filter::eq("attached_to_name", name),
            Filter::eq("attached_to_field", QR_FIELD),
        ]
    }
}

impl DocumentHook for AssetQrCode {
    fn name(&self) -> &'static str {
        "asset_qr_code"
    }

    fn after_save(&self, store: &dyn DocumentStore, doc: &Document, user: &str) -> Result<()> {
        if doc.name.is_empty() {
            return Err(Error::validation("Document name is required."));
        }
        if store.exists(DocType::File, &Self::attachment_filters(&doc.name))? {
            debug!("Asset {} already has a QR code", doc.name);
            return Ok(());
        }

        let url = self.asset_url(&doc.name);
        let png = Self::render_png(&url)?;
        let size = png.len();
        let content_hash = store.put_file_content(&png)?;

        let file_name = format!("{}-qr.png", doc.name);
        let file_url = format!("/files/{file_name}");
        let mut file = Document::new(DocType::File);
        file.set("file_name", file_name);
        file.set("file_url", file_url.clone());
        file.set("attached_to_doctype", DocType::Asset.as_str());
        file.set("attached_to_name", doc.name.clone());
        file.set("attached_to_field", QR_FIELD);
        file.set("is_private", 0);
        file.set("content_hash", content_hash);
        file.set("file_size", size);
        store.insert(file, user)?;

        store.set_value(DocType::Asset, &doc.name, QR_FIELD, Value::from(file_url))?;
        info!("Generated QR code for asset {}", doc.name);
        Ok(())
    }
}

/// Look up a public file by name.
///
/// # Errors
///
/// Returns an error if the store fails.
pub(crate) fn find_public_file(store: &dyn DocumentStore, file_name: &str) -> Result<Option<Document>> {
    store.first(
        DocType::File,
        ListQuery::new()
            .filter(Filter::eq("file_name", file_name))
            .filter(Filter::eq("is_private", 0)),
    )
}
