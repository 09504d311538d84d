//! Item images and detail documents in the object store
//!
//! Object keys always start with the owner's id so the bucket policies can
//! scope access: `{owner}/items/{item}.{ext}` for images and
//! `{owner}/items/{item}/detail.html` for detail documents.

use bytes::Bytes;
use std::path::Path;
use uuid::Uuid;
use wardrobe_storage::FileOptions;

use crate::error::{storage_error, Error, Result};
use crate::session::AuthContext;
use crate::Wardrobe;

const CACHE_CONTROL_SECS: &str = "3600";
const DETAIL_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// A file picked for upload
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(file_name: &str, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: guess_content_type(file_name).map(str::to_string),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| Error::validation(format!("not a file: {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(&file_name, bytes))
    }

    /// Text after the last `.` of the file name
    pub fn extension(&self) -> &str {
        file_extension(&self.file_name)
    }
}

pub fn file_extension(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or(file_name)
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    match file_extension(file_name).to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "avif" => Some("image/avif"),
        "html" | "htm" => Some("text/html"),
        _ => None,
    }
}

pub fn image_path(owner_id: Uuid, item_id: Uuid, file_name: &str) -> String {
    format!("{}/items/{}.{}", owner_id, item_id, file_extension(file_name))
}

pub fn detail_path(owner_id: Uuid, item_id: Uuid) -> String {
    format!("{}/items/{}/detail.html", owner_id, item_id)
}

/// Storage operations on the configured bucket
pub struct Media<'a> {
    wardrobe: &'a Wardrobe,
}

impl<'a> Media<'a> {
    pub(crate) fn new(wardrobe: &'a Wardrobe) -> Self {
        Self { wardrobe }
    }

    /// Upload (or replace) an item's image; returns the object key
    pub async fn upload_image(
        &self,
        ctx: &AuthContext,
        item_id: Uuid,
        upload: &Upload,
    ) -> Result<String> {
        let path = image_path(ctx.owner_id, item_id, &upload.file_name);
        let mut options = FileOptions::new()
            .with_cache_control(CACHE_CONTROL_SECS)
            .with_upsert(true);
        if let Some(content_type) = &upload.content_type {
            options = options.with_content_type(content_type);
        }

        tracing::debug!(%item_id, %path, "uploading item image");
        self.wardrobe
            .storage(ctx)?
            .from(&self.wardrobe.config().bucket)
            .upload_bytes(&path, upload.bytes.clone(), &upload.file_name, Some(options))
            .await
            .map_err(storage_error("failed to upload image"))?;

        Ok(path)
    }

    /// Upload (or replace) an item's HTML detail document
    pub async fn upload_detail(
        &self,
        ctx: &AuthContext,
        item_id: Uuid,
        html: &str,
    ) -> Result<String> {
        let path = detail_path(ctx.owner_id, item_id);
        let options = FileOptions::new()
            .with_cache_control(CACHE_CONTROL_SECS)
            .with_content_type(DETAIL_CONTENT_TYPE)
            .with_upsert(true);

        tracing::debug!(%item_id, %path, "uploading detail document");
        self.wardrobe
            .storage(ctx)?
            .from(&self.wardrobe.config().bucket)
            .upload_bytes(
                &path,
                Bytes::from(html.to_string()),
                "detail.html",
                Some(options),
            )
            .await
            .map_err(storage_error("failed to upload detail document"))?;

        Ok(path)
    }

    /// Fresh time-limited URL for reading an object
    pub async fn signed_url(&self, ctx: &AuthContext, path: &str) -> Result<String> {
        self.wardrobe
            .storage(ctx)?
            .from(&self.wardrobe.config().bucket)
            .create_signed_url(path, self.wardrobe.config().signed_url_ttl)
            .await
            .map_err(storage_error("failed to sign URL"))
    }

    pub async fn remove(&self, ctx: &AuthContext, paths: &[&str]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        self.wardrobe
            .storage(ctx)?
            .from(&self.wardrobe.config().bucket)
            .remove(paths)
            .await
            .map_err(storage_error("failed to delete file"))
    }
}
