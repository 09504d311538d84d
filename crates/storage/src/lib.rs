//! Object store client for the wardrobe bucket
//!
//! Covers the calls the wardrobe needs from the hosted storage service:
//! uploading (optionally overwriting) objects, issuing time-limited signed
//! URLs and removing objects.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Error type
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

/// Upload options
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    pub cache_control: Option<String>,
    pub content_type: Option<String>,
    pub upsert: Option<bool>,
}

impl FileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_control(mut self, cache_control: &str) -> Self {
        self.cache_control = Some(cache_control.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Overwrite an existing object at the same path instead of failing
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = Some(upsert);
        self
    }
}

/// Body returned by a successful upload
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    #[serde(rename = "Key", default)]
    pub key: Option<String>,
    #[serde(rename = "Id", default)]
    pub id: Option<String>,
}

/// Storage client
#[derive(Clone)]
pub struct StorageClient {
    base_url: String,
    api_key: String,
    http_client: Client,
    auth_token: Option<String>,
}

/// Client scoped to one bucket
pub struct StorageBucketClient<'a> {
    parent: &'a StorageClient,
    bucket_id: String,
}

impl StorageClient {
    pub fn new(base_url: &str, api_key: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http_client,
            auth_token: None,
        }
    }

    /// Act on behalf of a signed-in user; object policies see their id
    pub fn with_auth(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    /// Select a bucket
    pub fn from<'a>(&'a self, bucket_id: &str) -> StorageBucketClient<'a> {
        StorageBucketClient {
            parent: self,
            bucket_id: bucket_id.to_string(),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.auth_token.as_deref().unwrap_or(&self.api_key);
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }
}

impl<'a> StorageBucketClient<'a> {
    /// Upload a file from disk
    pub async fn upload(
        &self,
        path: &str,
        file_path: &Path,
        options: Option<FileOptions>,
    ) -> Result<UploadResponse> {
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| StorageError::InvalidPath(file_path.display().to_string()))?;

        let mut file = File::open(file_path).await?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;

        self.upload_bytes(path, Bytes::from(contents), &file_name, options)
            .await
    }

    /// Upload in-memory content
    pub async fn upload_bytes(
        &self,
        path: &str,
        contents: Bytes,
        file_name: &str,
        options: Option<FileOptions>,
    ) -> Result<UploadResponse> {
        let path = validate_path(path)?;
        let options = options.unwrap_or_default();
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.parent.base_url, self.bucket_id, path
        );

        let mut part = Part::bytes(contents.to_vec()).file_name(file_name.to_string());
        if let Some(content_type) = &options.content_type {
            part = part.mime_str(content_type)?;
        }
        let mut form = Form::new();
        if let Some(cache_control) = &options.cache_control {
            form = form.text("cacheControl", cache_control.clone());
        }
        form = form.part("file", part);

        log::debug!("upload {}/{} ({} bytes)", self.bucket_id, path, contents.len());
        let mut request = self.parent.authorize(self.parent.http_client.post(&url));
        if options.upsert.unwrap_or(false) {
            request = request.header("x-upsert", "true");
        }
        let response = check(request.multipart(form).send().await?).await?;

        response
            .json::<UploadResponse>()
            .await
            .map_err(|e| StorageError::DeserializationError(e.to_string()))
    }

    /// Issue a signed URL granting read access for `expires_in` seconds
    pub async fn create_signed_url(&self, path: &str, expires_in: u64) -> Result<String> {
        let path = validate_path(path)?;
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.parent.base_url, self.bucket_id, path
        );

        let payload = serde_json::json!({
            "expiresIn": expires_in
        });

        log::debug!("sign {}/{} for {}s", self.bucket_id, path, expires_in);
        let response = self
            .parent
            .authorize(self.parent.http_client.post(&url))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;
        let response = check(response).await?;

        #[derive(Deserialize)]
        struct SignedUrlResponse {
            #[serde(rename = "signedURL", alias = "signedUrl")]
            signed_url: String,
        }

        let signed = response
            .json::<SignedUrlResponse>()
            .await
            .map_err(|e| StorageError::DeserializationError(e.to_string()))?;

        Ok(self.absolute_url(&signed.signed_url))
    }

    /// Remove objects
    pub async fn remove(&self, paths: &[&str]) -> Result<()> {
        let url = format!(
            "{}/storage/v1/object/{}",
            self.parent.base_url, self.bucket_id
        );

        let payload = serde_json::json!({
            "prefixes": paths
        });

        log::debug!("remove {:?} from {}", paths, self.bucket_id);
        let response = self
            .parent
            .authorize(self.parent.http_client.delete(&url))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;
        check(response).await?;

        Ok(())
    }

    // The service answers with a path relative to `/storage/v1`
    fn absolute_url(&self, signed_url: &str) -> String {
        if signed_url.starts_with("http://") || signed_url.starts_with("https://") {
            signed_url.to_string()
        } else {
            format!(
                "{}/storage/v1/{}",
                self.parent.base_url,
                signed_url.trim_start_matches('/')
            )
        }
    }
}

fn validate_path(path: &str) -> Result<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(trimmed)
}

async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    let error_text = response.text().await?;
    let message = serde_json::from_str::<ErrorBody>(&error_text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .unwrap_or(error_text);
    Err(StorageError::ApiError(message))
}
