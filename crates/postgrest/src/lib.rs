//! REST query client for the wardrobe relational store
//!
//! The hosted database speaks the PostgREST dialect. A [`PostgrestClient`] is
//! bound to one table (or one RPC function), accumulates `select`, filters and
//! ordering, and then issues the request through one of the terminal calls.
//!
//! # Features
//!
//! - Query API (`select`, `insert`, `update`, `upsert`, `delete`)
//! - Filtering (`eq`, `gte`, `lte`, `in_list`, `overlaps`, ...)
//! - Ordering and limits
//! - Single-row lookups that report "no rows" as `None`
//! - RPC function calls

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Error code returned when a single-object request matched no rows.
pub const NO_ROWS_CODE: &str = "PGRST116";

const SINGLE_OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// Error body returned by the REST interface
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Error type
#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: reqwest::StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError {
        message: String,
        status: reqwest::StatusCode,
    },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// True when the store reported that a single-row request matched nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PostgrestError::ApiError { details, .. } if details.code.as_deref() == Some(NO_ROWS_CODE)
        )
    }

    /// The most specific human-readable message available.
    pub fn message(&self) -> String {
        match self {
            PostgrestError::ApiError { details, .. } => details
                .message
                .clone()
                .unwrap_or_else(|| details.to_string()),
            PostgrestError::UnparsedApiError { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Table (or RPC) client
#[derive(Clone)]
pub struct PostgrestClient {
    base_url: String,
    api_key: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    auth_token: Option<String>,
    query_params: Vec<(String, String)>,
    is_rpc: bool,
    rpc_params: Option<Value>,
}

impl PostgrestClient {
    /// Create a client for `table`
    pub fn new(base_url: &str, api_key: &str, table: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
            http_client,
            headers: HeaderMap::new(),
            auth_token: None,
            query_params: Vec::new(),
            is_rpc: false,
            rpc_params: None,
        }
    }

    /// Create a client for calling the RPC function `function_name`
    pub fn rpc(
        base_url: &str,
        api_key: &str,
        function_name: &str,
        params: Value,
        http_client: Client,
    ) -> Self {
        let mut client = Self::new(base_url, api_key, function_name, http_client);
        client.is_rpc = true;
        client.rpc_params = Some(params);
        client
    }

    /// Table or function this client targets
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Add a request header
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, PostgrestError> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value: {}", value))
        })?;
        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Authenticate requests with a user access token instead of the API key
    pub fn with_auth(mut self, token: &str) -> Result<Self, PostgrestError> {
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            PostgrestError::InvalidParameters("Invalid access token".to_string())
        })?;
        self.auth_token = Some(token.to_string());
        Ok(self)
    }

    /// Columns (and embedded relations) to return
    pub fn select(mut self, columns: &str) -> Self {
        self.query_params.retain(|(key, _)| key != "select");
        self.query_params
            .push(("select".to_string(), columns.to_string()));
        self
    }

    fn filter(mut self, column: &str, operator: &str, value: &str) -> Self {
        self.query_params
            .push((column.to_string(), format!("{}.{}", operator, value)));
        self
    }

    /// Equality filter
    pub fn eq(self, column: &str, value: &str) -> Self {
        self.filter(column, "eq", value)
    }

    /// Inequality filter
    pub fn neq(self, column: &str, value: &str) -> Self {
        self.filter(column, "neq", value)
    }

    /// Greater-than filter
    pub fn gt(self, column: &str, value: &str) -> Self {
        self.filter(column, "gt", value)
    }

    /// Greater-or-equal filter
    pub fn gte(self, column: &str, value: &str) -> Self {
        self.filter(column, "gte", value)
    }

    /// Less-than filter
    pub fn lt(self, column: &str, value: &str) -> Self {
        self.filter(column, "lt", value)
    }

    /// Less-or-equal filter
    pub fn lte(self, column: &str, value: &str) -> Self {
        self.filter(column, "lte", value)
    }

    /// `IN` filter
    pub fn in_list(self, column: &str, values: &[&str]) -> Self {
        let value_list = values
            .iter()
            .map(|v| quote_list_value(v))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, "in", &format!("({})", value_list))
    }

    /// Array overlap filter (`&&`): rows whose array column shares at least
    /// one element with `values`
    pub fn overlaps(self, column: &str, values: &[&str]) -> Self {
        let elements = values
            .iter()
            .map(|v| quote_array_element(v))
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, "ov", &format!("{{{}}}", elements))
    }

    /// `IS NULL` filter
    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, "is", "null")
    }

    /// Sort by `column`; repeated calls add secondary keys
    pub fn order(mut self, column: &str, order: SortOrder) -> Self {
        let order_str = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        let key = format!("{}.{}", column, order_str);
        match self.query_params.iter_mut().find(|(k, _)| k == "order") {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(&key);
            }
            None => self.query_params.push(("order".to_string(), key)),
        }
        self
    }

    /// Limit the number of rows
    pub fn limit(mut self, count: u32) -> Self {
        self.query_params.retain(|(key, _)| key != "limit");
        self.query_params
            .push(("limit".to_string(), count.to_string()));
        self
    }

    /// Fetch all matching rows
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, PostgrestError> {
        let headers = self.request_headers(false, None)?;
        let response = self.send(Method::GET, headers, None).await?;

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// Fetch exactly one row; a "no rows" answer becomes `Ok(None)`
    pub async fn execute_single<T: DeserializeOwned>(&self) -> Result<Option<T>, PostgrestError> {
        let headers = self.request_headers(true, None)?;
        let response = match self.send(Method::GET, headers, None).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// Insert one row or an array of rows
    pub async fn insert<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        let body = serde_json::to_value(values)?;
        let headers = self.request_headers(false, Some(RETURN_REPRESENTATION))?;
        let response = self.send(Method::POST, headers, Some(&body)).await?;
        read_body(response).await
    }

    /// Insert and decode the returned rows
    pub async fn insert_returning<T: Serialize, R: DeserializeOwned>(
        &self,
        values: T,
    ) -> Result<Vec<R>, PostgrestError> {
        rows_from_value(self.insert(values).await?)
    }

    /// Patch every row matched by the filters
    pub async fn update<T: Serialize>(&self, values: T) -> Result<Value, PostgrestError> {
        let body = serde_json::to_value(values)?;
        let headers = self.request_headers(false, Some(RETURN_REPRESENTATION))?;
        let response = self.send(Method::PATCH, headers, Some(&body)).await?;
        read_body(response).await
    }

    /// Patch and decode the returned rows
    pub async fn update_returning<T: Serialize, R: DeserializeOwned>(
        &self,
        values: T,
    ) -> Result<Vec<R>, PostgrestError> {
        rows_from_value(self.update(values).await?)
    }

    /// Insert, or merge into the existing row that conflicts on `on_conflict`
    pub async fn upsert<T: Serialize>(
        &self,
        values: T,
        on_conflict: &str,
    ) -> Result<Value, PostgrestError> {
        let body = serde_json::to_value(values)?;
        let mut target = self.clone();
        target
            .query_params
            .push(("on_conflict".to_string(), on_conflict.to_string()));
        let headers = target.request_headers(false, Some(MERGE_DUPLICATES))?;
        let response = target.send(Method::POST, headers, Some(&body)).await?;
        read_body(response).await
    }

    /// Upsert and decode the returned rows
    pub async fn upsert_returning<T: Serialize, R: DeserializeOwned>(
        &self,
        values: T,
        on_conflict: &str,
    ) -> Result<Vec<R>, PostgrestError> {
        rows_from_value(self.upsert(values, on_conflict).await?)
    }

    /// Delete every row matched by the filters
    pub async fn delete(&self) -> Result<Value, PostgrestError> {
        let headers = self.request_headers(false, Some(RETURN_REPRESENTATION))?;
        let response = self.send(Method::DELETE, headers, None).await?;
        read_body(response).await
    }

    /// Call the RPC function (POST request)
    pub async fn call_rpc<T: DeserializeOwned>(&self) -> Result<T, PostgrestError> {
        if !self.is_rpc {
            return Err(PostgrestError::InvalidParameters(
                "Client was not created for RPC. Use PostgrestClient::rpc().".to_string(),
            ));
        }
        let params = self.rpc_params.clone().ok_or_else(|| {
            PostgrestError::InvalidParameters("RPC parameters are missing.".to_string())
        })?;

        let headers = self.request_headers(false, None)?;
        let response = self.send(Method::POST, headers, Some(&params)).await?;

        // Functions returning void answer with an empty body
        let value = read_body(response).await?;
        serde_json::from_value(value).map_err(|e| {
            PostgrestError::DeserializationError(format!(
                "Failed to deserialize RPC response: {}",
                e
            ))
        })
    }

    fn build_url(&self) -> Result<Url, PostgrestError> {
        let endpoint = if self.is_rpc {
            format!("{}/rest/v1/rpc/{}", self.base_url, self.table)
        } else {
            format!("{}/rest/v1/{}", self.base_url, self.table)
        };
        let mut url = Url::parse(&endpoint)?;

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn request_headers(
        &self,
        single_object: bool,
        prefer: Option<&'static str>,
    ) -> Result<HeaderMap, PostgrestError> {
        let mut headers = self.headers.clone();
        let api_key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| PostgrestError::InvalidParameters("Invalid API key".to_string()))?;
        let bearer = self.auth_token.as_deref().unwrap_or(&self.api_key);
        let authorization = HeaderValue::from_str(&format!("Bearer {}", bearer)).map_err(|_| {
            PostgrestError::InvalidParameters("Invalid authorization token".to_string())
        })?;

        headers.insert(HeaderName::from_static("apikey"), api_key);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if single_object {
            headers.insert(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT_MEDIA_TYPE));
        }
        if let Some(prefer) = prefer {
            headers.insert(HeaderName::from_static("prefer"), HeaderValue::from_static(prefer));
        }
        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> Result<Response, PostgrestError> {
        let url = self.build_url()?;
        log::debug!("{} {}", method, url);

        let mut request = self.http_client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}

async fn error_from_response(response: Response) -> PostgrestError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());

    match serde_json::from_str::<PostgrestApiErrorDetails>(&error_text) {
        Ok(details) => PostgrestError::ApiError { details, status },
        Err(_) => PostgrestError::UnparsedApiError {
            message: error_text,
            status,
        },
    }
}

async fn read_body(response: Response) -> Result<Value, PostgrestError> {
    let body_text = response.text().await.map_err(|e| {
        PostgrestError::DeserializationError(format!("Failed to read response body: {}", e))
    })?;

    // 204 No Content and `return=minimal` both come back empty
    if body_text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(&body_text)
        .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
}

fn rows_from_value<R: DeserializeOwned>(value: Value) -> Result<Vec<R>, PostgrestError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(value)
            .map_err(|e| PostgrestError::DeserializationError(e.to_string())),
        other => serde_json::from_value(other)
            .map(|row| vec![row])
            .map_err(|e| PostgrestError::DeserializationError(e.to_string())),
    }
}

fn quote_list_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn quote_array_element(value: &str) -> String {
    if value.is_empty() || value.contains([',', '{', '}', '"', ' ', '\\']) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
