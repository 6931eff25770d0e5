//! Shared HTTP plumbing for the backend and storage clients.

use crate::config::ClientConfig;
use crate::error::TranslateError;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

/// Header carrying the tracer's correlation id on backend requests.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Build the shared `reqwest::Client`.
///
/// No cookie store is enabled and no default credentials are attached; the
/// only timeout is the optional per-request one from the config.
pub fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, TranslateError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("edgequake-doctranslate/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| TranslateError::Internal(format!("Failed to build HTTP client: {e}")))
}

/// Response headers as a JSON object for log payloads. Non-UTF-8 values are
/// skipped.
pub fn headers_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            map.insert(name.as_str().to_string(), Value::String(v.to_string()));
        }
    }
    Value::Object(map)
}

/// Strip the query string from a URL before logging it. Presigned URLs carry
/// their signature in the query.
pub fn redact_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?…"),
        None => url.to_string(),
    }
}

/// Read an error body as text. An unreadable body yields an empty string so
/// the caller still reports the status.
pub async fn error_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}
