//! Client configuration.
//!
//! All workflow behaviour is controlled through [`ClientConfig`], built via
//! [`ClientConfigBuilder`]. Loading the values (files, environment) is the
//! host application's job; the CLI maps its flags onto the builder.

use crate::error::TranslateError;
use crate::trace::Level;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default delay between two status checks.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

/// Configuration for a translation client.
///
/// # Example
/// ```rust
/// use edgequake_doctranslate::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .api_base_url("https://api.example.com/prod/")
///     .original_bucket("ppt-translation-original")
///     .translated_bucket("ppt-translation-translated")
///     .build()
///     .unwrap();
/// assert_eq!(config.poll_interval_ms, 3000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the backend API. Endpoint paths are joined onto it, so it
    /// always ends with `/` after [`ClientConfigBuilder::build`].
    pub api_base_url: Url,

    /// Bucket receiving uploaded source documents.
    pub original_bucket: String,

    /// Bucket holding translated documents.
    pub translated_bucket: String,

    /// Fixed delay between status checks, no backoff. Default: 3000.
    pub poll_interval_ms: u64,

    /// Give up polling after this many seconds. Default: `None` (poll until
    /// the job resolves or the caller cancels).
    pub max_poll_duration_secs: Option<u64>,

    /// Per-request timeout for backend and storage calls. Default: `None`.
    pub request_timeout_secs: Option<u64>,

    /// File extensions accepted for upload, lowercase, without the dot.
    /// Default: `["ppt", "pptx"]`.
    pub allowed_extensions: Vec<String>,

    /// Initial minimum level of the diagnostic tracer. Default: `Info`.
    pub log_level: Level,

    /// Upper bound on retained diagnostic records. Default: `None`.
    pub max_log_records: Option<usize>,
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Option<Duration> {
        self.max_poll_duration_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Is `filename`'s extension in the allow-list? Case-insensitive.
    pub fn accepts_file(&self, filename: &str) -> bool {
        let ext = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => return false,
        };
        self.allowed_extensions.iter().any(|a| *a == ext)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    api_base_url: Option<String>,
    original_bucket: Option<String>,
    translated_bucket: Option<String>,
    poll_interval_ms: u64,
    max_poll_duration_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    allowed_extensions: Vec<String>,
    log_level: Level,
    max_log_records: Option<usize>,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            api_base_url: None,
            original_bucket: None,
            translated_bucket: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_duration_secs: None,
            request_timeout_secs: None,
            allowed_extensions: vec!["ppt".into(), "pptx".into()],
            log_level: Level::Info,
            max_log_records: None,
        }
    }
}

impl ClientConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn original_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.original_bucket = Some(bucket.into());
        self
    }

    pub fn translated_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.translated_bucket = Some(bucket.into());
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn max_poll_duration_secs(mut self, secs: Option<u64>) -> Self {
        self.max_poll_duration_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Replace the extension allow-list. Leading dots are stripped.
    pub fn allowed_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    pub fn max_log_records(mut self, n: Option<usize>) -> Self {
        self.max_log_records = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, TranslateError> {
        let raw_url = self
            .api_base_url
            .ok_or_else(|| TranslateError::InvalidConfig("API base URL is required".into()))?;
        let api_base_url = parse_base_url(&raw_url)?;

        let original_bucket = required(self.original_bucket, "original bucket")?;
        let translated_bucket = required(self.translated_bucket, "translated bucket")?;

        if self.poll_interval_ms == 0 {
            return Err(TranslateError::InvalidConfig(
                "Poll interval must be ≥ 1 ms".into(),
            ));
        }
        if self.max_poll_duration_secs == Some(0) {
            return Err(TranslateError::InvalidConfig(
                "Max poll duration must be ≥ 1 s when set".into(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(TranslateError::InvalidConfig(
                "Request timeout must be ≥ 1 s when set".into(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(TranslateError::InvalidConfig(
                "At least one allowed file extension is required".into(),
            ));
        }

        Ok(ClientConfig {
            api_base_url,
            original_bucket,
            translated_bucket,
            poll_interval_ms: self.poll_interval_ms,
            max_poll_duration_secs: self.max_poll_duration_secs,
            request_timeout_secs: self.request_timeout_secs,
            allowed_extensions: self.allowed_extensions,
            log_level: self.log_level,
            max_log_records: self.max_log_records,
        })
    }
}

fn required(value: Option<String>, what: &str) -> Result<String, TranslateError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(TranslateError::InvalidConfig(format!("{what} is required"))),
    }
}

/// Parse the base URL and make sure it ends with a slash so that
/// `Url::join("status")` appends instead of replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url, TranslateError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| TranslateError::InvalidConfig(format!("invalid API base URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(TranslateError::InvalidConfig(format!(
            "API base URL must be http or https, got '{}'",
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
