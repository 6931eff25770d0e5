//! Typed client for the translation backend's HTTP API.
//!
//! Every call is one request/response round trip. Each request gets a fresh
//! correlation id from the [`Tracer`], sent as the `X-Request-Id` header and
//! attached to every log record of that exchange:
//!
//! ```text
//! INFO  req-000003-9f2c…  POST translate
//! DEBUG req-000003-9f2c…  request body        {"fileKey":…}
//! INFO  req-000003-9f2c…  POST translate -> 200 in 84ms   {headers}
//! DEBUG req-000003-9f2c…  response body       {"jobId":…}
//! ```
//!
//! Bodies are only recorded at `Debug`, so file keys and backend messages do
//! not reach logs at the default level.

use crate::error::{RequestFailure, TranslateError};
use crate::http::{headers_json, REQUEST_ID_HEADER};
use crate::job::JobStatus;
use crate::trace::{Level, Tracer};
use crate::transfer::{PresignedUploadResponse, UploadCapability};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use url::Url;

// ── Endpoints ────────────────────────────────────────────────────────────

const PRESIGNED_UPLOAD: &str = "presigned-upload-url";
const PRESIGNED_DOWNLOAD: &str = "presigned-download-url";
const TRANSLATE: &str = "translate";
const STATUS: &str = "status";
const RESULT: &str = "result";
const HEALTH: &str = "health";
const DEBUG: &str = "debug";

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PresignedUploadRequest<'a> {
    bucket_name: &'a str,
    object_key: &'a str,
    #[serde(rename = "fileType")]
    file_type: &'a str,
    operation: &'static str,
}

#[derive(Debug, Serialize)]
struct PresignedDownloadRequest<'a> {
    bucket_name: &'a str,
    object_key: &'a str,
    operation: &'static str,
}

#[derive(Debug, Deserialize)]
struct PresignedDownloadResponse {
    #[serde(default)]
    presigned_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    file_key: &'a str,
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultResponse {
    #[serde(default)]
    translated_file_key: Option<String>,
}

/// Answer of `GET health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `healthy` or `unhealthy`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Set when the health check itself failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-component details (`s3`, `lambda`, ...), kept as sent.
    #[serde(flatten)]
    pub components: serde_json::Map<String, serde_json::Value>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// A completed 2xx exchange.
struct Exchange {
    request_id: String,
    status: u16,
    body: String,
}

/// A request that failed in transport or returned non-2xx.
struct CallFailure {
    request_id: String,
    status: Option<u16>,
    message: String,
}

// ── Client ───────────────────────────────────────────────────────────────

/// Client for the backend job API.
///
/// Cheap to clone; clones share the HTTP connection pool, the tracer and the
/// record of jobs observed as completed.
#[derive(Clone)]
pub struct JobApiClient {
    http: reqwest::Client,
    base_url: Url,
    tracer: Arc<Tracer>,
    completed: Arc<Mutex<HashSet<String>>>,
}

impl fmt::Debug for JobApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl JobApiClient {
    /// `base_url` must end with `/`; [`crate::ClientConfig`] guarantees it.
    pub fn new(http: reqwest::Client, base_url: Url, tracer: Arc<Tracer>) -> Self {
        Self {
            http,
            base_url,
            tracer,
            completed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Request an upload capability for `object_key` in `bucket`.
    ///
    /// The backend answers either with a presigned PUT URL or a presigned
    /// POST form; the shape is resolved here, once.
    pub async fn presigned_upload(
        &self,
        bucket: &str,
        object_key: &str,
        file_type: &str,
    ) -> Result<UploadCapability, TranslateError> {
        self.presigned_upload_traced(bucket, object_key, file_type)
            .await
            .map_err(|f| f.report(&self.tracer))
    }

    /// Request a fresh presigned GET URL. Never cache the result: it expires
    /// shortly after issue.
    pub async fn presigned_download_url(
        &self,
        bucket: &str,
        object_key: &str,
    ) -> Result<String, TranslateError> {
        self.presigned_download_url_traced(bucket, object_key)
            .await
            .map_err(|f| f.report(&self.tracer))
    }

    /// Submit a translation job. Returns the backend job id.
    pub async fn submit_job(
        &self,
        file_key: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslateError> {
        self.submit_job_traced(file_key, source_language, target_language)
            .await
            .map_err(|f| f.report(&self.tracer))
    }

    /// Query the status of `job_id`.
    ///
    /// Only `pending`, `processing`, `completed` and `failed` are accepted;
    /// any other value is a [`TranslateError::Protocol`] rather than being
    /// guessed at.
    pub async fn get_status(&self, job_id: &str) -> Result<JobStatus, TranslateError> {
        self.get_status_traced(job_id)
            .await
            .map_err(|f| f.report(&self.tracer))
    }

    /// Fetch the translated file key of a completed job.
    ///
    /// Refuses, without a request, jobs this client has not yet seen reported
    /// as `completed` by [`JobApiClient::get_status`].
    pub async fn get_result(&self, job_id: &str) -> Result<String, TranslateError> {
        self.get_result_traced(job_id)
            .await
            .map_err(|f| f.report(&self.tracer))
    }

    /// Ask the backend whether its storage and worker dependencies are
    /// reachable.
    ///
    /// An unhealthy backend answers 500 with a report body; that report is
    /// returned as `Ok` so the caller can show which component is down.
    pub async fn health(&self) -> Result<HealthReport, TranslateError> {
        let ex = match self.exchange::<()>(Method::GET, HEALTH, None, None).await {
            Ok(ex) => ex,
            Err(f) => {
                if f.status.is_some() {
                    if let Ok(report) = serde_json::from_str::<HealthReport>(&f.message) {
                        self.tracer.warn(
                            &f.request_id,
                            format_args!("backend reports status '{}'", report.status),
                        );
                        return Ok(report);
                    }
                }
                let err = TranslateError::Diagnostics {
                    status: f.status,
                    message: f.message,
                };
                return Err(RequestFailure::new(f.request_id, err).report(&self.tracer));
            }
        };
        self.parse(&ex, HEALTH).map_err(|f| f.report(&self.tracer))
    }

    /// Fetch the backend's diagnostic dump of the given kind (`system` or
    /// `config`). The body is returned as-is.
    pub async fn debug_info(&self, kind: &str) -> Result<serde_json::Value, TranslateError> {
        let ex = self
            .exchange::<()>(Method::GET, DEBUG, Some(("type", kind)), None)
            .await
            .map_err(|f| {
                let err = TranslateError::Diagnostics {
                    status: f.status,
                    message: f.message,
                };
                RequestFailure::new(f.request_id, err).report(&self.tracer)
            })?;
        self.parse(&ex, DEBUG).map_err(|f| f.report(&self.tracer))
    }

    // ── Unlogged variants ────────────────────────────────────────────────
    //
    // Used by the workflow, which files the one `Error` record of a failed
    // step itself and links it to the request id.

    pub(crate) async fn presigned_upload_traced(
        &self,
        bucket: &str,
        object_key: &str,
        file_type: &str,
    ) -> Result<UploadCapability, RequestFailure> {
        let body = PresignedUploadRequest {
            bucket_name: bucket,
            object_key,
            file_type,
            operation: "put_object",
        };
        let ex = self
            .exchange(Method::POST, PRESIGNED_UPLOAD, None, Some(&body))
            .await
            .map_err(|f| {
                let err = transfer_failure(PRESIGNED_UPLOAD, f.status, f.message);
                RequestFailure::new(f.request_id, err)
            })?;

        let parsed: PresignedUploadResponse = self.parse(&ex, PRESIGNED_UPLOAD)?;
        parsed
            .into_capability()
            .map_err(|e| RequestFailure::new(ex.request_id, e))
    }

    pub(crate) async fn presigned_download_url_traced(
        &self,
        bucket: &str,
        object_key: &str,
    ) -> Result<String, RequestFailure> {
        let body = PresignedDownloadRequest {
            bucket_name: bucket,
            object_key,
            operation: "get_object",
        };
        let ex = self
            .exchange(Method::POST, PRESIGNED_DOWNLOAD, None, Some(&body))
            .await
            .map_err(|f| {
                let err = transfer_failure(PRESIGNED_DOWNLOAD, f.status, f.message);
                RequestFailure::new(f.request_id, err)
            })?;

        let parsed: PresignedDownloadResponse = self.parse(&ex, PRESIGNED_DOWNLOAD)?;
        match parsed.presigned_url {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(RequestFailure::new(
                ex.request_id,
                TranslateError::Protocol {
                    endpoint: PRESIGNED_DOWNLOAD.into(),
                    detail: "response did not include 'presigned_url'".into(),
                },
            )),
        }
    }

    pub(crate) async fn submit_job_traced(
        &self,
        file_key: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, RequestFailure> {
        let body = SubmitRequest {
            file_key,
            source_language,
            target_language,
        };
        let ex = self
            .exchange(Method::POST, TRANSLATE, None, Some(&body))
            .await
            .map_err(|f| {
                RequestFailure::new(
                    f.request_id,
                    TranslateError::Submission {
                        status: f.status,
                        message: f.message,
                    },
                )
            })?;

        let parsed: SubmitResponse = self.parse(&ex, TRANSLATE)?;
        match parsed.job_id {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(RequestFailure::new(
                ex.request_id,
                TranslateError::Submission {
                    status: Some(ex.status),
                    message: "response did not include a job id".into(),
                },
            )),
        }
    }

    pub(crate) async fn get_status_traced(&self, job_id: &str) -> Result<JobStatus, RequestFailure> {
        let ex = self
            .exchange::<()>(Method::GET, STATUS, Some(("jobId", job_id)), None)
            .await
            .map_err(|f| {
                RequestFailure::new(
                    f.request_id,
                    TranslateError::StatusCheck {
                        status: f.status,
                        message: f.message,
                    },
                )
            })?;

        let parsed: StatusResponse = self.parse(&ex, STATUS)?;
        let raw = parsed.status.unwrap_or_default();
        let Some(status) = JobStatus::parse(&raw) else {
            return Err(RequestFailure::new(
                ex.request_id,
                TranslateError::Protocol {
                    endpoint: STATUS.into(),
                    detail: format!("unknown job status '{raw}'"),
                },
            ));
        };

        if status == JobStatus::Completed {
            self.completed_jobs().insert(job_id.to_string());
        }
        Ok(status)
    }

    pub(crate) async fn get_result_traced(&self, job_id: &str) -> Result<String, RequestFailure> {
        if !self.completed_jobs().contains(job_id) {
            return Err(RequestFailure::new(
                self.tracer.generate_request_id(),
                TranslateError::ResultFetch {
                    status: None,
                    message: format!("job {job_id} has not completed yet"),
                },
            ));
        }

        let ex = self
            .exchange::<()>(Method::GET, RESULT, Some(("jobId", job_id)), None)
            .await
            .map_err(|f| {
                RequestFailure::new(
                    f.request_id,
                    TranslateError::ResultFetch {
                        status: f.status,
                        message: f.message,
                    },
                )
            })?;

        let parsed: ResultResponse = self.parse(&ex, RESULT)?;
        match parsed.translated_file_key {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(RequestFailure::new(
                ex.request_id,
                TranslateError::ResultFetch {
                    status: Some(ex.status),
                    message: "response did not include a translated file key".into(),
                },
            )),
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn completed_jobs(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.completed.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn parse<T: DeserializeOwned>(&self, ex: &Exchange, endpoint: &str) -> Result<T, RequestFailure> {
        serde_json::from_str(&ex.body).map_err(|e| {
            RequestFailure::new(
                ex.request_id.clone(),
                TranslateError::Protocol {
                    endpoint: endpoint.into(),
                    detail: format!("invalid JSON body: {e}"),
                },
            )
        })
    }

    async fn exchange<B>(
        &self,
        method: Method,
        endpoint: &str,
        query: Option<(&str, &str)>,
        body: Option<&B>,
    ) -> Result<Exchange, CallFailure>
    where
        B: Serialize + fmt::Debug,
    {
        let request_id = self.tracer.generate_request_id();
        let start = Instant::now();

        let mut url = match self.base_url.join(endpoint) {
            Ok(u) => u,
            Err(e) => {
                return Err(CallFailure {
                    request_id,
                    status: None,
                    message: format!("invalid endpoint URL: {e}"),
                })
            }
        };
        if let Some((k, v)) = query {
            url.query_pairs_mut().append_pair(k, v);
        }

        self.tracer
            .info(&request_id, format_args!("{method} {endpoint}"));

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .header(REQUEST_ID_HEADER, request_id.as_str());
        if let Some(b) = body {
            self.tracer
                .log_with(Level::Debug, &request_id, format_args!("request body"), b);
            request = request.json(b);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                return Err(CallFailure {
                    request_id,
                    status: None,
                    message: e.to_string(),
                })
            }
        };

        let status = response.status();
        self.tracer.log_with(
            Level::Info,
            &request_id,
            format_args!(
                "{method} {endpoint} -> {} in {}ms",
                status.as_u16(),
                start.elapsed().as_millis()
            ),
            &headers_json(response.headers()),
        );

        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                return Err(CallFailure {
                    request_id,
                    status: Some(status.as_u16()),
                    message: format!("failed to read response body: {e}"),
                })
            }
        };
        self.tracer
            .debug(&request_id, format_args!("response body: {text}"));

        if !status.is_success() {
            return Err(CallFailure {
                request_id,
                status: Some(status.as_u16()),
                message: text,
            });
        }

        Ok(Exchange {
            request_id,
            status: status.as_u16(),
            body: text,
        })
    }
}

/// Presigned-URL requests belong to the transfer step, so their failures
/// are reported as transfer errors.
fn transfer_failure(endpoint: &str, status: Option<u16>, message: String) -> TranslateError {
    match status {
        Some(status) => TranslateError::Transfer {
            status,
            body: message,
        },
        None => TranslateError::TransferConnection {
            url: endpoint.into(),
            reason: message,
        },
    }
}
