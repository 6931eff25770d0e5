//! Presigned transfers: moving file bytes to and from object storage.
//!
//! The backend never touches file contents. It hands out a short-lived
//! capability (a presigned PUT URL or a presigned POST form) and the client
//! talks to storage directly. Which protocol to use is decided once, when the
//! backend's response is parsed into an [`UploadCapability`]; nothing
//! downstream inspects response shapes again.
//!
//! Download URLs expire quickly, so this module never caches them: callers
//! fetch a fresh URL right before each [`PresignedTransferClient::download`].

use crate::error::{RequestFailure, TranslateError};
use crate::http::{error_body, headers_json, redact_url};
use crate::trace::{Level, Tracer};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

/// How storage expects the upload to be performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadCapability {
    /// PUT the raw bytes to `url`.
    DirectPut { url: String },
    /// POST a multipart form with `fields` followed by the file.
    FormPost {
        url: String,
        /// Policy fields in the order the backend listed them.
        fields: Vec<(String, String)>,
    },
}

impl UploadCapability {
    pub fn url(&self) -> &str {
        match self {
            UploadCapability::DirectPut { url } | UploadCapability::FormPost { url, .. } => url,
        }
    }
}

/// Response of `POST presigned-upload-url`: either a plain presigned URL or
/// a presigned POST descriptor.
#[derive(Debug, Deserialize)]
pub(crate) struct PresignedUploadResponse {
    #[serde(default)]
    presigned_url: Option<String>,
    #[serde(default)]
    post_data: Option<PostData>,
}

#[derive(Debug, Deserialize)]
struct PostData {
    url: String,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl PostData {
    /// Field pairs in document order. Non-string values are sent as their
    /// JSON text.
    fn field_pairs(self) -> Vec<(String, String)> {
        self.fields
            .into_iter()
            .map(|(name, value)| match value {
                serde_json::Value::String(s) => (name, s),
                other => (name, other.to_string()),
            })
            .collect()
    }
}

impl PresignedUploadResponse {
    /// Decide the upload protocol. A POST descriptor wins when both shapes
    /// are present, since its policy fields must reach storage.
    pub(crate) fn into_capability(self) -> Result<UploadCapability, TranslateError> {
        match (self.post_data, self.presigned_url) {
            (Some(post), _) if !post.url.is_empty() => Ok(UploadCapability::FormPost {
                url: post.url.clone(),
                fields: post.field_pairs(),
            }),
            (_, Some(url)) if !url.is_empty() => Ok(UploadCapability::DirectPut { url }),
            _ => Err(TranslateError::Protocol {
                endpoint: "presigned-upload-url".into(),
                detail: "response has neither 'presigned_url' nor 'post_data.url'".into(),
            }),
        }
    }
}

/// A file ready to be uploaded.
#[derive(Clone)]
pub struct UploadFile {
    pub filename: String,
    /// MIME type sent with the upload.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    /// Build from in-memory bytes, guessing the MIME type from the filename.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            filename,
            content_type,
            bytes,
        }
    }

    /// Read a local file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TranslateError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| TranslateError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Performs presigned uploads and downloads against object storage.
#[derive(Clone)]
pub struct PresignedTransferClient {
    http: reqwest::Client,
    tracer: Arc<Tracer>,
}

impl PresignedTransferClient {
    pub fn new(http: reqwest::Client, tracer: Arc<Tracer>) -> Self {
        Self { http, tracer }
    }

    /// Upload `file` using whichever protocol `capability` prescribes.
    pub async fn upload(
        &self,
        capability: &UploadCapability,
        file: &UploadFile,
    ) -> Result<(), TranslateError> {
        self.upload_traced(capability, file)
            .await
            .map_err(|f| f.report(&self.tracer))
    }

    /// Download the object behind a freshly issued presigned GET URL.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, TranslateError> {
        self.download_traced(url)
            .await
            .map_err(|f| f.report(&self.tracer))
    }

    /// Stream the object behind `url` into `dest`.
    ///
    /// Writes to `<dest>.part` and renames on success so an interrupted
    /// download never leaves a truncated file under the final name.
    /// Returns the number of bytes written.
    pub async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64, TranslateError> {
        self.download_to_file_traced(url, dest)
            .await
            .map_err(|f| f.report(&self.tracer))
    }

    pub(crate) async fn upload_traced(
        &self,
        capability: &UploadCapability,
        file: &UploadFile,
    ) -> Result<(), RequestFailure> {
        let request_id = self.tracer.generate_request_id();
        let start = Instant::now();

        let (method, request) = match capability {
            UploadCapability::DirectPut { url } => (
                "PUT",
                self.http
                    .put(url)
                    .header(CONTENT_TYPE, file.content_type.as_str())
                    .body(file.bytes.clone()),
            ),
            UploadCapability::FormPost { url, fields } => {
                let form = build_form(fields, file)
                    .map_err(|e| RequestFailure::new(request_id.clone(), e))?;
                ("POST", self.http.post(url).multipart(form))
            }
        };
        let target = redact_url(capability.url());

        self.tracer.log_with(
            Level::Info,
            &request_id,
            format_args!("{method} {target} (upload '{}')", file.filename),
            &json!({ "bytes": file.len(), "contentType": file.content_type }),
        );

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let err = TranslateError::TransferConnection {
                    url: target,
                    reason: e.to_string(),
                };
                return Err(RequestFailure::new(request_id, err));
            }
        };

        let status = response.status();
        self.tracer.log_with(
            Level::Info,
            &request_id,
            format_args!(
                "{method} {target} -> {} in {}ms",
                status.as_u16(),
                start.elapsed().as_millis()
            ),
            &headers_json(response.headers()),
        );

        if !status.is_success() {
            let body = error_body(response).await;
            self.tracer.debug(&request_id, format_args!("storage error body: {body}"));
            let err = TranslateError::Transfer {
                status: status.as_u16(),
                body,
            };
            return Err(RequestFailure::new(request_id, err));
        }

        Ok(())
    }

    pub(crate) async fn download_traced(&self, url: &str) -> Result<Vec<u8>, RequestFailure> {
        let (request_id, response) = self.start_download(url).await?;
        match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) => {
                let err = TranslateError::TransferConnection {
                    url: redact_url(url),
                    reason: e.to_string(),
                };
                Err(RequestFailure::new(request_id, err))
            }
        }
    }

    pub(crate) async fn download_to_file_traced(
        &self,
        url: &str,
        dest: &Path,
    ) -> Result<u64, RequestFailure> {
        let (request_id, response) = self.start_download(url).await?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                let err = TranslateError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                };
                return Err(RequestFailure::new(request_id, err));
            }
        }

        let part_path = part_path(dest);
        let written = match write_part(response, url, &part_path, dest).await {
            Ok(n) => n,
            Err(err) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(RequestFailure::new(request_id, err));
            }
        };

        self.tracer.info(
            &request_id,
            format_args!("saved {written} bytes to {}", dest.display()),
        );
        Ok(written)
    }

    async fn start_download(
        &self,
        url: &str,
    ) -> Result<(String, reqwest::Response), RequestFailure> {
        let request_id = self.tracer.generate_request_id();
        let target = redact_url(url);
        let start = Instant::now();
        self.tracer.info(&request_id, format_args!("GET {target} (download)"));

        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                let err = TranslateError::TransferConnection {
                    url: target,
                    reason: e.to_string(),
                };
                return Err(RequestFailure::new(request_id, err));
            }
        };

        let status = response.status();
        self.tracer.log_with(
            Level::Info,
            &request_id,
            format_args!(
                "GET {target} -> {} in {}ms",
                status.as_u16(),
                start.elapsed().as_millis()
            ),
            &headers_json(response.headers()),
        );

        if !status.is_success() {
            let err = TranslateError::Transfer {
                status: status.as_u16(),
                body: error_body(response).await,
            };
            return Err(RequestFailure::new(request_id, err));
        }
        Ok((request_id, response))
    }
}

/// Stream `response` into `part_path`, then move it onto `dest`. The caller
/// removes `part_path` when this fails.
async fn write_part(
    response: reqwest::Response,
    url: &str,
    part_path: &Path,
    dest: &Path,
) -> Result<u64, TranslateError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e: std::io::Error| TranslateError::Io { path, source: e }
    };

    let mut file = tokio::fs::File::create(part_path)
        .await
        .map_err(io_err(part_path))?;

    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| TranslateError::TransferConnection {
            url: redact_url(url),
            reason: e.to_string(),
        })?;
        file.write_all(&chunk).await.map_err(io_err(part_path))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err(part_path))?;
    drop(file);

    tokio::fs::rename(part_path, dest)
        .await
        .map_err(io_err(dest))?;
    Ok(written)
}

/// Backend-supplied fields first, in the order the backend sent them, then
/// the file. Storage ignores any field that follows `file`.
fn build_form(fields: &[(String, String)], file: &UploadFile) -> Result<Form, TranslateError> {
    let mut form = Form::new();
    for (name, value) in fields {
        form = form.text(name.clone(), value.clone());
    }
    let part = Part::bytes(file.bytes.clone())
        .file_name(file.filename.clone())
        .mime_str(&file.content_type)
        .map_err(|e| {
            TranslateError::Internal(format!("invalid MIME type '{}': {e}", file.content_type))
        })?;
    Ok(form.part("file", part))
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
