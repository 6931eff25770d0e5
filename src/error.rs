//! Error types for the edgequake-doctranslate library.
//!
//! A single enum, [`TranslateError`], covers every failure the workflow can
//! surface. The variants follow the step that failed rather than the
//! transport that failed, because the orchestrator's recovery depends on the
//! step:
//!
//! * [`TranslateError::Validation`]: local check, no network call was made.
//! * [`TranslateError::Submission`], [`TranslateError::StatusCheck`],
//!   [`TranslateError::ResultFetch`]: one per backend job call.
//! * [`TranslateError::Transfer`]: object storage rejected an upload or
//!   download.
//! * [`TranslateError::Protocol`]: the backend answered with a shape we do
//!   not understand.
//!
//! Backend error bodies are carried verbatim so the caller can show the user
//! exactly what the service said.

use crate::trace::{Level, Tracer};
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-doctranslate library.
#[derive(Debug, Error)]
pub enum TranslateError {
    // ── Local errors ──────────────────────────────────────────────────────
    /// A precondition failed before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Job API errors ────────────────────────────────────────────────────
    /// `POST translate` failed or did not return a job id.
    #[error("Translation request failed: {message}")]
    Submission {
        status: Option<u16>,
        message: String,
    },

    /// `GET status` could not be completed.
    #[error("Error checking translation status: {message}")]
    StatusCheck {
        status: Option<u16>,
        message: String,
    },

    /// `GET result` failed, was called too early, or returned no file key.
    #[error("Failed to get translated file: {message}")]
    ResultFetch {
        status: Option<u16>,
        message: String,
    },

    /// `GET health` or `GET debug` could not be completed.
    #[error("Diagnostics request failed: {message}")]
    Diagnostics {
        status: Option<u16>,
        message: String,
    },

    /// The backend replied successfully but with an unexpected payload.
    #[error("Unexpected response from {endpoint}: {detail}")]
    Protocol { endpoint: String, detail: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Presigned upload or download was rejected by object storage.
    #[error("Transfer failed with status {status}: {body}")]
    Transfer { status: u16, body: String },

    /// The storage request never produced a response.
    #[error("Transfer to '{url}' failed: {reason}")]
    TransferConnection { url: String, reason: String },

    // ── Polling ───────────────────────────────────────────────────────────
    /// Polling was stopped by a reset or an external cancel request.
    #[error("Polling cancelled")]
    Cancelled,

    /// The optional polling ceiling was reached before the job resolved.
    #[error("Job {job_id} did not finish within {secs}s")]
    PollTimeout { job_id: String, secs: u64 },

    /// The backend reported the job as failed.
    #[error("Translation failed. Please try again.")]
    JobFailed { job_id: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading the input file or writing the downloaded file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranslateError {
    /// Short machine-readable name of the error class, used as the
    /// `error_kind` field of log payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            TranslateError::Validation(_) => "validation",
            TranslateError::InvalidConfig(_) => "invalid_config",
            TranslateError::Submission { .. } => "submission",
            TranslateError::StatusCheck { .. } => "status_check",
            TranslateError::ResultFetch { .. } => "result_fetch",
            TranslateError::Diagnostics { .. } => "diagnostics",
            TranslateError::Protocol { .. } => "protocol",
            TranslateError::Transfer { .. } | TranslateError::TransferConnection { .. } => {
                "transfer"
            }
            TranslateError::Cancelled => "cancelled",
            TranslateError::PollTimeout { .. } => "poll_timeout",
            TranslateError::JobFailed { .. } => "job_failed",
            TranslateError::Io { .. } => "io",
            TranslateError::Internal(_) => "internal",
        }
    }

    /// True for errors raised locally without contacting any remote system.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            TranslateError::Validation(_) | TranslateError::InvalidConfig(_)
        )
    }

    /// HTTP status attached to the error, when the remote side answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            TranslateError::Submission { status, .. }
            | TranslateError::StatusCheck { status, .. }
            | TranslateError::ResultFetch { status, .. }
            | TranslateError::Diagnostics { status, .. } => *status,
            TranslateError::Transfer { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A failed request paired with the correlation id its records were filed
/// under. The clients hand these back unlogged; whoever owns the failure
/// writes the single `Error` record.
#[derive(Debug)]
pub(crate) struct RequestFailure {
    pub request_id: String,
    pub error: TranslateError,
}

impl RequestFailure {
    pub(crate) fn new(request_id: impl Into<String>, error: TranslateError) -> Self {
        Self {
            request_id: request_id.into(),
            error,
        }
    }

    /// Log the error at `Error` under its request id and hand it back.
    pub(crate) fn report(self, tracer: &Tracer) -> TranslateError {
        tracer.log_with(
            Level::Error,
            &self.request_id,
            format_args!("{}", self.error),
            &serde_json::json!({
                "errorKind": self.error.kind(),
                "status": self.error.http_status(),
            }),
        );
        self.error
    }
}
