//! Workflow orchestrator: the upload → submit → poll → fetch state machine.
//!
//! ```text
//!            upload ok                start               submit ok
//!   Idle ───────────────▶ FileUploaded ─────▶ Submitting ─────────▶ Polling
//!    ▲                        ▲  ▲                │                 │  │ pending /
//!    │ reset (any state)      │  └── submit err ──┘                 │  │ processing
//!    │                        └──── failed / status err / cancel ───┘  ▼
//!    │                                                              Completed
//! ```
//!
//! A [`Workflow`] owns one [`Job`] at a time. All mutation goes through
//! `&mut self`, so a single task drives the machine and no lock guards the
//! job fields. The only thing shared across tasks is the cancellation slot
//! behind [`CancelHandle`].
//!
//! Errors during a translation step roll the machine back to
//! [`WorkflowState::FileUploaded`] so the user can retry without uploading
//! again; the job id of the abandoned job is cleared.

use crate::api::JobApiClient;
use crate::config::ClientConfig;
use crate::error::{RequestFailure, TranslateError};
use crate::http::build_http_client;
use crate::job::{object_key_for, Job, JobStatus, WorkflowState};
use crate::language::Language;
use crate::trace::{Level, Tracer};
use crate::transfer::{PresignedTransferClient, UploadFile};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ── Observer ─────────────────────────────────────────────────────────────

/// Callbacks fired as the workflow advances.
///
/// All methods have default no-op implementations so callers only override
/// what they need. Callbacks run on the task driving the workflow and must
/// not block.
pub trait WorkflowObserver: Send + Sync {
    /// The state machine moved from `from` to `to`.
    fn on_transition(&self, from: WorkflowState, to: WorkflowState) {
        let _ = (from, to);
    }

    /// A status check returned `status` for `job_id`.
    fn on_status(&self, job_id: &str, status: JobStatus) {
        let _ = (job_id, status);
    }

    /// An error was surfaced while in `state` (the state before any
    /// rollback).
    fn on_error(&self, state: WorkflowState, error: &TranslateError) {
        let _ = (state, error);
    }
}

/// No-op observer used when the caller does not supply one.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn WorkflowObserver>;

// ── Cancellation ─────────────────────────────────────────────────────────

/// Stops the current poll loop from another task.
///
/// The handle follows the workflow across runs: cancelling after a new
/// upload cancels the new run, not a stale one.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    slot: Arc<Mutex<CancellationToken>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        lock_slot(&self.slot).cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        lock_slot(&self.slot).is_cancelled()
    }
}

fn lock_slot(slot: &Mutex<CancellationToken>) -> std::sync::MutexGuard<'_, CancellationToken> {
    slot.lock().unwrap_or_else(|p| p.into_inner())
}

// ── Submission guard ─────────────────────────────────────────────────────

/// Check that a translation may be started, without touching anything.
///
/// Requires an uploaded file, two known and distinct language codes, and a
/// workflow resting in `FileUploaded`.
pub fn validate_submission(
    state: WorkflowState,
    job: Option<&Job>,
    source_language: &str,
    target_language: &str,
) -> Result<(), TranslateError> {
    if !job.is_some_and(|j| !j.file_key.is_empty()) {
        return Err(TranslateError::Validation("Please upload a file first".into()));
    }
    if state != WorkflowState::FileUploaded {
        return Err(TranslateError::Validation(format!(
            "Cannot start a translation while the workflow is {state}"
        )));
    }

    let source = source_language.trim();
    let target = target_language.trim();
    if source.is_empty() {
        return Err(TranslateError::Validation("Please select a source language".into()));
    }
    if target.is_empty() {
        return Err(TranslateError::Validation("Please select a target language".into()));
    }
    for code in [source, target] {
        if Language::from_code(code).is_none() {
            return Err(TranslateError::Validation(format!(
                "Unsupported language code '{code}'"
            )));
        }
    }
    if source.eq_ignore_ascii_case(target) {
        return Err(TranslateError::Validation(
            "Source and target languages must be different".into(),
        ));
    }
    Ok(())
}

// ── Workflow ─────────────────────────────────────────────────────────────

/// The translation workflow state machine.
pub struct Workflow {
    config: ClientConfig,
    api: JobApiClient,
    transfer: PresignedTransferClient,
    tracer: Arc<Tracer>,
    observer: SharedObserver,
    state: WorkflowState,
    job: Option<Job>,
    last_error: Option<String>,
    /// Correlation id for workflow-level records of the current run.
    run_id: String,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("state", &self.state)
            .field("job", &self.job)
            .field("last_error", &self.last_error)
            .field("run_id", &self.run_id)
            .finish()
    }
}

impl Workflow {
    /// Build a workflow with its own tracer, configured from `config`.
    pub fn new(config: ClientConfig) -> Result<Self, TranslateError> {
        let tracer = match config.max_log_records {
            Some(cap) => Tracer::with_capacity(config.log_level, cap),
            None => Tracer::new(config.log_level),
        };
        Self::with_tracer(config, Arc::new(tracer))
    }

    /// Build a workflow that logs into an existing tracer.
    pub fn with_tracer(config: ClientConfig, tracer: Arc<Tracer>) -> Result<Self, TranslateError> {
        let http = build_http_client(&config)?;
        let api = JobApiClient::new(http.clone(), config.api_base_url.clone(), tracer.clone());
        let transfer = PresignedTransferClient::new(http, tracer.clone());
        let run_id = tracer.generate_request_id();
        Ok(Self {
            config,
            api,
            transfer,
            tracer,
            observer: Arc::new(NoopObserver),
            state: WorkflowState::Idle,
            job: None,
            last_error: None,
            run_id,
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
        })
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// Message of the most recently surfaced error, cleared by the next
    /// successful upload or a reset.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    /// Correlation id of the current run's workflow-level records.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            slot: self.cancel.clone(),
        }
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Read `path` and upload it. See [`Workflow::upload`].
    pub async fn upload_file(&mut self, path: impl AsRef<Path>) -> Result<String, TranslateError> {
        let file = match UploadFile::from_path(path).await {
            Ok(f) => f,
            Err(e) => return Err(self.surface(e, None)),
        };
        self.upload(file).await
    }

    /// Upload a source document and move to `FileUploaded`.
    ///
    /// Accepted from `Idle`, and from `FileUploaded` or `Completed` where it
    /// discards the previous job and starts a new run. On failure the
    /// workflow is left in `Idle`. Returns the object key.
    pub async fn upload(&mut self, file: UploadFile) -> Result<String, TranslateError> {
        if let Err(e) = self.check_upload(&file) {
            return Err(self.surface(e, None));
        }

        if self.state != WorkflowState::Idle {
            self.clear_run();
            self.transition(WorkflowState::Idle);
        }
        self.begin_run();

        let file_key = object_key_for(&file.filename);
        self.tracer.log_with(
            Level::Info,
            &self.run_id,
            format_args!("uploading '{}'", file.filename),
            &json!({ "bytes": file.len(), "contentType": file.content_type }),
        );

        let capability = match self
            .api
            .presigned_upload_traced(&self.config.original_bucket, &file_key, &file.content_type)
            .await
        {
            Ok(c) => c,
            Err(f) => return Err(self.surface_failure(f, None)),
        };
        if let Err(f) = self.transfer.upload_traced(&capability, &file).await {
            return Err(self.surface_failure(f, None));
        }

        self.job = Some(Job::uploaded(file_key.clone(), file.filename));
        self.last_error = None;
        self.transition(WorkflowState::FileUploaded);
        Ok(file_key)
    }

    /// Submit the uploaded file for translation and move to `Polling`.
    ///
    /// Returns the backend job id. A failed guard makes no network call and
    /// leaves the state unchanged; a failed submission rolls back to
    /// `FileUploaded`.
    pub async fn start_translation(
        &mut self,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslateError> {
        if let Err(e) =
            validate_submission(self.state, self.job.as_ref(), source_language, target_language)
        {
            return Err(self.surface(e, None));
        }

        let source = source_language.trim().to_ascii_lowercase();
        let target = target_language.trim().to_ascii_lowercase();
        let file_key = match self.job.as_mut() {
            Some(job) => {
                job.source_language = source.clone();
                job.target_language = target.clone();
                job.file_key.clone()
            }
            None => return Err(self.surface(missing_job(), None)),
        };

        self.transition(WorkflowState::Submitting);
        match self.api.submit_job_traced(&file_key, &source, &target).await {
            Ok(job_id) => {
                if let Some(job) = self.job.as_mut() {
                    job.job_id = Some(job_id.clone());
                }
                self.transition(WorkflowState::Polling);
                Ok(job_id)
            }
            Err(f) => Err(self.surface_failure(f, Some(WorkflowState::FileUploaded))),
        }
    }

    /// Poll the job's status at the configured fixed interval until it
    /// resolves. Returns the translated file key.
    ///
    /// The first status check is sent at once; the interval is only waited
    /// out after a `pending` or `processing` answer. Every wait and every
    /// in-flight check races against the run's cancellation token, and a
    /// result that arrives after cancellation is discarded.
    pub async fn poll_until_resolved(&mut self) -> Result<String, TranslateError> {
        if self.state != WorkflowState::Polling {
            let e = TranslateError::Validation("No translation is in progress".into());
            return Err(self.surface(e, None));
        }
        let job_id = match self.job.as_ref().and_then(|j| j.job_id.clone()) {
            Some(id) => id,
            None => return Err(self.surface(missing_job(), Some(WorkflowState::FileUploaded))),
        };

        let token = self.current_token();
        let api = self.api.clone();
        let interval = self.config.poll_interval();
        let limit = self.config.max_poll_duration();
        let started = Instant::now();

        loop {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                r = api.get_status_traced(&job_id) => Some(r),
            };
            let result = match outcome {
                Some(r) if !token.is_cancelled() => r,
                _ => return Err(self.cancelled()),
            };

            let status = match result {
                Ok(s) => s,
                Err(f) => return Err(self.surface_failure(f, Some(WorkflowState::FileUploaded))),
            };
            debug!("job {job_id} status: {status}");
            self.observer.on_status(&job_id, status);

            if status.is_terminal() {
                return match status {
                    JobStatus::Completed => self.fetch_result(&job_id, &token).await,
                    _ => {
                        let e = TranslateError::JobFailed {
                            job_id: job_id.clone(),
                        };
                        Err(self.surface(e, Some(WorkflowState::FileUploaded)))
                    }
                };
            }

            let slept = tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(interval) => true,
            };
            if !slept {
                return Err(self.cancelled());
            }

            if let Some(limit) = limit {
                if started.elapsed() >= limit {
                    let e = TranslateError::PollTimeout {
                        job_id: job_id.clone(),
                        secs: limit.as_secs(),
                    };
                    return Err(self.surface(e, Some(WorkflowState::FileUploaded)));
                }
            }
        }
    }

    /// Upload, submit and poll in one call. Returns the translated file key.
    pub async fn translate_file(
        &mut self,
        path: impl AsRef<Path>,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslateError> {
        self.upload_file(path).await?;
        self.start_translation(source_language, target_language)
            .await?;
        self.poll_until_resolved().await
    }

    /// Download the translated document into `dest`. Returns the number of
    /// bytes written.
    ///
    /// A fresh presigned URL is requested for every call. Failures are
    /// surfaced but leave the workflow in `Completed` so the download can be
    /// retried.
    pub async fn download_result(&mut self, dest: impl AsRef<Path>) -> Result<u64, TranslateError> {
        let url = self.fresh_download_url().await?;
        match self.transfer.download_to_file_traced(&url, dest.as_ref()).await {
            Ok(n) => Ok(n),
            Err(f) => Err(self.surface_failure(f, None)),
        }
    }

    /// Download the translated document into memory.
    pub async fn download_result_bytes(&mut self) -> Result<Vec<u8>, TranslateError> {
        let url = self.fresh_download_url().await?;
        match self.transfer.download_traced(&url).await {
            Ok(bytes) => Ok(bytes),
            Err(f) => Err(self.surface_failure(f, None)),
        }
    }

    /// Cancel any in-flight polling, discard the job and return to `Idle`.
    pub fn reset(&mut self) {
        self.clear_run();
        self.last_error = None;
        if self.state != WorkflowState::Idle {
            self.transition(WorkflowState::Idle);
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn check_upload(&self, file: &UploadFile) -> Result<(), TranslateError> {
        if matches!(self.state, WorkflowState::Submitting | WorkflowState::Polling) {
            return Err(TranslateError::Validation(format!(
                "Cannot upload while the workflow is {}",
                self.state
            )));
        }
        if !self.config.accepts_file(&file.filename) {
            let allowed: Vec<String> = self
                .config
                .allowed_extensions
                .iter()
                .map(|e| format!(".{e}"))
                .collect();
            return Err(TranslateError::Validation(format!(
                "Unsupported file '{}': expected {}",
                file.filename,
                allowed.join(" or ")
            )));
        }
        if file.is_empty() {
            return Err(TranslateError::Validation(format!(
                "File '{}' is empty",
                file.filename
            )));
        }
        Ok(())
    }

    async fn fetch_result(
        &mut self,
        job_id: &str,
        token: &CancellationToken,
    ) -> Result<String, TranslateError> {
        let result = self.api.get_result_traced(job_id).await;
        if token.is_cancelled() {
            return Err(self.cancelled());
        }
        match result {
            Ok(key) => {
                if let Some(job) = self.job.as_mut() {
                    job.translated_file_key = Some(key.clone());
                }
                self.transition(WorkflowState::Completed);
                Ok(key)
            }
            Err(f) => Err(self.surface_failure(f, Some(WorkflowState::FileUploaded))),
        }
    }

    async fn fresh_download_url(&mut self) -> Result<String, TranslateError> {
        let key = match (self.state, self.job.as_ref()) {
            (WorkflowState::Completed, Some(job)) => job.translated_file_key.clone(),
            _ => None,
        };
        let Some(key) = key else {
            let e = TranslateError::Validation("No translated file is available yet".into());
            return Err(self.surface(e, None));
        };
        match self
            .api
            .presigned_download_url_traced(&self.config.translated_bucket, &key)
            .await
        {
            Ok(url) => Ok(url),
            Err(f) => Err(self.surface_failure(f, None)),
        }
    }

    /// Record a non-error transition. Exactly one `Info` record per call.
    fn transition(&mut self, to: WorkflowState) {
        let from = self.state;
        self.state = to;
        let job_id = self.job.as_ref().and_then(|j| j.job_id.as_deref());
        debug_assert!(
            job_id.is_none() || to.may_hold_job_id(),
            "job id {job_id:?} carried into {to}"
        );
        self.tracer.log_with(
            Level::Info,
            &self.run_id,
            format_args!("transition {from} -> {to}"),
            &json!({ "from": from, "to": to, "jobId": job_id }),
        );
        self.observer.on_transition(from, to);
    }

    /// Surface a local error. See [`Workflow::report`].
    fn surface(&mut self, err: TranslateError, rollback: Option<WorkflowState>) -> TranslateError {
        self.report(err, None, rollback)
    }

    /// Surface a failed request, linking the record to the request's
    /// correlation id.
    fn surface_failure(
        &mut self,
        failure: RequestFailure,
        rollback: Option<WorkflowState>,
    ) -> TranslateError {
        let RequestFailure { request_id, error } = failure;
        self.report(error, Some(&request_id), rollback)
    }

    /// Remember the error's message, emit exactly one `Error` record under
    /// the run id, notify the observer and, when `rollback` is set, move
    /// there and drop the abandoned job's id.
    fn report(
        &mut self,
        err: TranslateError,
        request_id: Option<&str>,
        rollback: Option<WorkflowState>,
    ) -> TranslateError {
        let from = self.state;
        let message = err.to_string();
        self.tracer.log_with(
            Level::Error,
            &self.run_id,
            format_args!("{message}"),
            &json!({
                "errorKind": err.kind(),
                "status": err.http_status(),
                "requestId": request_id,
                "state": from,
                "rollbackTo": rollback,
            }),
        );
        self.last_error = Some(message);
        self.observer.on_error(from, &err);

        if let Some(to) = rollback {
            if let Some(job) = self.job.as_mut() {
                job.job_id = None;
                job.translated_file_key = None;
            }
            self.state = to;
            self.observer.on_transition(from, to);
        }
        err
    }

    /// Polling was cancelled without a reset: roll back and arm a fresh
    /// token so the job can be resubmitted.
    fn cancelled(&mut self) -> TranslateError {
        self.renew_token();
        self.surface(TranslateError::Cancelled, Some(WorkflowState::FileUploaded))
    }

    fn begin_run(&mut self) {
        self.renew_token();
        self.run_id = self.tracer.generate_request_id();
    }

    fn clear_run(&mut self) {
        self.renew_token();
        self.job = None;
    }

    fn current_token(&self) -> CancellationToken {
        lock_slot(&self.cancel).clone()
    }

    /// Cancel the current token and install a new one.
    fn renew_token(&self) {
        let mut slot = lock_slot(&self.cancel);
        slot.cancel();
        *slot = CancellationToken::new();
    }
}

fn missing_job() -> TranslateError {
    TranslateError::Internal("workflow has no job record".into())
}
