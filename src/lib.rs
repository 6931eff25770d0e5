//! # edgequake-doctranslate
//!
//! Client-side orchestration of an asynchronous document-translation service.
//!
//! The backend never receives file bytes. It issues short-lived presigned
//! capabilities for object storage, accepts translation jobs by object key and
//! reports their progress through a status endpoint. This crate drives that
//! conversation as a small state machine and records every request with a
//! correlation id.
//!
//! ## Workflow Overview
//!
//! ```text
//! deck.pptx
//!  │
//!  ├─ 1. Upload   presigned PUT or POST form, straight to storage
//!  ├─ 2. Submit   POST translate {fileKey, sourceLanguage, targetLanguage}
//!  ├─ 3. Poll     GET status every 3 s (cancellable, no backoff)
//!  ├─ 4. Result   GET result → translated object key
//!  └─ 5. Download fresh presigned GET → deck-translated.pptx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doctranslate::{ClientConfig, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .api_base_url("https://api.example.com/prod/")
//!         .original_bucket("ppt-translation-original")
//!         .translated_bucket("ppt-translation-translated")
//!         .build()?;
//!
//!     let mut workflow = Workflow::new(config)?;
//!     workflow.translate_file("deck.pptx", "en", "es").await?;
//!     let bytes = workflow.download_result("deck-translated.pptx").await?;
//!     eprintln!("saved {bytes} bytes");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doctranslate` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doctranslate = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod job;
pub mod language;
pub mod trace;
pub mod transfer;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{HealthReport, JobApiClient};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_POLL_INTERVAL_MS};
pub use error::TranslateError;
pub use job::{translated_filename, Job, JobStatus, WorkflowState};
pub use language::Language;
pub use trace::{Level, LogRecord, Tracer};
pub use transfer::{PresignedTransferClient, UploadCapability, UploadFile};
pub use workflow::{
    validate_submission, CancelHandle, NoopObserver, SharedObserver, Workflow, WorkflowObserver,
};
