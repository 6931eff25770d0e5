//! Workflow data model: the job record, backend job status, workflow state,
//! and the naming rules for object keys and downloaded files.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One translation job, owned by the orchestrator for a single workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Object key of the uploaded source document.
    pub file_key: String,
    /// Filename as selected by the user.
    pub original_filename: String,
    pub source_language: String,
    pub target_language: String,
    /// Backend job id; set once submission succeeds.
    pub job_id: Option<String>,
    /// Object key of the translated document; set once the job completes.
    pub translated_file_key: Option<String>,
}

impl Job {
    pub(crate) fn uploaded(file_key: String, original_filename: String) -> Self {
        Self {
            file_key,
            original_filename,
            source_language: String::new(),
            target_language: String::new(),
            job_id: None,
            translated_file_key: None,
        }
    }

    /// Filename to offer when saving the translated document.
    pub fn translated_filename(&self) -> String {
        translated_filename(&self.original_filename)
    }
}

/// Status reported by the backend's `status` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Parse a wire status. Case-insensitive; anything outside the four
    /// known values yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Completed or failed: no further polling needed.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Rough progress shown to the user.
    pub fn progress_percent(self) -> u8 {
        match self {
            JobStatus::Pending => 20,
            JobStatus::Processing => 60,
            JobStatus::Completed => 100,
            JobStatus::Failed => 0,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            JobStatus::Pending => "Translation starting...",
            JobStatus::Processing => "Translating in progress...",
            JobStatus::Completed => "Translation complete!",
            JobStatus::Failed => "Translation failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// State of the workflow state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    FileUploaded,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl WorkflowState {
    /// States in which a job id may be present.
    pub fn may_hold_job_id(self) -> bool {
        matches!(
            self,
            WorkflowState::Submitting
                | WorkflowState::Polling
                | WorkflowState::Completed
                | WorkflowState::Failed
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::FileUploaded => "file_uploaded",
            WorkflowState::Submitting => "submitting",
            WorkflowState::Polling => "polling",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ── Naming ───────────────────────────────────────────────────────────────

static UNSAFE_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

static PRESENTATION_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(ppt|pptx)$").expect("valid regex"));

/// Reduce a user filename to characters that are safe in an object key.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let cleaned = UNSAFE_KEY_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Fresh, collision-free object key for an upload: `<uuid>/<filename>`.
pub fn object_key_for(filename: &str) -> String {
    format!("{}/{}", Uuid::new_v4().simple(), sanitize_filename(filename))
}

/// Display name for a translated presentation: `deck.pptx` → `deck-translated.pptx`.
pub fn translated_filename(original: &str) -> String {
    if original.trim().is_empty() {
        return "translated-file.pptx".to_string();
    }
    let stem = PRESENTATION_EXT.replace(original, "");
    format!("{stem}-translated.pptx")
}
