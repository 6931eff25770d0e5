//! Integration tests for the translation workflow.
//!
//! A single `wiremock` server plays both the backend API (under `/api/`) and
//! object storage (under `/storage/`). Poll intervals are shortened to a few
//! milliseconds so whole runs finish quickly.

use edgequake_doctranslate::{
    ClientConfig, JobStatus, Level, TranslateError, UploadFile, Workflow, WorkflowObserver,
    WorkflowState,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const FAST_POLL_MS: u64 = 10;

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::builder()
        .api_base_url(format!("{}/api/", server.uri()))
        .original_bucket("ppt-translation-original")
        .translated_bucket("ppt-translation-translated")
        .poll_interval_ms(FAST_POLL_MS)
        .build()
        .expect("valid test config")
}

/// Records every observer callback.
#[derive(Default)]
struct Recorder {
    transitions: Mutex<Vec<(WorkflowState, WorkflowState)>>,
    statuses: Mutex<Vec<JobStatus>>,
    errors: Mutex<Vec<String>>,
}

impl WorkflowObserver for Recorder {
    fn on_transition(&self, from: WorkflowState, to: WorkflowState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_status(&self, _job_id: &str, status: JobStatus) {
        self.statuses.lock().unwrap().push(status);
    }

    fn on_error(&self, _state: WorkflowState, error: &TranslateError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

fn workflow(server: &MockServer) -> (Workflow, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let wf = Workflow::new(config(server))
        .unwrap()
        .with_observer(recorder.clone());
    (wf, recorder)
}

fn deck() -> UploadFile {
    UploadFile::new("deck.pptx", b"PK\x03\x04 quarterly results".to_vec())
}

/// Presigned PUT upload that storage accepts.
async fn mount_put_upload(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/presigned-upload-url"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "presigned_url": format!("{}/storage/put", server.uri()) })),
        )
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/storage/put"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

async fn mount_submit(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobId": job_id })))
        .mount(server)
        .await;
}

/// Answer the next status check for `job_id` with `status`, once.
async fn mount_status_once(server: &MockServer, job_id: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .and(query_param("jobId", job_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": status })))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

async fn mount_status_forever(server: &MockServer, job_id: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .and(query_param("jobId", job_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": status })))
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, p: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == p)
        .collect()
}

async fn mount_result(server: &MockServer, key: &str) {
    Mock::given(method("GET"))
        .and(path("/api/result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "translatedFileKey": key })))
        .mount(server)
        .await;
}

fn config_with_interval(server: &MockServer, poll_interval_ms: u64) -> ClientConfig {
    ClientConfig::builder()
        .api_base_url(format!("{}/api/", server.uri()))
        .original_bucket("orig")
        .translated_bucket("done")
        .poll_interval_ms(poll_interval_ms)
        .build()
        .unwrap()
}

/// Upload and submit, leaving the workflow in `Polling` on job `job_id`.
async fn polling_workflow(server: &MockServer, job_id: &str) -> (Workflow, Arc<Recorder>) {
    mount_put_upload(server).await;
    mount_submit(server, job_id).await;
    let (mut wf, rec) = workflow(server);
    wf.upload(deck()).await.unwrap();
    wf.start_translation("en", "es").await.unwrap();
    assert_eq!(wf.state(), WorkflowState::Polling);
    (wf, rec)
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_en_to_es() {
    let server = MockServer::start().await;
    mount_put_upload(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/translate"))
        .and(body_partial_json(
            json!({ "sourceLanguage": "en", "targetLanguage": "es" }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobId": "j1" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_status_once(&server, "j1", "processing").await;
    mount_status_once(&server, "j1", "completed").await;
    Mock::given(method("GET"))
        .and(path("/api/result"))
        .and(query_param("jobId", "j1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "translatedFileKey": "f1-translated" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("deck.pptx");
    std::fs::write(&input, b"PK\x03\x04 slides").unwrap();

    let (mut wf, rec) = workflow(&server);
    let key = wf.translate_file(&input, "en", "es").await.unwrap();

    assert_eq!(key, "f1-translated");
    assert_eq!(wf.state(), WorkflowState::Completed);
    let job = wf.job().unwrap();
    assert_eq!(job.job_id.as_deref(), Some("j1"));
    assert_eq!(job.translated_file_key.as_deref(), Some("f1-translated"));
    assert_eq!(job.translated_filename(), "deck-translated.pptx");
    assert!(wf.last_error().is_none());

    // The submitted file key is the one the upload produced.
    let submits = requests_to(&server, "/api/translate").await;
    let body: serde_json::Value = serde_json::from_slice(&submits[0].body).unwrap();
    assert_eq!(body["fileKey"], job.file_key.as_str());
    assert!(job.file_key.ends_with("/deck.pptx"), "got {}", job.file_key);

    assert_eq!(
        *rec.transitions.lock().unwrap(),
        vec![
            (WorkflowState::Idle, WorkflowState::FileUploaded),
            (WorkflowState::FileUploaded, WorkflowState::Submitting),
            (WorkflowState::Submitting, WorkflowState::Polling),
            (WorkflowState::Polling, WorkflowState::Completed),
        ]
    );
    assert_eq!(
        *rec.statuses.lock().unwrap(),
        vec![JobStatus::Processing, JobStatus::Completed]
    );
}

#[tokio::test]
async fn submission_enters_submitting_and_polling_once_each() {
    let server = MockServer::start().await;
    let (wf, rec) = polling_workflow(&server, "j1").await;

    let transitions = rec.transitions.lock().unwrap().clone();
    let into = |s: WorkflowState| transitions.iter().filter(|(_, to)| *to == s).count();
    assert_eq!(into(WorkflowState::Submitting), 1);
    assert_eq!(into(WorkflowState::Polling), 1);

    // One structured record per transition into Submitting and Polling.
    let records = wf.tracer().records_for(wf.run_id());
    let logged = |s: &str| {
        records
            .iter()
            .filter(|r| r.level == Level::Info && r.message.ends_with(&format!("-> {s}")))
            .count()
    };
    assert_eq!(logged("submitting"), 1);
    assert_eq!(logged("polling"), 1);
}

#[tokio::test]
async fn pending_processing_completed_fetches_result_once() {
    let server = MockServer::start().await;
    let (mut wf, rec) = polling_workflow(&server, "j7").await;
    mount_status_once(&server, "j7", "pending").await;
    mount_status_once(&server, "j7", "processing").await;
    mount_status_once(&server, "j7", "completed").await;
    Mock::given(method("GET"))
        .and(path("/api/result"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "translatedFileKey": "out/deck.pptx" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let key = wf.poll_until_resolved().await.unwrap();
    assert_eq!(key, "out/deck.pptx");
    assert_eq!(requests_to(&server, "/api/status").await.len(), 3);
    assert_eq!(
        *rec.statuses.lock().unwrap(),
        vec![JobStatus::Pending, JobStatus::Processing, JobStatus::Completed]
    );
}

#[tokio::test]
async fn first_status_check_is_sent_without_waiting() {
    let server = MockServer::start().await;
    mount_put_upload(&server).await;
    mount_submit(&server, "quick").await;
    mount_status_forever(&server, "quick", "completed").await;
    mount_result(&server, "quick-translated").await;

    let mut wf = Workflow::new(config_with_interval(&server, 3000)).unwrap();
    wf.upload(deck()).await.unwrap();
    wf.start_translation("en", "es").await.unwrap();

    let key = tokio::time::timeout(Duration::from_millis(1500), wf.poll_until_resolved())
        .await
        .expect("an already-finished job resolves before one interval passes")
        .unwrap();
    assert_eq!(key, "quick-translated");
    assert_eq!(requests_to(&server, "/api/status").await.len(), 1);
}

#[tokio::test]
async fn pending_answer_waits_one_interval_before_next_check() {
    let server = MockServer::start().await;
    mount_put_upload(&server).await;
    mount_submit(&server, "j1").await;
    mount_status_once(&server, "j1", "pending").await;
    mount_status_once(&server, "j1", "completed").await;
    mount_result(&server, "f1-translated").await;

    let mut wf = Workflow::new(config_with_interval(&server, 300)).unwrap();
    wf.upload(deck()).await.unwrap();
    wf.start_translation("en", "es").await.unwrap();

    let started = Instant::now();
    wf.poll_until_resolved().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(requests_to(&server, "/api/status").await.len(), 2);
}

#[tokio::test]
async fn form_post_upload_sends_policy_fields_then_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/presigned-upload-url"))
        .and(body_partial_json(json!({
            "bucket_name": "ppt-translation-original",
            "operation": "put_object"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "post_data": {
                "url": format!("{}/storage/form", server.uri()),
                "fields": { "key": "uploads/deck.pptx", "policy": "eyJwb2xpY3kiOnt9fQ==" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/storage/form"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (mut wf, _) = workflow(&server);
    wf.upload(deck()).await.unwrap();
    assert_eq!(wf.state(), WorkflowState::FileUploaded);

    let form = &requests_to(&server, "/storage/form").await[0];
    let body = String::from_utf8_lossy(&form.body);
    let policy = body.find("name=\"policy\"").expect("policy field");
    let file = body.find("name=\"file\"").expect("file part");
    assert!(policy < file, "file part must be last");
    assert!(body.contains("uploads/deck.pptx"));
}

#[tokio::test]
async fn download_requests_a_fresh_url_every_time() {
    let server = MockServer::start().await;
    let (mut wf, _) = polling_workflow(&server, "j1").await;
    mount_status_forever(&server, "j1", "completed").await;
    Mock::given(method("GET"))
        .and(path("/api/result"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "translatedFileKey": "f1-translated" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/presigned-download-url"))
        .and(body_partial_json(json!({
            "bucket_name": "ppt-translation-translated",
            "object_key": "f1-translated",
            "operation": "get_object"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "presigned_url": format!("{}/storage/get", server.uri()) })),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/get"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hola".to_vec()))
        .mount(&server)
        .await;

    wf.poll_until_resolved().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let dest: PathBuf = dir.path().join("deck-translated.pptx");
    assert_eq!(wf.download_result(&dest).await.unwrap(), 4);
    assert_eq!(std::fs::read(&dest).unwrap(), b"hola");
    assert_eq!(wf.download_result_bytes().await.unwrap(), b"hola");
    assert_eq!(wf.state(), WorkflowState::Completed);
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn validation_errors_make_no_network_call() {
    let server = MockServer::start().await;
    let (mut wf, rec) = workflow(&server);

    let err = wf.start_translation("en", "es").await.unwrap_err();
    assert!(matches!(err, TranslateError::Validation(_)));
    assert_eq!(wf.state(), WorkflowState::Idle);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(rec.errors.lock().unwrap().len(), 1);

    let err = wf
        .upload(UploadFile::new("notes.docx", b"text".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(err, TranslateError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn same_language_is_rejected_before_submission() {
    let server = MockServer::start().await;
    mount_put_upload(&server).await;
    let (mut wf, _) = workflow(&server);
    wf.upload(deck()).await.unwrap();

    let err = wf.start_translation("es", "ES").await.unwrap_err();
    assert!(matches!(err, TranslateError::Validation(_)));
    assert_eq!(wf.state(), WorkflowState::FileUploaded);
    assert!(requests_to(&server, "/api/translate").await.is_empty());
}

// ── Error transitions ────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_job_rolls_back_and_stops_polling() {
    let server = MockServer::start().await;
    let (mut wf, rec) = polling_workflow(&server, "j1").await;
    mount_status_forever(&server, "j1", "failed").await;
    Mock::given(method("GET"))
        .and(path("/api/result"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = wf.poll_until_resolved().await.unwrap_err();
    assert!(matches!(err, TranslateError::JobFailed { .. }), "got {err:?}");
    assert_eq!(wf.state(), WorkflowState::FileUploaded);
    assert_eq!(wf.last_error(), Some("Translation failed. Please try again."));
    let job = wf.job().unwrap();
    assert!(job.job_id.is_none());
    assert!(job.translated_file_key.is_none());

    tokio::time::sleep(Duration::from_millis(FAST_POLL_MS * 5)).await;
    assert_eq!(requests_to(&server, "/api/status").await.len(), 1);

    let errors: Vec<_> = wf
        .tracer()
        .records()
        .into_iter()
        .filter(|r| r.level == Level::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Translation failed. Please try again.");
    assert_eq!(rec.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn status_check_error_rolls_back_to_file_uploaded() {
    let server = MockServer::start().await;
    let (mut wf, _) = polling_workflow(&server, "j1").await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = wf.poll_until_resolved().await.unwrap_err();
    assert!(matches!(err, TranslateError::StatusCheck { status: Some(500), .. }));
    assert_eq!(wf.state(), WorkflowState::FileUploaded);
    assert_eq!(
        wf.last_error(),
        Some("Error checking translation status: Internal Server Error")
    );

    // Exactly one Error record in the whole log, filed under the run and
    // pointing at the failed request.
    let errors: Vec<_> = wf
        .tracer()
        .records()
        .into_iter()
        .filter(|r| r.level == Level::Error)
        .collect();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].request_id, wf.run_id());
    let payload = errors[0].payload.as_ref().expect("error payload");
    assert_eq!(payload["errorKind"], "status_check");
    assert_eq!(payload["status"], 500);

    let status_request = &requests_to(&server, "/api/status").await[0];
    let sent_id = status_request
        .headers
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .unwrap();
    assert_eq!(payload["requestId"], sent_id);
    assert!(wf
        .tracer()
        .records_for(sent_id)
        .iter()
        .any(|r| r.message.contains("-> 500")));
}

#[tokio::test]
async fn submission_failure_rolls_back_and_can_be_retried() {
    let server = MockServer::start().await;
    mount_put_upload(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/translate"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_submit(&server, "j2").await;

    let (mut wf, rec) = workflow(&server);
    wf.upload(deck()).await.unwrap();

    let err = wf.start_translation("en", "fr").await.unwrap_err();
    match err {
        TranslateError::Submission { status, message } => {
            assert_eq!(status, Some(502));
            assert_eq!(message, "Bad Gateway");
        }
        other => panic!("expected Submission, got {other:?}"),
    }
    assert_eq!(wf.state(), WorkflowState::FileUploaded);
    assert!(wf.job().unwrap().job_id.is_none());

    assert_eq!(wf.start_translation("en", "fr").await.unwrap(), "j2");
    assert_eq!(wf.state(), WorkflowState::Polling);
    assert!(rec
        .transitions
        .lock()
        .unwrap()
        .contains(&(WorkflowState::Submitting, WorkflowState::FileUploaded)));
}

#[tokio::test]
async fn rejected_upload_leaves_workflow_idle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/presigned-upload-url"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "presigned_url": format!("{}/storage/put", server.uri()) })),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
        .mount(&server)
        .await;

    let (mut wf, _) = workflow(&server);
    let err = wf.upload(deck()).await.unwrap_err();
    assert!(matches!(err, TranslateError::Transfer { status: 403, .. }));
    assert_eq!(wf.state(), WorkflowState::Idle);
    assert!(wf.job().is_none());
}

// ── Cancellation & reset ─────────────────────────────────────────────────────

#[tokio::test]
async fn reset_during_polling_clears_everything() {
    let server = MockServer::start().await;
    let (mut wf, _) = polling_workflow(&server, "j1").await;
    mount_status_forever(&server, "j1", "processing").await;

    // Abandon the poll loop mid-flight, then reset.
    let _ = tokio::time::timeout(Duration::from_millis(FAST_POLL_MS * 5), wf.poll_until_resolved())
        .await;
    assert_eq!(wf.state(), WorkflowState::Polling);

    wf.reset();
    assert_eq!(wf.state(), WorkflowState::Idle);
    assert!(wf.job().is_none());
    assert!(wf.last_error().is_none());

    let before = requests_to(&server, "/api/status").await.len();
    tokio::time::sleep(Duration::from_millis(FAST_POLL_MS * 5)).await;
    assert_eq!(requests_to(&server, "/api/status").await.len(), before);

    let err = wf.poll_until_resolved().await.unwrap_err();
    assert!(matches!(err, TranslateError::Validation(_)));
}

#[tokio::test]
async fn reset_from_completed_discards_the_finished_job() {
    let server = MockServer::start().await;
    let (mut wf, rec) = polling_workflow(&server, "j1").await;
    mount_status_forever(&server, "j1", "completed").await;
    mount_result(&server, "f1-translated").await;
    wf.poll_until_resolved().await.unwrap();
    assert_eq!(wf.state(), WorkflowState::Completed);

    wf.reset();
    assert_eq!(wf.state(), WorkflowState::Idle);
    assert!(wf.job().is_none());
    assert!(wf.last_error().is_none());
    assert_eq!(
        rec.transitions.lock().unwrap().last(),
        Some(&(WorkflowState::Completed, WorkflowState::Idle))
    );

    // Nothing left to download.
    let err = wf.download_result_bytes().await.unwrap_err();
    assert!(matches!(err, TranslateError::Validation(_)));
    assert!(requests_to(&server, "/api/presigned-download-url").await.is_empty());
}

#[tokio::test]
async fn reset_from_file_uploaded_forgets_the_upload() {
    let server = MockServer::start().await;
    mount_put_upload(&server).await;
    let (mut wf, rec) = workflow(&server);
    wf.upload(deck()).await.unwrap();
    assert_eq!(wf.state(), WorkflowState::FileUploaded);

    wf.reset();
    assert_eq!(wf.state(), WorkflowState::Idle);
    assert!(wf.job().is_none());
    assert_eq!(
        rec.transitions.lock().unwrap().last(),
        Some(&(WorkflowState::FileUploaded, WorkflowState::Idle))
    );

    let err = wf.start_translation("en", "es").await.unwrap_err();
    assert_eq!(err.to_string(), "Please upload a file first");
    assert!(requests_to(&server, "/api/translate").await.is_empty());
}

#[tokio::test]
async fn cancel_handle_stops_polling() {
    let server = MockServer::start().await;
    let (mut wf, _) = polling_workflow(&server, "j1").await;
    mount_status_forever(&server, "j1", "processing").await;

    let handle = wf.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(FAST_POLL_MS * 4)).await;
        handle.cancel();
    });

    let err = wf.poll_until_resolved().await.unwrap_err();
    assert!(matches!(err, TranslateError::Cancelled));
    assert_eq!(wf.state(), WorkflowState::FileUploaded);
    assert!(wf.job().unwrap().job_id.is_none());

    let before = requests_to(&server, "/api/status").await.len();
    tokio::time::sleep(Duration::from_millis(FAST_POLL_MS * 5)).await;
    assert_eq!(requests_to(&server, "/api/status").await.len(), before);

    // A fresh token is armed: the file can be resubmitted.
    assert!(!wf.cancel_handle().is_cancelled());
}

#[tokio::test]
async fn polling_gives_up_after_max_duration() {
    let server = MockServer::start().await;
    mount_put_upload(&server).await;
    mount_submit(&server, "slow").await;
    mount_status_forever(&server, "slow", "processing").await;

    let config = ClientConfig::builder()
        .api_base_url(format!("{}/api/", server.uri()))
        .original_bucket("orig")
        .translated_bucket("done")
        .poll_interval_ms(200)
        .max_poll_duration_secs(Some(1))
        .build()
        .unwrap();
    let mut wf = Workflow::new(config).unwrap();
    wf.upload(deck()).await.unwrap();
    wf.start_translation("en", "de").await.unwrap();

    let err = wf.poll_until_resolved().await.unwrap_err();
    assert!(
        matches!(err, TranslateError::PollTimeout { ref job_id, secs: 1 } if job_id == "slow"),
        "got {err:?}"
    );
    assert_eq!(wf.state(), WorkflowState::FileUploaded);
}

// ── Correlation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn backend_requests_carry_logged_correlation_id() {
    let server = MockServer::start().await;
    let (wf, _) = polling_workflow(&server, "j1").await;

    let submit = &requests_to(&server, "/api/translate").await[0];
    let id = submit
        .headers
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        submit.headers.get("content-type").unwrap().to_str().unwrap(),
        "application/json"
    );

    let records = wf.tracer().records_for(&id);
    assert!(records.len() >= 2, "start and response records: {records:?}");
    assert!(records.iter().any(|r| r.message.contains("-> 200")));
}
