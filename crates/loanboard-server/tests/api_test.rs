//! End-to-end tests for the HTTP API, driven through the router without a socket.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use loanboard_server::logging::REQUEST_ID_HEADER;
use loanboard_server::{AppState, router};
use loanboard_training::{
    PipelineCommand, ProcessTrainer, ProgressSink, ProjectLayout, RunOutput, Trainer, TrainingResult,
    TrainingRunId, TrainingService,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "loanboard-test-boundary";

const WRITE_ALL_ARTIFACTS: &str = r#"
mkdir -p reports/lime_explanations reports/shap_explanations
printf 'png' > reports/confusion_matrix.png
printf 'feature,importance\nincome,0.4\n' > reports/feature_importance.csv
"#;

fn script_app(temp: &TempDir, script: &str) -> (Router, ProjectLayout) {
    let layout = ProjectLayout::new(temp.path().to_path_buf());
    layout.ensure_dirs().unwrap();
    std::fs::write(temp.path().join("pipeline.sh"), script).unwrap();
    let command = PipelineCommand::for_layout(&layout, "sh").with_args(["pipeline.sh"]);
    let service = TrainingService::new(layout.clone(), Arc::new(ProcessTrainer::new(command)));
    (router(AppState::new(service), None), layout)
}

fn trainer_app(temp: &TempDir, trainer: Arc<dyn Trainer>) -> (Router, TrainingService) {
    let layout = ProjectLayout::new(temp.path().to_path_buf());
    layout.ensure_dirs().unwrap();
    let service = TrainingService::new(layout, trainer);
    (router(AppState::new(service.clone()), None), service)
}

fn multipart_body(field: &str, filename: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn write_dataset(root: &Path) {
    std::fs::create_dir_all(root.join("data")).unwrap();
    std::fs::write(root.join("data").join("loan_data.csv"), "income,approved\n1,1\n").unwrap();
}

/// Counts invocations and finishes immediately with exit code 0.
#[derive(Default)]
struct CountingTrainer {
    calls: AtomicUsize,
}

#[async_trait]
impl Trainer for CountingTrainer {
    fn id(&self) -> &'static str {
        "counting"
    }

    async fn run(&self, run_id: &TrainingRunId, _progress: &dyn ProgressSink) -> TrainingResult<RunOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = chrono::Utc::now();
        Ok(RunOutput {
            run_id: run_id.clone(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            started_at: now,
            finished_at: now,
        })
    }
}

/// Blocks until released, so a run can be held in flight.
struct GatedTrainer {
    release: tokio::sync::Semaphore,
}

#[async_trait]
impl Trainer for GatedTrainer {
    fn id(&self) -> &'static str {
        "gated"
    }

    async fn run(&self, run_id: &TrainingRunId, _progress: &dyn ProgressSink) -> TrainingResult<RunOutput> {
        let _permit = self.release.acquire().await.unwrap();
        let now = chrono::Utc::now();
        Ok(RunOutput {
            run_id: run_id.clone(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "released\n".to_string(),
            started_at: now,
            finished_at: now,
        })
    }
}

struct PanickingTrainer;

#[async_trait]
impl Trainer for PanickingTrainer {
    fn id(&self) -> &'static str {
        "panicking"
    }

    async fn run(&self, _run_id: &TrainingRunId, _progress: &dyn ProgressSink) -> TrainingResult<RunOutput> {
        panic!("secret internal detail");
    }
}

#[tokio::test]
async fn test_upload_stores_file_under_fixed_name() {
    let temp = TempDir::new().unwrap();
    let (app, _) = trainer_app(&temp, Arc::new(CountingTrainer::default()));
    let contents = b"loan_id,income,approved\n1,52000,1\n2,18000,0\n";

    let (status, body) = send(&app, upload_request(multipart_body("file", "anything.csv", contents))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "File uploaded successfully" }));
    assert_eq!(std::fs::read(temp.path().join("data").join("loan_data.csv")).unwrap(), contents);
    assert!(!temp.path().join("data").join("anything.csv").exists());
}

#[tokio::test]
async fn test_upload_overwrites_previous_dataset() {
    let temp = TempDir::new().unwrap();
    let (app, _) = trainer_app(&temp, Arc::new(CountingTrainer::default()));

    send(&app, upload_request(multipart_body("file", "old.csv", b"old,data\n"))).await;
    let (status, _) = send(&app, upload_request(multipart_body("file", "new.csv", b"new\n"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(std::fs::read(temp.path().join("data").join("loan_data.csv")).unwrap(), b"new\n");
}

#[tokio::test]
async fn test_upload_larger_than_default_body_limit_is_stored_intact() {
    let temp = TempDir::new().unwrap();
    let (app, _) = trainer_app(&temp, Arc::new(CountingTrainer::default()));
    let mut contents = b"loan_id,income,approved\n".to_vec();
    for i in 0..200_000 {
        contents.extend_from_slice(format!("{i},{},{}\n", 20_000 + i, i % 2).as_bytes());
    }
    assert!(contents.len() > 2 * 1024 * 1024);

    let (status, _) = send(&app, upload_request(multipart_body("file", "big.csv", &contents))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(std::fs::read(temp.path().join("data").join("loan_data.csv")).unwrap(), contents);
    assert_eq!(std::fs::read_dir(temp.path().join("data")).unwrap().count(), 1);
}

#[tokio::test]
async fn test_upload_without_file_part_is_bad_request() {
    let temp = TempDir::new().unwrap();
    let (app, _) = trainer_app(&temp, Arc::new(CountingTrainer::default()));

    let (status, body) = send(&app, upload_request(multipart_body("notes", "readme.txt", b"hello"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No file uploaded" }));
    assert!(!temp.path().join("data").join("loan_data.csv").exists());
}

#[tokio::test]
async fn test_upload_non_multipart_is_bad_request() {
    let temp = TempDir::new().unwrap();
    let (app, _) = trainer_app(&temp, Arc::new(CountingTrainer::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_train_without_dataset_spawns_nothing() {
    let temp = TempDir::new().unwrap();
    let trainer = Arc::new(CountingTrainer::default());
    let (app, _) = trainer_app(&temp, trainer.clone());

    let (status, body) = send(&app, empty_request("POST", "/api/train")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Data file not found. Please upload the data first." }));
    assert_eq!(trainer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_second_train_request_conflicts_while_first_runs() {
    let temp = TempDir::new().unwrap();
    write_dataset(temp.path());
    let trainer = Arc::new(GatedTrainer { release: tokio::sync::Semaphore::new(0) });
    let (app, service) = trainer_app(&temp, trainer.clone());

    let first = {
        let app = app.clone();
        tokio::spawn(async move { send(&app, empty_request("POST", "/api/train")).await })
    };
    while !service.is_running() {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let (status, body) = send(&app, empty_request("POST", "/api/train")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "error": "A training run is already in progress" }));

    trainer.release.add_permits(1);
    let (status, body) = first.await.unwrap();
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["details"], "released\n");
}

#[tokio::test]
async fn test_handler_panic_becomes_generic_error() {
    let temp = TempDir::new().unwrap();
    write_dataset(temp.path());
    let (app, service) = trainer_app(&temp, Arc::new(PanickingTrainer));

    let (status, body) = send(&app, empty_request("POST", "/api/train")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Something went wrong!" }));
    assert!(!service.is_running(), "slot must be released after a panicking run");
}

#[tokio::test]
async fn test_results_before_any_run_reports_absent_and_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let (app, _) = trainer_app(&temp, Arc::new(CountingTrainer::default()));

    let (status, first) = send(&app, empty_request("GET", "/api/results")).await;
    let (_, second) = send(&app, empty_request("GET", "/api/results")).await;

    assert_eq!(status, StatusCode::OK);
    for key in ["confusionMatrix", "featureImportance", "limeExplanations", "shapExplanations"] {
        assert_eq!(first[key], Value::Null, "{key} should be null");
        assert_eq!(first["fileStatus"][key], json!(false), "{key} should not exist");
    }
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let temp = TempDir::new().unwrap();
    let (app, _) = trainer_app(&temp, Arc::new(CountingTrainer::default()));

    let response = app.oneshot(empty_request("GET", "/api/results")).await.unwrap();

    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

#[cfg(unix)]
#[tokio::test]
async fn test_train_success_then_results_present() {
    let temp = TempDir::new().unwrap();
    let script = format!("echo 'Running: Loan Model Training'\n{WRITE_ALL_ARTIFACTS}\necho 'Pipeline Completed Successfully!'\n");
    let (app, _) = script_app(&temp, &script);
    send(&app, upload_request(multipart_body("file", "loans.csv", b"income,approved\n1,1\n"))).await;

    let (status, body) = send(&app, empty_request("POST", "/api/train")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Training completed successfully");
    assert_eq!(body["output"], "Running: Loan Model Training\nPipeline Completed Successfully!\n");

    let (_, results) = send(&app, empty_request("GET", "/api/results")).await;
    assert_eq!(results["confusionMatrix"], "/reports/confusion_matrix.png");
    assert_eq!(results["featureImportance"], "/reports/feature_importance.csv");
    assert_eq!(results["limeExplanations"], "/reports/lime_explanations/");
    assert_eq!(results["shapExplanations"], "/reports/shap_explanations/");
    assert!(results["fileStatus"].as_object().unwrap().values().all(|v| v == &json!(true)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_train_nonzero_exit_returns_stderr_details() {
    let temp = TempDir::new().unwrap();
    let (app, _) = script_app(&temp, "echo 'partial output'\necho 'model fit failed' >&2\necho 'exiting' >&2\nexit 1\n");
    write_dataset(temp.path());

    let (status, body) = send(&app, empty_request("POST", "/api/train")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Training failed");
    assert_eq!(body["details"], "model fit failed\nexiting\n");
    assert_eq!(body["output"], "partial output\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_train_missing_artifact_is_named() {
    let temp = TempDir::new().unwrap();
    let script = "mkdir -p reports/lime_explanations reports/shap_explanations\nprintf 'png' > reports/confusion_matrix.png\n";
    let (app, _) = script_app(&temp, script);
    write_dataset(temp.path());

    let (status, body) = send(&app, empty_request("POST", "/api/train")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({
            "error": "Training completed but some files were not generated",
            "missingFiles": ["reports/feature_importance.csv"],
        })
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_reports_are_served_statically() {
    let temp = TempDir::new().unwrap();
    let (app, layout) = script_app(&temp, "exit 0\n");
    std::fs::write(layout.reports_dir().join("feature_importance.csv"), "feature,importance\n").unwrap();

    let response = app.oneshot(empty_request("GET", "/reports/feature_importance.csv")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"feature,importance\n");
}
