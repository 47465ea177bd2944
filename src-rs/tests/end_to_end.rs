use std::future::pending;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use menuchat_tasks::api::TaskServer;
use menuchat_tasks::jobs::{menu_analysis, JobFuture, JobRegistry, ProgressReporter};
use menuchat_tasks::{
    track_job, ClientConfig, FetchError, PollerConfig, PollerState, ServerConfig, SubmitError, TaskApi,
    TaskClient, TaskError, TaskObserver, TaskPoller, TaskStatus,
};
use serde_json::{json, Value};

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<u8>>,
    completed: Mutex<Vec<Value>>,
    failed: Mutex<Vec<TaskError>>,
}

impl TaskObserver for Recorder {
    fn on_progress(&self, progress: u8, _message: &str) {
        self.progress.lock().unwrap().push(progress);
    }

    fn on_complete(&self, result: &Value) {
        self.completed.lock().unwrap().push(result.clone());
    }

    fn on_error(&self, error: &TaskError) {
        self.failed.lock().unwrap().push(error.clone());
    }
}

fn registry() -> JobRegistry {
    let registry = JobRegistry::new();
    registry
        .register(
            "staged",
            Arc::new(|_payload: Value, reporter: ProgressReporter| -> JobFuture {
                Box::pin(async move {
                    reporter.report(30, "first stage");
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    reporter.report(70, "second stage");
                    tokio::time::sleep(Duration::from_millis(40)).await;
                    Ok(json!({ "ok": true }))
                })
            }),
        )
        .unwrap();
    registry
        .register(
            "reject",
            Arc::new(|_payload: Value, _reporter: ProgressReporter| -> JobFuture {
                Box::pin(async move { Err(TaskError::new("invalid file")) })
            }),
        )
        .unwrap();
    registry
        .register(
            menu_analysis::KIND,
            menu_analysis::handler(Duration::from_millis(10)),
        )
        .unwrap();
    registry
}

fn spawn_server(config: ServerConfig) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = TaskServer::with_registry(config, registry()).unwrap();
    tokio::spawn(async move {
        let _ = server.serve(listener, pending()).await;
    });
    format!("http://{addr}")
}

fn client(base_url: &str, token: Option<&str>) -> Arc<TaskClient> {
    let config = ClientConfig::new(base_url).with_token(token.map(str::to_string));
    Arc::new(TaskClient::new(&config).unwrap())
}

fn fast_polling() -> PollerConfig {
    PollerConfig::new(Duration::from_millis(20), Duration::from_secs(2)).unwrap()
}

async fn settle(poller: &TaskPoller) -> PollerState {
    tokio::time::timeout(Duration::from_secs(10), poller.wait())
        .await
        .expect("poller did not settle")
}

#[tokio::test]
async fn submitted_job_is_polled_to_completion() {
    let base = spawn_server(ServerConfig::default());
    let recorder = Arc::new(Recorder::default());

    let poller = track_job(
        client(&base, None),
        "staged",
        json!({}),
        fast_polling(),
        recorder.clone(),
    )
    .await
    .unwrap();
    assert_eq!(settle(&poller).await, PollerState::Settled);

    assert_eq!(*recorder.completed.lock().unwrap(), vec![json!({ "ok": true })]);
    assert!(recorder.failed.lock().unwrap().is_empty());

    let progress = recorder.progress.lock().unwrap().clone();
    assert!(!progress.is_empty());
    assert!(progress.iter().all(|p| *p <= 100));
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));

    let snapshot = poller.snapshot().unwrap();
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.progress, 100);
    assert!(snapshot.completed_at.is_some());
}

#[tokio::test]
async fn failed_job_surfaces_backend_error() {
    let base = spawn_server(ServerConfig::default());
    let recorder = Arc::new(Recorder::default());

    let poller = track_job(
        client(&base, None),
        "reject",
        json!({}),
        fast_polling(),
        recorder.clone(),
    )
    .await
    .unwrap();
    assert_eq!(settle(&poller).await, PollerState::Settled);

    assert_eq!(*recorder.failed.lock().unwrap(), vec![TaskError::new("invalid file")]);
    assert!(recorder.completed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn menu_analysis_runs_end_to_end() {
    let base = spawn_server(ServerConfig::default());
    let recorder = Arc::new(Recorder::default());

    let poller = track_job(
        client(&base, None),
        menu_analysis::KIND,
        json!({ "menuId": "m-7", "images": ["front.jpg", "back.jpg"] }),
        fast_polling(),
        recorder.clone(),
    )
    .await
    .unwrap();
    assert_eq!(settle(&poller).await, PollerState::Settled);

    let completed = recorder.completed.lock().unwrap().clone();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0]["menuId"], "m-7");
    assert_eq!(completed[0]["imagesAnalyzed"], 2);
}

#[tokio::test]
async fn invalid_menu_payload_fails_the_task() {
    let base = spawn_server(ServerConfig::default());
    let recorder = Arc::new(Recorder::default());

    let poller = track_job(
        client(&base, None),
        menu_analysis::KIND,
        json!({ "images": [] }),
        fast_polling(),
        recorder.clone(),
    )
    .await
    .unwrap();
    assert_eq!(settle(&poller).await, PollerState::Settled);

    let failed = recorder.failed.lock().unwrap().clone();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].code.as_deref(), Some("invalid_payload"));
}

#[tokio::test]
async fn unknown_kind_is_a_submission_error() {
    let base = spawn_server(ServerConfig::default());
    let err = client(&base, None)
        .submit("translate-menu", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Status { status: 404, .. }), "{err}");
}

#[tokio::test]
async fn non_json_body_is_rejected() {
    let base = spawn_server(ServerConfig::default());
    let resp = reqwest::Client::new()
        .post(format!("{base}/jobs/staged"))
        .header("Content-Type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let base = spawn_server(ServerConfig::default());
    let api = client(&base, None);

    let err = api.fetch("task_missing").await.unwrap_err();
    assert_eq!(err, FetchError::NotFound("task_missing".to_string()));

    let recorder = Arc::new(Recorder::default());
    let poller = TaskPoller::new(api, fast_polling(), recorder.clone());
    assert!(poller.start("task_missing"));
    assert_eq!(settle(&poller).await, PollerState::Settled);
    let failed = recorder.failed.lock().unwrap().clone();
    assert_eq!(failed[0].code.as_deref(), Some("not_found"));
}

#[tokio::test]
async fn ids_that_look_like_paths_are_not_found() {
    let base = spawn_server(ServerConfig::default());
    let api = client(&base, None);

    let err = api.fetch("../health").await.unwrap_err();
    assert_eq!(err, FetchError::NotFound("../health".to_string()));

    let recorder = Arc::new(Recorder::default());
    let poller = TaskPoller::new(api, fast_polling(), recorder.clone());
    assert!(poller.start("../tasks"));
    assert_eq!(settle(&poller).await, PollerState::Settled);
    let failed = recorder.failed.lock().unwrap().clone();
    assert_eq!(failed[0].code.as_deref(), Some("not_found"));
}

/// Backend that accepts every job without a usable `taskId` and counts
/// status requests.
fn spawn_careless_backend(fetches: Arc<AtomicUsize>) -> String {
    async fn count_fetch(State(fetches): State<Arc<AtomicUsize>>) -> StatusCode {
        fetches.fetch_add(1, Ordering::SeqCst);
        StatusCode::NOT_FOUND
    }

    let app = Router::new()
        .route("/jobs/empty", post(|| async { (StatusCode::ACCEPTED, Json(json!({}))) }))
        .route(
            "/jobs/blank",
            post(|| async { (StatusCode::ACCEPTED, Json(json!({ "taskId": "  " }))) }),
        )
        .route("/jobs/text", post(|| async { (StatusCode::ACCEPTED, "accepted") }))
        .route("/tasks/:task_id", get(count_fetch))
        .with_state(fetches);

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(async move {
        let _ = server.await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn accepted_job_without_task_id_is_a_submission_error() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let base = spawn_careless_backend(fetches.clone());
    let recorder = Arc::new(Recorder::default());

    for kind in ["empty", "blank", "text"] {
        let result = track_job(
            client(&base, None),
            kind,
            json!({}),
            fast_polling(),
            recorder.clone(),
        )
        .await;
        match result {
            Err(err @ SubmitError::MalformedResponse(_)) => {
                assert!(err.to_string().starts_with("submission failed"), "{err}");
            }
            Err(other) => panic!("{kind}: unexpected error {other}"),
            Ok(_) => panic!("{kind}: submission should have failed"),
        }
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
    assert!(recorder.progress.lock().unwrap().is_empty());
    assert!(recorder.failed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bearer_token_is_enforced() {
    let base = spawn_server(ServerConfig {
        token: Some("secret".to_string()),
        ..ServerConfig::default()
    });

    let health = reqwest::get(format!("{base}/health")).await.unwrap();
    assert!(health.status().is_success());

    let err = client(&base, None)
        .submit("staged", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Status { status: 401, .. }), "{err}");

    let err = client(&base, Some("wrong"))
        .fetch("anything")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 401, .. }), "{err}");

    let authorized = client(&base, Some("secret"));
    let task_id = authorized.submit("staged", json!({})).await.unwrap();
    let task = authorized.fetch(&task_id).await.unwrap();
    assert_eq!(task.task_id, task_id);
    assert_eq!(task.kind, "staged");
}

#[tokio::test]
async fn lists_newest_tasks() {
    let base = spawn_server(ServerConfig::default());
    let api = client(&base, None);
    for _ in 0..3 {
        api.submit("staged", json!({})).await.unwrap();
    }
    assert_eq!(api.list_tasks(2).await.unwrap().len(), 2);
    assert_eq!(api.list_tasks(10).await.unwrap().len(), 3);
}
