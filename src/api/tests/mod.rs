use super::*;
use crate::config::Config;
use crate::db::Database;
use crate::executor::test_helpers::ScriptedProber;
use crate::types::{JobId, JobKey, JobSpec, JobStatus, fields, pending_fields};
use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


struct TestApp {
    _dir: TempDir,
    state: AppState,
    prober: Arc<ScriptedProber>,
}

impl TestApp {
    async fn new(prober: ScriptedProber) -> Self {
        Self::with_config(prober, |_| {}).await
    }

    async fn with_config(prober: ScriptedProber, tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.database_path = dir.path().join("api.db");
        config.store.namespace = "test:jobs".to_string();
        config.api.probe_failure_exit_delay = Duration::from_millis(50);
        config.api.swagger_ui = false;
        tweak(&mut config);

        let db = Database::new(&config.store.database_path).await.unwrap();
        let prober = Arc::new(prober);
        let state = AppState::new(db, Arc::new(config), prober.clone());

        Self {
            _dir: dir,
            state,
            prober,
        }
    }

    /// Send one request through a fresh router; returns status and JSON body
    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.send_request(request).await
    }

    async fn send_request(&self, request: Request) -> (StatusCode, Value) {
        let response = create_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Specs waiting in the submission queue, oldest first
    async fn queued(&self) -> Vec<JobSpec> {
        self.state
            .db
            .list_range(&self.state.config.store.queue_key, None)
            .await
            .unwrap()
            .iter()
            .map(|raw| serde_json::from_str(raw).unwrap())
            .collect()
    }

    async fn seed_failed(&self, id: &str, failures: u32) -> JobKey {
        let key = JobKey::new(
            self.state.config.store.namespace.clone(),
            JobStatus::Failed,
            JobId::from(id),
        );
        let mut record = pending_fields(&JobSpec::new(format!("https://v.example/{id}")), 1);
        record.insert(fields::STATUS.into(), JobStatus::Failed.as_str().into());
        record.insert(fields::FAILED_COUNT.into(), failures.to_string());
        self.state
            .db
            .hash_set(&key.to_string(), &record)
            .await
            .unwrap();
        key
    }
}

fn specs(urls: &[&str]) -> Vec<JobSpec> {
    urls.iter().map(|url| JobSpec::new(*url)).collect()
}

#[tokio::test]
async fn test_api_server_stops_on_shutdown_signal() {
    let app = TestApp::with_config(ScriptedProber::returning(vec![]), |config| {
        config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;

    let server = tokio::spawn(start_api_server(app.state.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    app.state.shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_api_server_reports_probe_failure_on_exit() {
    let app = TestApp::with_config(ScriptedProber::failing(), |config| {
        config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    })
    .await;

    let server = tokio::spawn(start_api_server(app.state.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    app.state
        .shutdown
        .trigger_after_probe_failure(Duration::from_millis(10));

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(matches!(result, Err(Error::Probe(_))));
}

#[tokio::test]
async fn test_cors_enabled() {
    let app = TestApp::new(ScriptedProber::returning(vec![])).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = create_router(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let app = TestApp::with_config(ScriptedProber::returning(vec![]), |config| {
        config.api.cors_enabled = false;
    })
    .await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = create_router(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();

    assert!(
        response
            .headers()
            .get("access-control-allow-origin")
            .is_none()
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let app = TestApp::with_config(ScriptedProber::returning(vec![]), |config| {
        config.api.cors_origins = vec!["http://allowed.example".to_string()];
    })
    .await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://allowed.example")
        .body(Body::empty())
        .unwrap();
    let response = create_router(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://allowed.example"
    );
}
