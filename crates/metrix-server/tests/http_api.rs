#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde_json::{json, Value};
use tower::ServiceExt;

use metrix_core::error::{MetrixError, Result};
use metrix_core::{MetricStore, MetricValue, Snapshot};
use metrix_server::app_state::AppState;
use metrix_server::bootstrap::bootstrap;
use metrix_server::config::ServerConfig;
use metrix_server::router::build_router;
use metrix_server::storage::{DurableBackend, FileSnapshot, JobState, SnapshotSink};

#[derive(Default)]
struct FakeBackend {
    down: bool,
    recorded: Mutex<Vec<MetricValue>>,
}

#[async_trait]
impl DurableBackend for FakeBackend {
    async fn ping(&self) -> Result<()> {
        if self.down {
            Err(MetrixError::Connect("connection refused".into()))
        } else {
            Ok(())
        }
    }

    async fn record(&self, values: &[MetricValue]) -> Result<()> {
        self.recorded.lock().unwrap().extend_from_slice(values);
        Ok(())
    }
}

fn app() -> (Router, Arc<MetricStore>) {
    let store = Arc::new(MetricStore::new());
    let state = AppState::new(ServerConfig::default(), Arc::clone(&store));
    (build_router(state), store)
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn gzip(raw: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(raw).unwrap();
    enc.finish().unwrap()
}

fn error_code(body: &[u8]) -> String {
    let v: Value = serde_json::from_slice(body).unwrap();
    v["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn text_update_then_query() {
    let (app, _) = app();

    let (status, _, _) = call(&app, post("/update/gauge/Alloc/123.45")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, body) = call(&app, get("/value/gauge/Alloc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"123.45");

    for _ in 0..2 {
        let (status, _, _) = call(&app, post("/update/counter/PollCount/1")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, _, body) = call(&app, get("/value/counter/PollCount")).await;
    assert_eq!(&body[..], b"2");
}

#[tokio::test]
async fn gauge_is_overwritten_and_rendered_shortest() {
    let (app, _) = app();
    call(&app, post("/update/gauge/Alloc/5")).await;
    call(&app, post("/update/gauge/Alloc/7.0")).await;
    let (_, _, body) = call(&app, get("/value/gauge/Alloc")).await;
    assert_eq!(&body[..], b"7");
}

#[tokio::test]
async fn missing_metric_is_404_unknown_kind_is_400() {
    let (app, _) = app();

    let (status, _, body) = call(&app, get("/value/gauge/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (status, _, body) = call(&app, get("/value/histogram/x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn invalid_text_updates_are_400_and_leave_store_alone() {
    let (app, store) = app();

    for uri in [
        "/update/unknown/x/1",
        "/update/gauge/x/abc",
        "/update/gauge/x/NaN",
        "/update/counter/c/1.5",
        "/update/counter/c/-1",
    ] {
        let (status, _, _) = call(&app, post(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn json_update_echoes_post_merge_total() {
    let (app, _) = app();
    let body = json!({"id": "PollCount", "type": "counter", "delta": 5});

    call(&app, post_json("/update/", body.clone())).await;
    let (status, _, resp) = call(&app, post_json("/update/", body)).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&resp).unwrap();
    assert_eq!(v, json!({"id": "PollCount", "type": "counter", "delta": 10}));

    let body = json!({"id": "Alloc", "type": "gauge", "value": 1.5});
    let (status, _, resp) = call(&app, post_json("/update/", body)).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&resp).unwrap();
    assert_eq!(v["value"], json!(1.5));
    assert!(v.get("delta").is_none());
}

#[tokio::test]
async fn json_update_requires_matching_field() {
    let (app, store) = app();
    let bad = json!({"id": "Alloc", "type": "gauge", "delta": 1});
    let (status, _, body) = call(&app, post_json("/update/", bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let (status, _, _) = call(&app, post_json("/update/", json!("not an object"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(store.is_empty());
}

#[tokio::test]
async fn batch_update_is_all_or_nothing() {
    let (app, store) = app();

    let good = json!([
        {"id": "Alloc", "type": "gauge", "value": 10.0},
        {"id": "PollCount", "type": "counter", "delta": 2},
        {"id": "PollCount", "type": "counter", "delta": 3}
    ]);
    let (status, _, resp) = call(&app, post_json("/updates/", good)).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&resp).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 3);
    assert_eq!(v[2]["delta"], json!(5));

    let bad = json!([
        {"id": "Alloc", "type": "gauge", "value": 99.0},
        {"id": "PollCount", "type": "counter", "delta": -1}
    ]);
    let (status, _, _) = call(&app, post_json("/update/", bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.get_gauge("Alloc"), Some(10.0));
    assert_eq!(store.get_counter("PollCount"), Some(5));
}

#[tokio::test]
async fn json_value_query() {
    let (app, _) = app();
    call(&app, post("/update/counter/PollCount/4")).await;

    let (status, _, resp) =
        call(&app, post_json("/value/", json!({"id": "PollCount", "type": "counter"}))).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&resp).unwrap();
    assert_eq!(v["delta"], json!(4));

    let missing = json!({"id": "Alloc", "type": "gauge"});
    let (status, _, _) = call(&app, post_json("/value/", missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gzip_request_body_is_inflated() {
    let (app, store) = app();
    let raw = json!({"id": "HeapInuse", "type": "gauge", "value": 42.0}).to_string();

    let req = Request::builder()
        .method("POST")
        .uri("/update/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(gzip(raw.as_bytes())))
        .unwrap();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.get_gauge("HeapInuse"), Some(42.0));

    let corrupt = Request::builder()
        .method("POST")
        .uri("/update/")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(raw))
        .unwrap();
    let (status, _, _) = call(&app, corrupt).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn inflated_body_over_the_cap_is_refused() {
    let (app, store) = app();
    let mut raw = json!({"id": "Big", "type": "gauge", "value": 1.0}).to_string();
    raw.push_str(&" ".repeat(2 << 20));

    let req = Request::builder()
        .method("POST")
        .uri("/update/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(gzip(raw.as_bytes())))
        .unwrap();
    let (status, _, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(store.get_gauge("Big"), None);
}

#[tokio::test]
async fn response_is_gzipped_on_request() {
    let (app, _) = app();
    call(&app, post("/update/gauge/Alloc/3.25")).await;
    call(&app, post("/update/counter/PollCount/7")).await;

    let req = Request::builder()
        .uri("/")
        .header(header::ACCEPT_ENCODING, "gzip, deflate")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_ENCODING], "gzip");

    let mut html = String::new();
    GzDecoder::new(&body[..]).read_to_string(&mut html).unwrap();
    assert!(html.contains("Alloc"));
    assert!(html.contains("PollCount"));

    // Without the header the same page comes back plain.
    let (_, headers, body) = call(&app, get("/")).await;
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert!(String::from_utf8(body.to_vec()).unwrap().contains("Alloc"));
}

#[tokio::test]
async fn index_lists_metrics_sorted() {
    let (app, _) = app();
    call(&app, post("/update/gauge/Zeta/1")).await;
    call(&app, post("/update/gauge/Alpha/2")).await;
    call(&app, post("/update/counter/PollCount/3")).await;

    let (status, headers, body) = call(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));

    let html = String::from_utf8(body.to_vec()).unwrap();
    let alpha = html.find("<li>Alpha: 2</li>").unwrap();
    let zeta = html.find("<li>Zeta: 1</li>").unwrap();
    assert!(alpha < zeta);
    assert!(html.contains("<li>PollCount: 3</li>"));
}

#[tokio::test]
async fn ping_reflects_backend() {
    let (app, _) = app();
    let (status, _, body) = call(&app, get("/ping")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body), "CONNECT");

    let up = AppState::new(ServerConfig::default(), Arc::new(MetricStore::new()))
        .with_backend(Arc::new(FakeBackend::default()));
    let (status, _, _) = call(&build_router(up), get("/ping")).await;
    assert_eq!(status, StatusCode::OK);

    let down = AppState::new(ServerConfig::default(), Arc::new(MetricStore::new()))
        .with_backend(Arc::new(FakeBackend { down: true, ..Default::default() }));
    let (status, _, _) = call(&build_router(down), get("/ping")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn accepted_updates_are_written_through() {
    let backend = Arc::new(FakeBackend::default());
    let state = AppState::new(ServerConfig::default(), Arc::new(MetricStore::new()))
        .with_backend(backend.clone());
    let app = build_router(state);

    call(&app, post("/update/counter/PollCount/2")).await;
    call(&app, post("/update/counter/PollCount/3")).await;
    call(&app, post("/update/counter/PollCount/-3")).await;

    let recorded = backend.recorded.lock().unwrap().clone();
    assert_eq!(
        recorded,
        vec![
            MetricValue::Counter { name: "PollCount".into(), total: 2 },
            MetricValue::Counter { name: "PollCount".into(), total: 5 },
        ]
    );
}

#[tokio::test]
async fn sync_mode_saves_after_every_update() {
    let dir = tempfile::tempdir().unwrap();
    let file = Arc::new(FileSnapshot::new(dir.path().join("metrics-db.json")));
    let state = AppState::new(ServerConfig::default(), Arc::new(MetricStore::new()))
        .with_sync_sinks(vec![file.clone() as Arc<dyn SnapshotSink>]);
    let app = build_router(state);

    call(&app, post("/update/gauge/Alloc/1.5")).await;
    call(&app, post("/update/counter/PollCount/7")).await;

    let snap = file.load().await.unwrap().unwrap();
    assert_eq!(snap.gauges.get("Alloc"), Some(&1.5));
    assert_eq!(snap.counters.get("PollCount"), Some(&7));
}

fn file_config(path: &std::path::Path, strict: bool) -> ServerConfig {
    let mut cfg = ServerConfig::default();
    cfg.storage.file_path = Some(path.display().to_string());
    cfg.storage.store_interval_secs = 0;
    cfg.storage.restore = true;
    cfg.storage.restore_strict = strict;
    cfg
}

#[tokio::test]
async fn bootstrap_restores_serves_and_saves_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics-db.json");

    let mut prior = Snapshot::default();
    prior.counters.insert("PollCount".into(), 40);
    tokio::fs::write(&path, prior.to_json().unwrap()).await.unwrap();

    let collector = bootstrap(file_config(&path, true)).await.unwrap();
    assert_eq!(collector.job_state(), JobState::Running);
    assert_eq!(collector.state().store().get_counter("PollCount"), Some(40));

    let app = collector.router();
    call(&app, post("/update/counter/PollCount/2")).await;
    collector.shutdown().await.unwrap();

    let saved = FileSnapshot::new(&path).load().await.unwrap().unwrap();
    assert_eq!(saved.counters.get("PollCount"), Some(&42));
}

#[tokio::test]
async fn corrupt_prior_state_respects_restore_strict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics-db.json");
    tokio::fs::write(&path, b"{not json").await.unwrap();

    let err = bootstrap(file_config(&path, true)).await.err().unwrap();
    assert_eq!(err.client_code().as_str(), "PERSISTENCE");

    let collector = bootstrap(file_config(&path, false)).await.unwrap();
    assert!(collector.state().store().is_empty());
    collector.shutdown().await.unwrap();
}
