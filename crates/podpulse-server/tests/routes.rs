//! Router-level tests for `/health` and `/metrics`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use podpulse_core::{DefaultCollectors, Metric, MetricKind, Registry, SampleError};
use podpulse_server::{app_state::AppState, config::EnvLookup, router::build_router};

fn env(pairs: &[(&str, &str)]) -> EnvLookup {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Arc::new(move |key: &str| map.get(key).cloned())
}

fn app(registry: Arc<Registry>, pairs: &[(&str, &str)]) -> Router {
    build_router(AppState::with_env(registry, env(pairs)))
}

async fn get(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn health_defaults() {
    let (status, ct, body) = get(app(Arc::new(Registry::new()), &[]), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ct.as_deref(), Some("application/json"));
    assert_eq!(body, r#"{"status":"healthy","pod":"","greeting":"Default Greeting"}"#);
}

#[tokio::test]
async fn health_reads_environment() {
    let router = app(Arc::new(Registry::new()), &[("POD_NAME", "worker-3"), ("GREETING", "hi")]);
    let (status, _, body) = get(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"status":"healthy","pod":"worker-3","greeting":"hi"}"#);
}

#[tokio::test]
async fn metrics_serves_default_collectors() {
    let registry = Arc::new(Registry::new());
    let _installed = DefaultCollectors::new().install(&registry).unwrap();

    let (status, ct, body) = get(app(registry, &[]), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ct.as_deref(), Some("text/plain; version=0.0.4"));
    assert!(body.contains("# TYPE process_start_time_seconds gauge\n"));
    assert_eq!(body.lines().filter(|l| l.starts_with("process_start_time_seconds ")).count(), 1);
    assert!(body.contains("# TYPE scrape_errors_total counter\n"));
    assert!(body.contains("# TYPE tokio_runtime_workers gauge\n"));
}

#[tokio::test]
async fn metrics_survives_failing_source() {
    let registry = Arc::new(Registry::new());
    registry
        .register(
            Metric::from_fn("flaky", MetricKind::Gauge, "Never works.", || {
                Err(SampleError::Unavailable("test"))
            })
            .unwrap(),
        )
        .unwrap();
    let healthy = registry.register_gauge("steady", "Always works.").unwrap();
    healthy.set(1.0);

    let (status, _, body) = get(app(registry, &[]), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("flaky"));
    assert!(body.contains("steady 1\n"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _, _) = get(app(Arc::new(Registry::new()), &[]), "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
