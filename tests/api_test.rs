// HTTP 接口集成测试

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{service_with, test_config, GatedDecoder};
use media_preview_backend::api::{router, serve, AppState};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn app() -> (Router, AppState) {
    let state = AppState {
        thumbnails: service_with(test_config(), GatedDecoder::immediate(), None),
    };
    (router(state.clone()), state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_generate_thumbnail_returns_data_uri() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        post_json(
            "/api/thumbnails",
            json!({ "key": "clip-1", "locator": "https://cdn.example.com/clip.mp4" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["key"], "clip-1");
    assert_eq!(body["data"]["duration_seconds"], 12.0);
    assert!(body["data"]["image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/webp;base64,"));
}

#[tokio::test]
async fn test_failed_thumbnail_returns_empty_image() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        post_json(
            "/api/thumbnails",
            json!({ "key": "bad", "locator": "https://cdn.example.com/corrupt.mp4" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["image"], "");
    assert_eq!(body["data"]["duration_seconds"], 0.0);
}

#[tokio::test]
async fn test_generate_without_key_or_file_is_bad_request() {
    let (app, _) = app();
    let (status, body) = send(
        app,
        post_json("/api/thumbnails", json!({ "locator": "/media/clip.mp4" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_batch_generation_preserves_order() {
    let (app, _) = app();
    let items: Vec<Value> = (0..5)
        .map(|i| json!({ "key": format!("b{}", i), "locator": format!("https://cdn.example.com/{}.mp4", i) }))
        .collect();
    let (status, body) = send(
        app,
        post_json("/api/thumbnails/batch", json!({ "items": items })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 5);
    for (i, item) in data.iter().enumerate() {
        assert_eq!(item["key"], format!("b{}", i));
        assert!(!item["image"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_stats_and_clear() {
    let (app, state) = app();
    let (status, _) = send(
        app.clone(),
        post_json(
            "/api/thumbnails",
            json!({ "key": "clip", "locator": "https://cdn.example.com/clip.mp4" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app.clone(), get("/api/thumbnails/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cached"], 1);
    assert_eq!(body["data"]["max_concurrency"], 3);

    let (status, body) = send(app, post_json("/api/thumbnails/clear", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(state.thumbnails.stats().cached, 0);
}

#[tokio::test]
async fn test_closed_service_is_unavailable() {
    let (app, state) = app();
    state.thumbnails.shutdown();

    let (status, _) = send(
        app,
        post_json(
            "/api/thumbnails",
            json!({ "key": "late", "locator": "https://cdn.example.com/late.mp4" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app();
    let (status, body) = send(app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["process_extraction"], "not_configured");
}

#[tokio::test]
async fn test_shutdown_signal_closes_service_before_drain() {
    let (_, state) = app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(serve(listener, state.clone(), async move {
        let _ = stop_rx.await;
    }));
    assert!(!state.thumbnails.stats().closed);

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    assert!(state.thumbnails.stats().closed);
}
