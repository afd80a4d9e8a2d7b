pub mod error;
pub mod health;
pub mod response;
pub mod thumbnails;

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::services::ThumbnailService;

#[derive(Clone)]
pub struct AppState {
    pub thumbnails: ThumbnailService,
}

/// 构建 API 路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Media Preview Backend API v1.0" }))
        .route("/api/health", get(health::health_check))
        .route("/api/thumbnails", post(thumbnails::generate_thumbnail))
        .route("/api/thumbnails/batch", post(thumbnails::generate_thumbnails_batch))
        .route("/api/thumbnails/clear", post(thumbnails::clear_thumbnails))
        .route("/api/thumbnails/stats", get(thumbnails::get_thumbnail_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 启动 HTTP 服务
///
/// 收到停止信号后先关闭缩略图服务，再等待已有连接结束；排空期间的新请求返回 503
pub async fn serve<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let thumbnails = state.thumbnails.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            signal.await;
            thumbnails.shutdown();
        })
        .await
}
