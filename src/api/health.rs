use axum::{extract::State, response::IntoResponse};
use serde_json::json;

use super::error::ApiResult;
use super::response::success;
use super::AppState;

/// 健康检查端点
pub async fn health_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state.thumbnails.stats();

    let process_extraction = if stats.process_extraction_available {
        "available"
    } else {
        "not_configured"
    };

    let status = if stats.closed { "shutting_down" } else { "healthy" };

    Ok(success(json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "process_extraction": process_extraction,
        "active_jobs": stats.active,
        "queued_jobs": stats.queued,
    })))
}
