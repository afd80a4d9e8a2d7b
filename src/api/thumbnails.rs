// 缩略图 API
//
// 提供缩略图生成服务的 HTTP API 端点，包括：
// - 生成单个缩略图
// - 批量生成缩略图
// - 清空缓存（重置媒体库）
// - 获取服务统计

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{ItemKey, Locator, ThumbnailRequest, ThumbnailResult};

use super::error::{ApiError, ApiResult};
use super::response::{success, success_message};
use super::AppState;

/// 单次批量请求的最大条目数
const MAX_BATCH_SIZE: usize = 200;

/// 文件身份（用于在未提供 key 时生成稳定的缓存键）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIdentity {
    pub name: String,
    pub size: u64,
    /// 修改时间（毫秒时间戳）
    pub modified_ms: i64,
}

/// 生成缩略图请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateThumbnailRequest {
    /// 缓存键（可选，缺省时由 `file` 生成）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// 媒体地址（URL 或本地路径）
    pub locator: String,

    /// 本地文件路径提示（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_path: Option<PathBuf>,

    /// 文件身份（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileIdentity>,
}

impl GenerateThumbnailRequest {
    fn into_thumbnail_request(self) -> ApiResult<ThumbnailRequest> {
        let raw = self.locator.trim();
        if raw.is_empty() {
            return Err(ApiError::Validation("locator 不能为空".to_string()));
        }

        let key = match (self.key, self.file) {
            (Some(key), _) if !key.trim().is_empty() => ItemKey::new(key.trim()),
            (_, Some(file)) => ItemKey::from_file_identity(&file.name, file.size, file.modified_ms),
            _ => {
                return Err(ApiError::BadRequest(
                    "必须提供 key 或 file 其中之一".to_string(),
                ))
            }
        };

        let mut locator = Locator::parse(raw);
        if let Some(path) = self.native_path {
            locator = locator.with_native_path(path);
        }

        Ok(ThumbnailRequest::new(locator, key))
    }
}

/// 缩略图响应
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThumbnailResponse {
    pub key: String,
    /// data URI，生成失败时为空字符串
    pub image: String,
    pub duration_seconds: f64,
}

impl ThumbnailResponse {
    fn new(key: &ItemKey, result: &ThumbnailResult) -> Self {
        Self {
            key: key.to_string(),
            image: result.to_data_uri(),
            duration_seconds: result.duration_seconds(),
        }
    }
}

/// 批量请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchThumbnailRequest {
    pub items: Vec<GenerateThumbnailRequest>,
}

fn ensure_open(state: &AppState) -> ApiResult<()> {
    if state.thumbnails.stats().closed {
        return Err(ApiError::Unavailable("缩略图服务已关闭".to_string()));
    }
    Ok(())
}

/// 生成缩略图
///
/// # 端点
/// POST /api/thumbnails
///
/// # 请求体
/// ```json
/// {
///   "key": "a1b2c3",
///   "locator": "file:///media/videos/clip.mp4"
/// }
/// ```
///
/// # 响应
/// ```json
/// {
///   "success": true,
///   "data": {
///     "key": "a1b2c3",
///     "image": "data:image/webp;base64,UklGR...",
///     "duration_seconds": 125.34
///   }
/// }
/// ```
pub async fn generate_thumbnail(
    State(state): State<AppState>,
    Json(request): Json<GenerateThumbnailRequest>,
) -> ApiResult<impl IntoResponse> {
    ensure_open(&state)?;
    let request = request.into_thumbnail_request()?;
    let key = request.key.clone();

    let result = state.thumbnails.generate(request).await;
    if result.is_empty() {
        tracing::debug!("缩略图不可用: {}", key);
    }

    Ok(success(ThumbnailResponse::new(&key, &result)))
}

/// 批量生成缩略图
///
/// # 端点
/// POST /api/thumbnails/batch
///
/// 所有条目先全部提交再等待结果，由服务按并发上限调度
pub async fn generate_thumbnails_batch(
    State(state): State<AppState>,
    Json(batch): Json<BatchThumbnailRequest>,
) -> ApiResult<impl IntoResponse> {
    ensure_open(&state)?;
    if batch.items.len() > MAX_BATCH_SIZE {
        return Err(ApiError::Validation(format!(
            "单次最多提交 {} 个条目",
            MAX_BATCH_SIZE
        )));
    }

    let requests = batch
        .items
        .into_iter()
        .map(GenerateThumbnailRequest::into_thumbnail_request)
        .collect::<ApiResult<Vec<_>>>()?;

    let receivers: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let key = request.key.clone();
            (key, state.thumbnails.submit(request))
        })
        .collect();

    let mut responses = Vec::with_capacity(receivers.len());
    for (key, rx) in receivers {
        let result = rx.await.unwrap_or_else(|_| ThumbnailResult::empty());
        responses.push(ThumbnailResponse::new(&key, &result));
    }

    Ok(success(responses))
}

/// 清空缩略图缓存（重置媒体库时调用）
///
/// # 端点
/// POST /api/thumbnails/clear
pub async fn clear_thumbnails(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.thumbnails.clear();
    Ok(success_message("缩略图缓存已清空"))
}

/// 获取缩略图服务统计
///
/// # 端点
/// GET /api/thumbnails/stats
pub async fn get_thumbnail_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.thumbnails.stats()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: Option<&str>, file: Option<FileIdentity>) -> GenerateThumbnailRequest {
        GenerateThumbnailRequest {
            key: key.map(str::to_string),
            locator: "/media/clip.mp4".to_string(),
            native_path: None,
            file,
        }
    }

    #[test]
    fn test_key_takes_precedence() {
        let file = FileIdentity {
            name: "clip.mp4".to_string(),
            size: 10,
            modified_ms: 1,
        };
        let req = request(Some("explicit"), Some(file)).into_thumbnail_request().unwrap();
        assert_eq!(req.key.as_str(), "explicit");
    }

    #[test]
    fn test_key_derived_from_file_identity() {
        let file = FileIdentity {
            name: "clip.mp4".to_string(),
            size: 10,
            modified_ms: 1,
        };
        let req = request(None, Some(file)).into_thumbnail_request().unwrap();
        assert_eq!(req.key, ItemKey::from_file_identity("clip.mp4", 10, 1));
    }

    #[test]
    fn test_missing_key_and_file_rejected() {
        let result = request(None, None).into_thumbnail_request();
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_empty_locator_rejected() {
        let mut req = request(Some("k"), None);
        req.locator = "   ".to_string();
        assert!(matches!(
            req.into_thumbnail_request(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_native_path_hint_applied() {
        let mut req = request(Some("k"), None);
        req.locator = "https://cdn.example.com/clip.mp4".to_string();
        req.native_path = Some(PathBuf::from("/cache/clip.mp4"));
        let req = req.into_thumbnail_request().unwrap();
        assert_eq!(
            req.locator.native_path(),
            Some(std::path::Path::new("/cache/clip.mp4"))
        );
    }
}
