use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 媒体条目的稳定标识（缓存键 / 去重键）
///
/// 同一个 `ItemKey` 必须指向同一份媒体字节
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// 根据文件身份（文件名、大小、修改时间）生成稳定的键
    ///
    /// 文件扫描方只知道文件身份时使用，结果为 SHA-256 十六进制串
    pub fn from_file_identity(name: &str, size: u64, modified_ms: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(size.to_le_bytes());
        hasher.update(modified_ms.to_le_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 可播放的媒体引用
///
/// `uri` 交给内联解码器使用；`native_path` 是本地文件路径提示，
/// 只有存在该提示时才会尝试外部进程抽帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    uri: String,
    native_path: Option<PathBuf>,
}

impl Locator {
    /// 创建不带本地路径提示的定位符
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            native_path: None,
        }
    }

    /// 从本地文件路径创建定位符（同时设置路径提示）
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let uri = url::Url::from_file_path(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.to_string_lossy().into_owned());
        Self {
            uri,
            native_path: Some(path.to_path_buf()),
        }
    }

    /// 解析调用方传入的字符串
    ///
    /// - `file://` URL：转换为本地路径提示
    /// - 其他带 scheme 的 URL（http、https、blob 等）：不带路径提示
    /// - 其余字符串视为本地文件路径
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match url::Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => {
                let native_path = url.to_file_path().ok();
                Self {
                    uri: raw.to_string(),
                    native_path,
                }
            }
            // Windows 盘符（如 `C:\video.mp4`）会被解析成单字母 scheme
            Ok(url) if url.scheme().len() > 1 => Self::new(raw),
            _ => Self::from_path(raw),
        }
    }

    pub fn with_native_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.native_path = Some(path.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn native_path(&self) -> Option<&Path> {
        self.native_path.as_deref()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// 一次缩略图生成请求
#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub locator: Locator,
    pub key: ItemKey,
}

impl ThumbnailRequest {
    pub fn new(locator: Locator, key: impl Into<ItemKey>) -> Self {
        Self {
            locator,
            key: key.into(),
        }
    }
}

/// 缩略图结果：压缩后的静帧 + 时长（秒）
///
/// 图片为空表示"没有可用预览"，失败结果同样以空结果的形式缓存
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailResult {
    image: Arc<[u8]>,
    duration_seconds: f64,
}

impl ThumbnailResult {
    /// 缩略图统一使用 WebP 编码
    pub const MIME_TYPE: &'static str = "image/webp";

    pub fn new(image: Vec<u8>, duration_seconds: f64) -> Self {
        let duration_seconds = if duration_seconds.is_finite() && duration_seconds > 0.0 {
            duration_seconds
        } else {
            0.0
        };
        Self {
            image: Arc::from(image),
            duration_seconds,
        }
    }

    /// 失败结果（空图片，时长 0）
    pub fn empty() -> Self {
        Self {
            image: Arc::from(Vec::new()),
            duration_seconds: 0.0,
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// 转换为 data URI，空结果返回空字符串
    pub fn to_data_uri(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("data:{};base64,{}", Self::MIME_TYPE, BASE64.encode(&self.image))
    }
}
