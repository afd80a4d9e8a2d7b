// 内联媒体解码能力
//
// 宿主提供的媒体渲染能力抽象为 `MediaDecoder`：打开媒体（等待首次解码完成）、
// 跳转到指定时间点（等待跳转完成）、抓取当前画面。
// 默认实现 `ImageMediaDecoder` 处理静态图片；接入真实媒体引擎的宿主注入自己的实现。

use crate::models::Locator;
use crate::services::thumbnail::error::ExtractionError;
use async_trait::async_trait;
use image::DynamicImage;
use image::io::Reader as ImageReader;
use reqwest::Client;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;

/// 已打开的媒体句柄
///
/// 句柄被丢弃即释放所有关联资源（超时放弃时依赖这一点）
#[async_trait]
pub trait DecodedMedia: Send {
    /// 解码元数据中的时长（秒），未知时返回 0
    fn duration_seconds(&self) -> f64;

    /// 跳转到指定时间点，返回时跳转已完成
    async fn seek(&mut self, position_seconds: f64) -> Result<(), ExtractionError>;

    /// 抓取当前画面
    async fn capture_frame(&mut self) -> Result<DynamicImage, ExtractionError>;
}

/// 内联解码能力，始终可用
#[async_trait]
pub trait MediaDecoder: Send + Sync {
    /// 打开媒体并等待首次解码完成
    async fn open(&self, locator: &Locator) -> Result<Box<dyn DecodedMedia>, ExtractionError>;
}

/// 静态图片解码器
///
/// 从本地路径或 http(s) URL 读取图片，时长固定为 0。
/// 先根据文件头判断格式，不是图片时不读取剩余内容；超过大小上限的媒体直接拒绝
pub struct ImageMediaDecoder {
    client: Client,
    max_bytes: u64,
}

impl ImageMediaDecoder {
    /// 远程媒体下载超时
    const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

    /// 默认的图片大小上限
    pub const DEFAULT_MAX_BYTES: u64 = 64 * 1024 * 1024;

    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Self::FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("创建 HTTP 客户端失败，使用默认客户端: {}", e);
                Client::new()
            });
        Self {
            client,
            max_bytes: Self::DEFAULT_MAX_BYTES,
        }
    }

    /// 设置单个图片的大小上限（字节）
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// 解码本地文件：先检查大小和文件头，再解码
    async fn decode_file(&self, path: PathBuf) -> Result<DynamicImage, ExtractionError> {
        let max_bytes = self.max_bytes;
        task::spawn_blocking(move || decode_local(&path, max_bytes))
            .await
            .map_err(|e| ExtractionError::Decode(format!("任务执行失败: {}", e)))?
    }

    /// 下载远程图片，累计超过上限时中止
    async fn fetch(&self, url: url::Url) -> Result<Vec<u8>, ExtractionError> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(too_large(length, self.max_bytes));
            }
        }

        let mut data = Vec::new();
        let mut sniffed = false;
        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            if data.len() as u64 > self.max_bytes {
                return Err(too_large(data.len() as u64, self.max_bytes));
            }
            if !sniffed && data.len() >= SNIFF_LEN {
                image::guess_format(&data)
                    .map_err(|_| ExtractionError::Decode("不是可识别的图片格式".to_string()))?;
                sniffed = true;
            }
        }
        Ok(data)
    }

    async fn load(&self, locator: &Locator) -> Result<DynamicImage, ExtractionError> {
        if let Some(path) = locator.native_path() {
            return self.decode_file(path.to_path_buf()).await;
        }

        let url = url::Url::parse(locator.uri())
            .map_err(|e| ExtractionError::Decode(format!("无效的媒体地址: {}", e)))?;
        match url.scheme() {
            "http" | "https" => {
                let data = self.fetch(url).await?;
                if data.is_empty() {
                    return Err(ExtractionError::Decode("媒体内容为空".to_string()));
                }
                let image = task::spawn_blocking(move || image::load_from_memory(&data))
                    .await
                    .map_err(|e| ExtractionError::Decode(format!("任务执行失败: {}", e)))??;
                Ok(image)
            }
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| ExtractionError::Decode("无效的文件 URL".to_string()))?;
                self.decode_file(path).await
            }
            other => Err(ExtractionError::Decode(format!("不支持的地址类型: {}", other))),
        }
    }
}

impl Default for ImageMediaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// 识别图片格式所需的文件头长度
const SNIFF_LEN: usize = 16;

fn too_large(size: u64, max_bytes: u64) -> ExtractionError {
    ExtractionError::Decode(format!("媒体过大: {} 字节（上限 {} 字节）", size, max_bytes))
}

/// 在阻塞线程中解码本地图片，只读取识别格式所需的文件头
fn decode_local(path: &Path, max_bytes: u64) -> Result<DynamicImage, ExtractionError> {
    let file = File::open(path)
        .map_err(|e| ExtractionError::Decode(format!("读取文件失败 {:?}: {}", path, e)))?;
    let size = file
        .metadata()
        .map_err(|e| ExtractionError::Decode(format!("读取文件信息失败 {:?}: {}", path, e)))?
        .len();
    if size == 0 {
        return Err(ExtractionError::Decode("媒体内容为空".to_string()));
    }
    if size > max_bytes {
        return Err(too_large(size, max_bytes));
    }

    let reader = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|e| ExtractionError::Decode(format!("读取文件失败 {:?}: {}", path, e)))?;
    if reader.format().is_none() {
        return Err(ExtractionError::Decode(format!("不是可识别的图片格式: {:?}", path)));
    }
    Ok(reader.decode()?)
}

#[async_trait]
impl MediaDecoder for ImageMediaDecoder {
    async fn open(&self, locator: &Locator) -> Result<Box<dyn DecodedMedia>, ExtractionError> {
        let image = self.load(locator).await?;
        Ok(Box::new(StillImage { image }))
    }
}

/// 静态图片句柄：任意时间点都是同一帧
struct StillImage {
    image: DynamicImage,
}

#[async_trait]
impl DecodedMedia for StillImage {
    fn duration_seconds(&self) -> f64 {
        0.0
    }

    async fn seek(&mut self, _position_seconds: f64) -> Result<(), ExtractionError> {
        Ok(())
    }

    async fn capture_frame(&mut self) -> Result<DynamicImage, ExtractionError> {
        Ok(self.image.clone())
    }
}
