// 抽帧策略与回退流水线
//
// 两种可互换的抽帧策略：
// - ProcessExtraction: 调用外部进程（需要本地路径提示和外部抽帧能力）
// - InlineDecodeExtraction: 进程内解码，始终可用
//
// 流水线按顺序尝试：不满足条件的策略直接跳过，失败的策略回退到下一个，
// 只有最后一个尝试的策略的错误会成为任务的最终错误。

use crate::models::{Locator, ThumbnailResult};
use crate::services::thumbnail::decoder::MediaDecoder;
use crate::services::thumbnail::encoder::ThumbnailEncoder;
use crate::services::thumbnail::error::ExtractionError;
use crate::services::thumbnail::frame::seek_position;
use crate::services::thumbnail::process::FrameExtractor;
use async_trait::async_trait;
use image::GenericImageView;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// 输出参数（两种策略共用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSettings {
    pub target_height: u32,
    pub quality: u8,
}

/// 抽帧策略
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// 策略名称（日志用）
    fn name(&self) -> &'static str;

    /// 判断该策略能否处理此定位符，不能处理时返回 `CapabilityUnavailable`
    fn check_eligible(&self, locator: &Locator) -> Result<(), ExtractionError>;

    /// 生成缩略图和时长
    async fn extract(&self, locator: &Locator) -> Result<ThumbnailResult, ExtractionError>;
}

/// 外部进程抽帧
pub struct ProcessExtraction {
    capability: Option<Arc<dyn FrameExtractor>>,
    output: OutputSettings,
}

impl ProcessExtraction {
    pub fn new(capability: Option<Arc<dyn FrameExtractor>>, output: OutputSettings) -> Self {
        Self { capability, output }
    }
}

#[async_trait]
impl ExtractionStrategy for ProcessExtraction {
    fn name(&self) -> &'static str {
        "process"
    }

    fn check_eligible(&self, locator: &Locator) -> Result<(), ExtractionError> {
        if self.capability.is_none() {
            return Err(ExtractionError::CapabilityUnavailable("未检测到外部抽帧程序"));
        }
        if locator.native_path().is_none() {
            return Err(ExtractionError::CapabilityUnavailable("缺少本地文件路径"));
        }
        Ok(())
    }

    async fn extract(&self, locator: &Locator) -> Result<ThumbnailResult, ExtractionError> {
        let (capability, path) = match (&self.capability, locator.native_path()) {
            (Some(capability), Some(path)) => (capability, path),
            _ => return Err(ExtractionError::CapabilityUnavailable("外部抽帧不可用")),
        };

        let frame = capability
            .extract_frame(path, self.output.target_height, self.output.quality)
            .await?;
        if frame.image.is_empty() {
            return Err(ExtractionError::MissingOutput);
        }

        Ok(ThumbnailResult::new(frame.image, frame.duration_seconds))
    }
}

/// 进程内解码抽帧
///
/// 打开媒体 → 读取时长 → 跳转到取帧点 → 抓取画面 → 缩放编码
pub struct InlineDecodeExtraction {
    decoder: Arc<dyn MediaDecoder>,
    output: OutputSettings,
}

impl InlineDecodeExtraction {
    pub fn new(decoder: Arc<dyn MediaDecoder>, output: OutputSettings) -> Self {
        Self { decoder, output }
    }
}

#[async_trait]
impl ExtractionStrategy for InlineDecodeExtraction {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn check_eligible(&self, _locator: &Locator) -> Result<(), ExtractionError> {
        Ok(())
    }

    async fn extract(&self, locator: &Locator) -> Result<ThumbnailResult, ExtractionError> {
        let mut media = self.decoder.open(locator).await?;

        let duration_seconds = media.duration_seconds();
        let position = seek_position(duration_seconds);
        media.seek(position).await?;

        let frame = media.capture_frame().await?;
        // 画面抓取完成即可释放媒体句柄
        drop(media);

        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(ExtractionError::ZeroDimensions);
        }

        let image =
            ThumbnailEncoder::encode_async(frame, self.output.target_height, self.output.quality)
                .await?;

        Ok(ThumbnailResult::new(image, duration_seconds))
    }
}

/// 抽帧流水线：按顺序尝试各策略，每次尝试单独计时
pub struct ExtractionPipeline {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    attempt_timeout: Duration,
}

impl ExtractionPipeline {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>, attempt_timeout: Duration) -> Self {
        Self {
            strategies,
            attempt_timeout,
        }
    }

    /// 标准流水线：外部进程优先，内联解码兜底
    pub fn standard(
        frame_extractor: Option<Arc<dyn FrameExtractor>>,
        media_decoder: Arc<dyn MediaDecoder>,
        output: OutputSettings,
        attempt_timeout: Duration,
    ) -> Self {
        Self::new(
            vec![
                Box::new(ProcessExtraction::new(frame_extractor, output)),
                Box::new(InlineDecodeExtraction::new(media_decoder, output)),
            ],
            attempt_timeout,
        )
    }

    /// 依次尝试各策略
    ///
    /// 超时的尝试会被直接丢弃（其持有的句柄、子进程随之释放）
    pub async fn extract(&self, locator: &Locator) -> Result<ThumbnailResult, ExtractionError> {
        let mut last_error = None;

        for strategy in &self.strategies {
            if let Err(e) = strategy.check_eligible(locator) {
                tracing::debug!("跳过抽帧策略 {}: {} ({})", strategy.name(), e, locator);
                last_error = Some(e);
                continue;
            }

            let attempt = timeout(self.attempt_timeout, strategy.extract(locator)).await;
            match attempt {
                Ok(Ok(result)) => {
                    tracing::debug!(
                        "抽帧成功: strategy={}, locator={}, bytes={}, duration={:.2}s",
                        strategy.name(),
                        locator,
                        result.image().len(),
                        result.duration_seconds()
                    );
                    return Ok(result);
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        "抽帧策略 {} 失败 [{}]: {} ({})",
                        strategy.name(),
                        e.kind(),
                        e,
                        locator
                    );
                    last_error = Some(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "抽帧策略 {} 超时 ({:?}): {}",
                        strategy.name(),
                        self.attempt_timeout,
                        locator
                    );
                    last_error = Some(ExtractionError::Timeout(self.attempt_timeout));
                }
            }
        }

        Err(last_error.unwrap_or(ExtractionError::CapabilityUnavailable("没有可用的抽帧策略")))
    }
}
