// 缩略图服务 - 对外入口
//
// 把准入去重、缓存、FIFO 队列、并发上限和抽帧流水线组合在一起：
// 调用方 → 准入 / 去重 → 入队 → 最多 N 个任务并发抽帧 → 写缓存并通知所有调用方 → 继续派发

use crate::models::{ItemKey, ThumbnailRequest, ThumbnailResult};
use crate::services::thumbnail::cache::BoundedCache;
use crate::services::thumbnail::config::ThumbnailConfig;
use crate::services::thumbnail::decoder::{ImageMediaDecoder, MediaDecoder};
use crate::services::thumbnail::error::ConfigError;
use crate::services::thumbnail::process::{FfmpegFrameExtractor, FrameExtractor};
use crate::services::thumbnail::scheduler::{Admission, Job, SchedulerState, ServiceStats};
use crate::services::thumbnail::strategy::{ExtractionPipeline, OutputSettings};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// 缩略图服务
///
/// 显式创建的实例（克隆共享同一份状态），多个实例之间互不影响。
/// 提交请求和派发任务依赖 Tokio 运行时，必须在运行时内调用。
#[derive(Clone)]
pub struct ThumbnailService {
    inner: Arc<Inner>,
}

struct Inner {
    config: ThumbnailConfig,
    state: Mutex<SchedulerState>,
    pipeline: ExtractionPipeline,
    process_extraction_available: bool,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 服务构建器
///
/// 外部抽帧能力在这里一次性确定，之后不再探测
pub struct ThumbnailServiceBuilder {
    config: ThumbnailConfig,
    frame_extractor: Option<Arc<dyn FrameExtractor>>,
    media_decoder: Option<Arc<dyn MediaDecoder>>,
}

impl ThumbnailServiceBuilder {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self {
            config,
            frame_extractor: None,
            media_decoder: None,
        }
    }

    /// 注入外部抽帧能力
    pub fn frame_extractor(mut self, extractor: Arc<dyn FrameExtractor>) -> Self {
        self.frame_extractor = Some(extractor);
        self
    }

    /// 查找本机的 ffmpeg / ffprobe 作为外部抽帧能力
    pub fn detect_frame_extractor(mut self) -> Self {
        self.frame_extractor = FfmpegFrameExtractor::detect(
            self.config.ffmpeg_path.as_deref(),
            self.config.ffprobe_path.as_deref(),
        )
        .map(|extractor| Arc::new(extractor) as Arc<dyn FrameExtractor>);

        if self.frame_extractor.is_none() {
            tracing::warn!("未找到 ffmpeg / ffprobe，只使用内联解码生成缩略图");
        }
        self
    }

    /// 注入内联解码能力（默认只能处理静态图片）
    pub fn media_decoder(mut self, decoder: Arc<dyn MediaDecoder>) -> Self {
        self.media_decoder = Some(decoder);
        self
    }

    pub fn build(self) -> Result<ThumbnailService, ConfigError> {
        self.config.validate()?;

        let frame_extractor = if self.config.process_extraction {
            self.frame_extractor
        } else {
            None
        };
        let process_extraction_available = frame_extractor.is_some();
        let media_decoder = self
            .media_decoder
            .unwrap_or_else(|| Arc::new(ImageMediaDecoder::new()) as Arc<dyn MediaDecoder>);

        let output = OutputSettings {
            target_height: self.config.target_height,
            quality: self.config.quality,
        };
        let pipeline = ExtractionPipeline::standard(
            frame_extractor,
            media_decoder,
            output,
            self.config.extraction_timeout(),
        );

        let cache = BoundedCache::new(self.config.max_cache_entries, self.config.failure_ttl());
        let state = SchedulerState::new(self.config.max_concurrency, cache);

        tracing::info!(
            "缩略图服务已创建: max_concurrency={}, max_cache_entries={}, target_height={}, quality={}, timeout={:?}, process_extraction={}",
            self.config.max_concurrency,
            self.config.max_cache_entries,
            self.config.target_height,
            self.config.quality,
            self.config.extraction_timeout(),
            process_extraction_available
        );

        Ok(ThumbnailService {
            inner: Arc::new(Inner {
                config: self.config,
                state: Mutex::new(state),
                pipeline,
                process_extraction_available,
            }),
        })
    }
}

impl ThumbnailService {
    pub fn builder(config: ThumbnailConfig) -> ThumbnailServiceBuilder {
        ThumbnailServiceBuilder::new(config)
    }

    /// 使用本机 ffmpeg（若存在）和默认解码器创建服务
    pub fn new(config: ThumbnailConfig) -> Result<Self, ConfigError> {
        Self::builder(config).detect_frame_extractor().build()
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.inner.config
    }

    /// 提交请求，返回结果接收端
    ///
    /// 每个提交的请求都会且只会收到一次结果（缓存结果、抽帧结果或空结果）
    pub fn submit(&self, request: ThumbnailRequest) -> oneshot::Receiver<ThumbnailResult> {
        let (tx, rx) = oneshot::channel();
        let key = request.key.clone();

        let admission = self.inner.lock_state().admit(request, tx);
        match admission {
            Admission::Hit => tracing::debug!("缩略图缓存命中: {}", key),
            Admission::Joined => tracing::debug!("缩略图正在生成，合并请求: {}", key),
            Admission::Rejected => tracing::debug!("缩略图服务已关闭，忽略请求: {}", key),
            Admission::Queued => {
                tracing::debug!("缩略图请求入队: {}", key);
                self.pump();
            }
        }

        rx
    }

    /// 提交请求并等待结果
    pub async fn generate(&self, request: ThumbnailRequest) -> ThumbnailResult {
        self.submit(request)
            .await
            .unwrap_or_else(|_| ThumbnailResult::empty())
    }

    /// 回调形式的提交
    ///
    /// 缓存命中时回调在当前调用中直接执行，否则在结果就绪后执行
    pub fn generate_with_callback<F>(&self, request: ThumbnailRequest, callback: F)
    where
        F: FnOnce(ThumbnailResult) + Send + 'static,
    {
        let mut rx = self.submit(request);
        match rx.try_recv() {
            Ok(result) => callback(result),
            Err(TryRecvError::Closed) => callback(ThumbnailResult::empty()),
            Err(TryRecvError::Empty) => {
                tokio::spawn(async move {
                    callback(rx.await.unwrap_or_else(|_| ThumbnailResult::empty()));
                });
            }
        }
    }

    /// 读取缓存中的结果
    pub fn get(&self, key: &ItemKey) -> Option<ThumbnailResult> {
        self.inner.lock_state().cached(key)
    }

    /// 清空缓存、待处理集合和队列
    ///
    /// 所有尚未得到结果的调用方收到空结果；执行中的任务完成后不会写回缓存
    pub fn clear(&self) {
        let waiters = self.inner.lock_state().clear();
        tracing::info!("缩略图缓存已清空，{} 个等待中的请求返回空结果", waiters.len());
        for waiter in waiters {
            let _ = waiter.send(ThumbnailResult::empty());
        }
    }

    /// 关闭服务：停止准入并清空状态
    pub fn shutdown(&self) {
        self.inner.lock_state().close();
        self.clear();
        tracing::info!("缩略图服务已关闭");
    }

    pub fn stats(&self) -> ServiceStats {
        self.inner
            .lock_state()
            .stats(self.inner.process_extraction_available)
    }

    /// 派发：在并发上限内按入队顺序启动任务
    fn pump(&self) {
        let jobs = self.inner.lock_state().take_dispatchable();
        for job in jobs {
            tracing::debug!("开始生成缩略图 [{}]: {}", job.id, job.request.key);
            let service = self.clone();
            tokio::spawn(async move {
                service.run_job(job).await;
            });
        }
    }

    async fn run_job(self, job: Job) {
        let started = Instant::now();

        // 抽帧放在独立任务中执行，即使 panic 也只影响这一个任务
        let inner = self.inner.clone();
        let locator = job.request.locator.clone();
        let extraction =
            tokio::spawn(async move { inner.pipeline.extract(&locator).await }).await;

        let result = match extraction {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(
                    "缩略图生成失败 [{}] {} ({}): {}",
                    job.id,
                    job.request.key,
                    e.kind(),
                    e
                );
                ThumbnailResult::empty()
            }
            Err(e) => {
                tracing::warn!("缩略图任务异常终止 [{}] {}: {}", job.id, job.request.key, e);
                ThumbnailResult::empty()
            }
        };

        let waiters = self.inner.lock_state().complete(&job, &result);
        tracing::debug!(
            "缩略图任务结束 [{}] {}: empty={}, waiters={}, elapsed={:?}",
            job.id,
            job.request.key,
            result.is_empty(),
            waiters.len(),
            started.elapsed()
        );
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }

        // 让出执行权后再派发下一批，积压很多时不会长时间占用运行时
        tokio::task::yield_now().await;
        self.pump();
    }
}
