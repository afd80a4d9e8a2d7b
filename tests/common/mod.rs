// 测试用的可控抽帧能力
//
// GatedDecoder / CountingExtractor 通过信号量控制任务何时完成，
// 并记录调用次数和最大并发数

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use media_preview_backend::models::Locator;
use media_preview_backend::services::thumbnail::{
    DecodedMedia, ExtractedFrame, ExtractionError, FrameExtractor, MediaDecoder,
};
use media_preview_backend::services::{ThumbnailConfig, ThumbnailService};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// 解码行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Hang,
    Panic,
}

pub struct GatedDecoder {
    gate: Option<Arc<Semaphore>>,
    pub opened: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub opened_uris: Mutex<Vec<String>>,
    duration: f64,
}

impl GatedDecoder {
    /// 不受控制，立即完成
    pub fn immediate() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// 每个任务需要一个许可才能完成
    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self::build(Some(gate)))
    }

    fn build(gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            gate,
            opened: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            opened_uris: Mutex::new(Vec::new()),
            duration: 12.0,
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn behavior_for(uri: &str) -> Behavior {
        if uri.contains("corrupt") {
            Behavior::Fail
        } else if uri.contains("hang") {
            Behavior::Hang
        } else if uri.contains("panic") {
            Behavior::Panic
        } else {
            Behavior::Succeed
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaDecoder for GatedDecoder {
    async fn open(&self, locator: &Locator) -> Result<Box<dyn DecodedMedia>, ExtractionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.opened_uris
            .lock()
            .unwrap()
            .push(locator.uri().to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        match Self::behavior_for(locator.uri()) {
            Behavior::Succeed => Ok(Box::new(StillFrame {
                duration: self.duration,
            })),
            Behavior::Fail => Err(ExtractionError::Decode("corrupt media".to_string())),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::Panic => panic!("decoder crashed"),
        }
    }
}

struct StillFrame {
    duration: f64,
}

#[async_trait]
impl DecodedMedia for StillFrame {
    fn duration_seconds(&self) -> f64 {
        self.duration
    }

    async fn seek(&mut self, _position_seconds: f64) -> Result<(), ExtractionError> {
        Ok(())
    }

    async fn capture_frame(&mut self) -> Result<DynamicImage, ExtractionError> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            64,
            36,
            image::Rgb([10, 200, 90]),
        )))
    }
}

/// 记录调用的外部抽帧能力
pub struct CountingExtractor {
    pub calls: AtomicUsize,
    pub paths: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl CountingExtractor {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
            fail,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameExtractor for CountingExtractor {
    async fn extract_frame(
        &self,
        path: &Path,
        _target_height: u32,
        _quality: u8,
    ) -> Result<ExtractedFrame, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            return Err(ExtractionError::ProcessExit {
                program: "ffmpeg".to_string(),
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        Ok(ExtractedFrame {
            image: b"RIFF\0\0\0\0WEBPprocess".to_vec(),
            duration_seconds: 95.5,
        })
    }
}

pub fn test_config() -> ThumbnailConfig {
    ThumbnailConfig {
        max_concurrency: 3,
        max_cache_entries: 500,
        target_height: 36,
        quality: 60,
        extraction_timeout_ms: 2_000,
        ..Default::default()
    }
}

pub fn service_with(
    config: ThumbnailConfig,
    decoder: Arc<GatedDecoder>,
    extractor: Option<Arc<CountingExtractor>>,
) -> ThumbnailService {
    let mut builder = ThumbnailService::builder(config).media_decoder(decoder);
    if let Some(extractor) = extractor {
        builder = builder.frame_extractor(extractor);
    }
    builder.build().expect("valid test config")
}

/// 轮询等待条件成立
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
