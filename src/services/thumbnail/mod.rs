// 缩略图模块 - 媒体预览图生成服务
//
// 本模块提供按需生成媒体预览图（静帧 + 时长）的功能，包括：
// - 准入与去重（同一媒体同时只有一个抽帧任务）
// - 有界并发调度（FIFO 队列）
// - 有界内存缓存（按插入顺序淘汰）
// - 多策略抽帧与回退（外部进程优先，内联解码兜底）
// - 超时与错误隔离（失败一律转为空结果）

pub mod cache;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod process;
pub mod scheduler;
pub mod service;
pub mod strategy;

pub use cache::BoundedCache;
pub use config::ThumbnailConfig;
pub use decoder::{DecodedMedia, ImageMediaDecoder, MediaDecoder};
pub use encoder::ThumbnailEncoder;
pub use error::{ConfigError, ExtractionError};
pub use process::{ExtractedFrame, FfmpegFrameExtractor, FrameExtractor};
pub use scheduler::{Admission, ServiceStats};
pub use service::{ThumbnailService, ThumbnailServiceBuilder};
pub use strategy::{
    ExtractionPipeline, ExtractionStrategy, InlineDecodeExtraction, OutputSettings,
    ProcessExtraction,
};
