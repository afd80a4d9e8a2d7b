// 缩略图模块错误类型定义
//
// 定义了抽帧、解码、编码和配置加载中可能出现的各种错误类型。
// 这些错误只在服务内部流转：任务层面的失败一律记录日志后转为空结果。

use std::time::Duration;
use thiserror::Error;

/// 单次抽帧尝试的错误
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("抽帧能力不可用: {0}")]
    CapabilityUnavailable(&'static str),

    #[error("无法启动外部进程 {program}: {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("外部进程 {program} 异常退出 (状态码 {code:?}): {stderr}")]
    ProcessExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("外部进程没有输出图片")]
    MissingOutput,

    #[error("解码得到的画面尺寸为 0")]
    ZeroDimensions,

    #[error("抽帧超时 ({0:?})")]
    Timeout(Duration),

    #[error("媒体解码失败: {0}")]
    Decode(String),

    #[error("图片编码失败: {0}")]
    Encode(String),
}

impl ExtractionError {
    /// 错误类别名称，用于日志字段
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::CapabilityUnavailable(_) => "capability_unavailable",
            ExtractionError::ProcessSpawn { .. } => "process_spawn_failure",
            ExtractionError::ProcessExit { .. } => "process_non_zero_exit",
            ExtractionError::MissingOutput => "missing_output",
            ExtractionError::ZeroDimensions => "zero_dimensions",
            ExtractionError::Timeout(_) => "decode_timeout",
            ExtractionError::Decode(_) => "decode_error",
            ExtractionError::Encode(_) => "encode_error",
        }
    }
}

impl From<image::ImageError> for ExtractionError {
    fn from(err: image::ImageError) -> Self {
        ExtractionError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for ExtractionError {
    fn from(err: reqwest::Error) -> Self {
        ExtractionError::Decode(format!("下载媒体失败: {}", err))
    }
}

/// 配置加载与校验错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("配置无效: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(
            ExtractionError::CapabilityUnavailable("ffmpeg").kind(),
            "capability_unavailable"
        );
        assert_eq!(ExtractionError::ZeroDimensions.kind(), "zero_dimensions");
        assert_eq!(
            ExtractionError::Timeout(Duration::from_secs(1)).kind(),
            "decode_timeout"
        );
    }

    #[test]
    fn test_error_display() {
        let err = ExtractionError::ProcessExit {
            program: "ffmpeg".to_string(),
            code: Some(1),
            stderr: "Invalid data found".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("ffmpeg"));
        assert!(message.contains("Invalid data found"));
    }
}
