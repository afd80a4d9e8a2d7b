// 外部进程抽帧能力
//
// 通过 ffprobe 读取时长、ffmpeg 解出一帧来生成缩略图。
// 该能力是否可用在启动时判定一次（找不到可执行文件即不可用）。

use crate::services::thumbnail::encoder::ThumbnailEncoder;
use crate::services::thumbnail::error::ExtractionError;
use crate::services::thumbnail::frame::seek_position;
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// 外部抽帧结果
#[derive(Debug, Clone)]
pub struct ExtractedFrame {
    /// 压缩后的图片数据
    pub image: Vec<u8>,
    /// 探测到的时长（秒）
    pub duration_seconds: f64,
}

/// 外部抽帧能力
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// 从本地文件抽取一帧代表画面并探测时长
    async fn extract_frame(
        &self,
        path: &Path,
        target_height: u32,
        quality: u8,
    ) -> Result<ExtractedFrame, ExtractionError>;
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: Option<FormatInfo>,
    streams: Option<Vec<StreamInfo>>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    codec_type: Option<String>,
    duration: Option<String>,
}

/// 基于 ffmpeg / ffprobe 的抽帧实现
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// 查找 ffmpeg / ffprobe
    ///
    /// 查找顺序：配置中的路径 → 环境变量 `FFMPEG_BIN` / `FFPROBE_BIN` → PATH。
    /// 任一程序缺失时返回 None，外部进程抽帧整体不可用
    pub fn detect(ffmpeg_override: Option<&Path>, ffprobe_override: Option<&Path>) -> Option<Self> {
        let ffmpeg = locate_binary(ffmpeg_override, "FFMPEG_BIN", "ffmpeg")?;
        let ffprobe = locate_binary(ffprobe_override, "FFPROBE_BIN", "ffprobe")?;
        tracing::info!("检测到外部抽帧程序: ffmpeg={:?}, ffprobe={:?}", ffmpeg, ffprobe);
        Some(Self::new(ffmpeg, ffprobe))
    }

    /// 使用 ffprobe 读取时长（秒）
    async fn probe_duration(&self, path: &Path) -> Result<f64, ExtractionError> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);

        let stdout = run_to_completion(command, &self.ffprobe).await?;
        parse_probe_duration(&stdout)
    }

    /// 使用 ffmpeg 解出一帧 PNG（写到标准输出）
    async fn grab_frame(
        &self,
        path: &Path,
        position_seconds: f64,
        target_height: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let mut command = Command::new(&self.ffmpeg);
        command.args(ffmpeg_frame_args(path, position_seconds, target_height));
        let stdout = run_to_completion(command, &self.ffmpeg).await?;
        if stdout.is_empty() {
            return Err(ExtractionError::MissingOutput);
        }
        Ok(stdout)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(
        &self,
        path: &Path,
        target_height: u32,
        quality: u8,
    ) -> Result<ExtractedFrame, ExtractionError> {
        let duration_seconds = self.probe_duration(path).await?;
        let position = seek_position(duration_seconds);

        tracing::debug!(
            "ffmpeg 抽帧: {:?}, duration={:.2}s, seek={:.2}s",
            path,
            duration_seconds,
            position
        );

        let png = self.grab_frame(path, position, target_height).await?;
        let image = ThumbnailEncoder::reencode_async(png, target_height, quality).await?;

        Ok(ExtractedFrame {
            image,
            duration_seconds,
        })
    }
}

fn locate_binary(override_path: Option<&Path>, env_var: &str, name: &str) -> Option<PathBuf> {
    override_path
        .filter(|p| p.exists())
        .map(Path::to_path_buf)
        .or_else(|| {
            std::env::var(env_var)
                .ok()
                .map(PathBuf::from)
                .filter(|p| p.exists())
        })
        .or_else(|| which::which(name).ok())
}

/// 构造 ffmpeg 参数：跳转、解一帧、按目标高度等比缩放、输出 PNG 到标准输出
fn ffmpeg_frame_args(path: &Path, position_seconds: f64, target_height: u32) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostdin".into(),
    ];

    if position_seconds > 0.0 {
        args.push("-ss".into());
        args.push(format!("{:.3}", position_seconds).into());
    }

    args.push("-i".into());
    args.push(path.as_os_str().to_owned());

    args.extend(
        [
            "-frames:v".to_string(),
            "1".to_string(),
            "-an".to_string(),
            "-sn".to_string(),
            "-dn".to_string(),
            "-vf".to_string(),
            format!("scale=-2:{}", target_height),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "png".to_string(),
            "pipe:1".to_string(),
        ]
        .into_iter()
        .map(OsString::from),
    );

    args
}

/// 从 ffprobe JSON 中读取时长（优先 format，其次视频流）
fn parse_probe_duration(stdout: &[u8]) -> Result<f64, ExtractionError> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| ExtractionError::Decode(format!("无法解析 ffprobe 输出: {}", e)))?;

    let stream_duration = probe.streams.as_ref().and_then(|streams| {
        streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .and_then(|s| s.duration.clone())
    });

    let duration = probe
        .format
        .and_then(|f| f.duration)
        .or(stream_duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    Ok(duration)
}

/// 运行外部程序直到退出，返回标准输出
///
/// 子进程设置了 `kill_on_drop`，调用方的 future 被丢弃（超时）时进程随之结束
async fn run_to_completion(mut command: Command, program: &Path) -> Result<Vec<u8>, ExtractionError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|source| ExtractionError::ProcessSpawn {
        program: program.display().to_string(),
        source,
    })?;

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| ExtractionError::ProcessSpawn {
            program: program.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractionError::ProcessExit {
            program: program.display().to_string(),
            code: output.status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(output.stdout)
}
