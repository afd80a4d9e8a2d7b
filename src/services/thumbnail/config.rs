// 缩略图服务配置
//
// 定义了缩略图服务的可调参数，包括：
// - 并发上限与缓存容量
// - 输出高度与压缩质量
// - 单次抽帧超时
// - 失败结果的缓存有效期
// - 外部抽帧程序路径

use crate::services::thumbnail::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// 缩略图服务配置（可存储在 thumbnail_config.json）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// 同时执行的抽帧任务上限
    pub max_concurrency: usize,

    /// 内存缓存最多保留的条目数
    pub max_cache_entries: usize,

    /// 输出图片的固定高度（像素），宽度按原始比例计算
    pub target_height: u32,

    /// 有损压缩质量（1-100）
    pub quality: u8,

    /// 单次抽帧尝试的超时（毫秒），每个策略单独计时
    pub extraction_timeout_ms: u64,

    /// 失败（空）结果的缓存有效期（秒）
    /// - None: 失败结果一直保留到手动清空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_ttl_secs: Option<u64>,

    /// 是否允许使用外部进程抽帧
    pub process_extraction: bool,

    /// ffmpeg 可执行文件路径，未设置时从环境变量或 PATH 查找
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,

    /// ffprobe 可执行文件路径，未设置时从环境变量或 PATH 查找
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            max_cache_entries: 500,
            target_height: 180,
            quality: 70,
            extraction_timeout_ms: 8_000,
            failure_ttl_secs: None,
            process_extraction: true,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl ThumbnailConfig {
    /// 默认配置文件路径
    pub const DEFAULT_CONFIG_PATH: &'static str = "thumbnail_config.json";

    const MIN_TARGET_HEIGHT: u32 = 16;
    const MAX_TARGET_HEIGHT: u32 = 2160;

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn failure_ttl(&self) -> Option<Duration> {
        self.failure_ttl_secs.map(Duration::from_secs)
    }

    /// 校验配置取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency 必须大于 0".to_string()));
        }
        if self.max_cache_entries == 0 {
            return Err(ConfigError::Invalid("max_cache_entries 必须大于 0".to_string()));
        }
        if !(Self::MIN_TARGET_HEIGHT..=Self::MAX_TARGET_HEIGHT).contains(&self.target_height) {
            return Err(ConfigError::Invalid(format!(
                "target_height 必须在 {}-{} 之间",
                Self::MIN_TARGET_HEIGHT,
                Self::MAX_TARGET_HEIGHT
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Invalid("quality 必须在 1-100 之间".to_string()));
        }
        if self.extraction_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "extraction_timeout_ms 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 从配置文件加载配置
    ///
    /// # 行为
    /// - 如果配置文件不存在，使用默认配置并创建文件
    /// - 如果配置文件损坏，使用默认配置并备份旧文件
    /// - 加载后的配置必须通过 `validate`
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path =
            config_path.unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_PATH));

        let config = if config_path.exists() {
            match fs::read_to_string(&config_path).await {
                Ok(content) => match serde_json::from_str::<ThumbnailConfig>(&content) {
                    Ok(config) => {
                        tracing::info!("成功加载缩略图配置: {:?}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::warn!("配置文件损坏，使用默认配置: {}", e);
                        Self::backup_corrupted_config(&config_path).await?;
                        let config = ThumbnailConfig::default();
                        config.save(&config_path).await?;
                        config
                    }
                },
                Err(e) => {
                    tracing::warn!("读取配置文件失败，使用默认配置: {}", e);
                    ThumbnailConfig::default()
                }
            }
        } else {
            tracing::info!("配置文件不存在，使用默认配置");
            let config = ThumbnailConfig::default();
            config.save(&config_path).await?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save(&self, config_path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        fs::write(config_path, json).await?;
        tracing::info!("成功保存缩略图配置: {:?}", config_path);
        Ok(())
    }

    /// 备份损坏的配置文件（config.json -> config.json.bak）
    async fn backup_corrupted_config(config_path: &Path) -> Result<(), ConfigError> {
        let mut backup = config_path.as_os_str().to_owned();
        backup.push(".bak");
        let backup_path = PathBuf::from(backup);

        fs::rename(config_path, &backup_path).await?;
        tracing::warn!("已备份损坏的配置文件: {:?}", backup_path);
        Ok(())
    }
}
