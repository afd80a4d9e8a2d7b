// 缩略图编码器 - 缩放并压缩为 WebP
//
// 本模块负责把解码得到的画面变成可缓存的缩略图，包括：
// - 按固定高度等比缩放
// - 有损 WebP 编码（固定质量，控制单条缓存的体积）
// - 异步处理（CPU 密集操作放到阻塞线程池）

use crate::services::thumbnail::error::ExtractionError;
use crate::services::thumbnail::frame::output_dimensions;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tokio::task;

/// 缩略图编码器
pub struct ThumbnailEncoder;

impl ThumbnailEncoder {
    /// 异步编码
    ///
    /// 使用 `tokio::task::spawn_blocking` 将缩放和编码移到阻塞线程池，
    /// 避免阻塞异步运行时
    pub async fn encode_async(
        frame: DynamicImage,
        target_height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, ExtractionError> {
        task::spawn_blocking(move || Self::encode(&frame, target_height, quality))
            .await
            .map_err(|e| ExtractionError::Encode(format!("任务执行失败: {}", e)))?
    }

    /// 异步编码已压缩的图片数据（外部进程输出的 PNG 等）
    pub async fn reencode_async(
        image_data: Vec<u8>,
        target_height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, ExtractionError> {
        task::spawn_blocking(move || {
            let frame = image::load_from_memory(&image_data)?;
            Self::encode(&frame, target_height, quality)
        })
        .await
        .map_err(|e| ExtractionError::Encode(format!("任务执行失败: {}", e)))?
    }

    /// 缩放到目标高度并编码为有损 WebP
    ///
    /// # 错误
    /// - `ZeroDimensions`: 画面没有像素内容
    /// - `Encode`: WebP 编码失败
    pub fn encode(
        frame: &DynamicImage,
        target_height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, ExtractionError> {
        let (width, height) = frame.dimensions();
        let (out_width, out_height) = output_dimensions(width, height, target_height);
        if out_width == 0 || out_height == 0 {
            return Err(ExtractionError::ZeroDimensions);
        }

        let rgba = if (out_width, out_height) == (width, height) {
            frame.to_rgba8()
        } else {
            frame
                .resize_exact(out_width, out_height, FilterType::Triangle)
                .to_rgba8()
        };

        let encoder = webp::Encoder::from_rgba(&rgba, out_width, out_height);
        let webp_data = encoder.encode(quality.clamp(1, 100) as f32);
        if webp_data.is_empty() {
            return Err(ExtractionError::Encode("WebP 编码结果为空".to_string()));
        }

        Ok(webp_data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn create_test_frame(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30])))
    }

    fn assert_webp(data: &[u8]) {
        assert!(data.len() > 12);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WEBP");
    }

    #[test]
    fn test_encode_resizes_to_target_height() {
        let frame = create_test_frame(1920, 1080);
        let data = ThumbnailEncoder::encode(&frame, 180, 70).unwrap();
        assert_webp(&data);

        let decoded = image::load_from_memory(&data).unwrap();
        assert_eq!(decoded.dimensions(), (320, 180));
    }

    #[test]
    fn test_encode_rejects_empty_frame() {
        let frame = create_test_frame(0, 0);
        let result = ThumbnailEncoder::encode(&frame, 180, 70);
        assert!(matches!(result, Err(ExtractionError::ZeroDimensions)));
    }

    #[tokio::test]
    async fn test_reencode_png() {
        let mut png = Vec::new();
        create_test_frame(64, 48)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let data = ThumbnailEncoder::reencode_async(png, 24, 60).await.unwrap();
        assert_webp(&data);
    }

    #[tokio::test]
    async fn test_reencode_invalid_data() {
        let result = ThumbnailEncoder::reencode_async(vec![0, 1, 2, 3], 24, 60).await;
        assert!(matches!(result, Err(ExtractionError::Decode(_))));
    }
}
