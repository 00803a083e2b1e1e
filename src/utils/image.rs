use crate::error::{AppError, Result};
use image::{
    codecs::jpeg::JpegEncoder,
    codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder},
    codecs::webp::{WebPEncoder, WebPQuality},
    imageops::FilterType,
    ColorType, DynamicImage, GenericImageView, ImageEncoder, ImageFormat,
};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// 图片优化配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProcessOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// 1-100，用于有损格式
    pub quality: u8,
}

impl Default for ImageProcessOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            quality: 85,
        }
    }
}

/// 缩略图配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailOptions {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            quality: 80,
        }
    }
}

/// 优化结果及其元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub is_optimized: bool,
    pub original_size: usize,
    pub optimized_size: usize,
    /// (原始大小 - 优化后大小) / 原始大小 * 100，保留2位小数，可能为负
    pub compression_ratio: f64,
}

/// 图片处理工具
///
/// 解码、按边界缩放、按格式重新编码，并生成居中裁剪的JPEG缩略图。
/// 所有失败都以 `AppError::ImageProcessing` 返回，调用方据此中止上传。
pub struct ImageProcessor;

impl ImageProcessor {
    /// 检测图片格式，无法识别时返回错误
    pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
        image::guess_format(data)
            .map_err(|_| AppError::ImageProcessing("无法识别的图片格式".to_string()))
    }

    /// 不完整解码，仅从文件头读取尺寸
    pub fn probe_dimensions(data: &[u8]) -> Result<(u32, u32)> {
        let size = imagesize::blob_size(data)
            .map_err(|e| AppError::ImageProcessing(format!("无法读取图片尺寸: {}", e)))?;
        Ok((size.width as u32, size.height as u32))
    }

    /// 优化图片：超出边界时等比缩小（从不放大），并按检测到的格式重新编码。
    /// GIF原样透传，避免破坏动画帧。
    pub fn optimize(data: &[u8], options: &ImageProcessOptions) -> Result<ProcessedImage> {
        let original_size = data.len();
        let format = Self::detect_format(data)?;

        if format == ImageFormat::Gif {
            let (width, height) = Self::probe_dimensions(data)?;
            return Ok(ProcessedImage {
                data: data.to_vec(),
                width,
                height,
                format: "gif".to_string(),
                is_optimized: false,
                original_size,
                optimized_size: original_size,
                compression_ratio: 0.0,
            });
        }

        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| AppError::ImageProcessing(format!("图片解码失败: {}", e)))?;

        let (width, height) = img.dimensions();
        let (target_width, target_height) =
            fit_within(width, height, options.max_width, options.max_height);

        let resized = if (target_width, target_height) != (width, height) {
            img.resize_exact(target_width, target_height, FilterType::Lanczos3)
        } else {
            img
        };

        let (encoded, output_format) = match format {
            ImageFormat::Jpeg => (Self::encode_jpeg(&resized, options.quality)?, "jpeg"),
            ImageFormat::Png => (Self::encode_png(&resized)?, "png"),
            ImageFormat::WebP => (Self::encode_webp(&resized, options.quality)?, "webp"),
            _ => (Self::encode_jpeg(&resized, options.quality)?, "jpeg"),
        };

        let optimized_size = encoded.len();

        Ok(ProcessedImage {
            data: encoded,
            width: target_width,
            height: target_height,
            format: output_format.to_string(),
            is_optimized: true,
            original_size,
            optimized_size,
            compression_ratio: compression_ratio(original_size, optimized_size),
        })
    }

    /// 生成固定尺寸、居中裁剪的缩略图，始终输出JPEG
    pub fn thumbnail(data: &[u8], options: &ThumbnailOptions) -> Result<Vec<u8>> {
        let img = image::load_from_memory(data)
            .map_err(|e| AppError::ImageProcessing(format!("图片解码失败: {}", e)))?;

        let cropped = img.resize_to_fill(options.width, options.height, FilterType::Lanczos3);
        Self::encode_jpeg(&cropped, options.quality)
    }

    fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let rgb = img.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality);
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| AppError::ImageProcessing(format!("JPEG编码失败: {}", e)))?;
        Ok(buffer)
    }

    fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
        let rgba = img.to_rgba8();
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            Cursor::new(&mut buffer),
            CompressionType::Best,
            PngFilterType::Adaptive,
        );
        encoder
            .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
            .map_err(|e| AppError::ImageProcessing(format!("PNG编码失败: {}", e)))?;
        Ok(buffer)
    }

    fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let rgb = img.to_rgb8();
        let mut buffer = Vec::new();
        #[allow(deprecated)]
        let encoder =
            WebPEncoder::new_with_quality(Cursor::new(&mut buffer), WebPQuality::lossy(quality));
        encoder
            .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| AppError::ImageProcessing(format!("WebP编码失败: {}", e)))?;
        Ok(buffer)
    }
}

/// 计算等比缩放到边界框内的目标尺寸，不放大
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let width_ratio = max_width as f64 / width as f64;
    let height_ratio = max_height as f64 / height as f64;
    let ratio = width_ratio.min(height_ratio);

    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);
    (new_width, new_height)
}

/// 压缩率百分比，保留2位小数
pub fn compression_ratio(original_size: usize, optimized_size: usize) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let ratio =
        (original_size as f64 - optimized_size as f64) / original_size as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage};

    fn encode_test_image(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn test_fit_within_preserves_aspect_ratio() {
        // 4000x3000 在 1920x1920 内等比缩放
        assert_eq!(fit_within(4000, 3000, 1920, 1920), (1920, 1440));
        // 竖图
        assert_eq!(fit_within(3000, 4000, 1920, 1920), (1440, 1920));
        // 不放大
        assert_eq!(fit_within(800, 600, 1920, 1920), (800, 600));
        assert_eq!(fit_within(1920, 1920, 1920, 1920), (1920, 1920));
    }

    #[test]
    fn test_compression_ratio_rounding() {
        assert_eq!(compression_ratio(1000, 700), 30.0);
        assert_eq!(compression_ratio(3, 1), 66.67);
        // 优化后反而变大时为负值
        assert_eq!(compression_ratio(100, 150), -50.0);
        assert_eq!(compression_ratio(0, 100), 0.0);
    }

    #[test]
    fn test_optimize_small_png_keeps_dimensions() {
        let data = encode_test_image(100, 50, ImageOutputFormat::Png);
        let result = ImageProcessor::optimize(&data, &ImageProcessOptions::default()).unwrap();

        assert_eq!(result.width, 100);
        assert_eq!(result.height, 50);
        assert_eq!(result.format, "png");
        assert!(result.is_optimized);
        assert_eq!(result.original_size, data.len());
        assert_eq!(result.optimized_size, result.data.len());
    }

    #[test]
    fn test_optimize_resizes_oversized_jpeg() {
        let data = encode_test_image(2400, 1800, ImageOutputFormat::Jpeg(90));
        let result = ImageProcessor::optimize(&data, &ImageProcessOptions::default()).unwrap();

        assert_eq!(result.width, 1920);
        assert_eq!(result.height, 1440);
        assert_eq!(result.format, "jpeg");
        assert!(result.is_optimized);
        assert_eq!(
            result.compression_ratio,
            compression_ratio(result.original_size, result.optimized_size)
        );
    }

    #[test]
    fn test_optimize_gif_passthrough() {
        let data = encode_test_image(64, 64, ImageOutputFormat::Gif);
        let result = ImageProcessor::optimize(&data, &ImageProcessOptions::default()).unwrap();

        assert_eq!(result.data, data);
        assert_eq!(result.format, "gif");
        assert!(!result.is_optimized);
        assert_eq!(result.compression_ratio, 0.0);
    }

    #[test]
    fn test_thumbnail_is_fixed_size_jpeg() {
        let data = encode_test_image(640, 480, ImageOutputFormat::Png);
        let thumb = ImageProcessor::thumbnail(&data, &ThumbnailOptions::default()).unwrap();

        assert_eq!(ImageProcessor::detect_format(&thumb).unwrap(), ImageFormat::Jpeg);
        assert_eq!(ImageProcessor::probe_dimensions(&thumb).unwrap(), (300, 300));
    }

    #[test]
    fn test_corrupt_input_is_rejected() {
        let garbage = vec![0u8; 64];
        assert!(ImageProcessor::optimize(&garbage, &ImageProcessOptions::default()).is_err());
        assert!(ImageProcessor::thumbnail(&garbage, &ThumbnailOptions::default()).is_err());

        // 合法文件头 + 损坏的数据体
        let mut truncated = encode_test_image(100, 100, ImageOutputFormat::Png);
        truncated.truncate(32);
        assert!(ImageProcessor::optimize(&truncated, &ImageProcessOptions::default()).is_err());
    }
}
