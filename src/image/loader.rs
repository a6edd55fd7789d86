use crate::image::RawImage;
use crate::utils::error::RoastError;
use crate::Result;
use base64::Engine;
use image::ImageFormat;

pub struct ImageLoader;

impl ImageLoader {
    /// 解码base64或数据URL，返回字节与声明的MIME类型
    pub fn decode_base64(base64_data: &str) -> Result<(Vec<u8>, Option<String>)> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let (payload, content_type) = match base64_data.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or_else(|| {
                    RoastError::InvalidInput("Malformed data URL".to_string())
                })?;
                let mime = header.split(';').next().unwrap_or_default();
                if !mime.starts_with("image/") {
                    return Err(RoastError::UnsupportedFormat(mime.to_string()));
                }
                (payload, Some(mime.to_string()))
            }
            None => (base64_data, None),
        };

        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        Ok((bytes, content_type))
    }

    /// 从字节流加载图像
    pub fn from_bytes(bytes: &[u8], max_size: usize) -> Result<RawImage> {
        if bytes.is_empty() {
            return Err(RoastError::InvalidImage("Empty image data".to_string()));
        }

        if bytes.len() > max_size {
            return Err(RoastError::FileTooLarge(bytes.len(), max_size));
        }

        let image = image::load_from_memory(bytes)?;
        Ok(RawImage::from_dynamic(image))
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 未声明MIME类型时按文件头识别
    pub fn sniff_content_type(bytes: &[u8]) -> Result<String> {
        match Self::detect_format(bytes) {
            Some(format) if Self::is_supported_format(format) => Ok(format.to_mime_type().to_string()),
            Some(format) => Err(RoastError::UnsupportedFormat(format.to_mime_type().to_string())),
            None => Err(RoastError::UnsupportedFormat("unrecognized file content".to_string())),
        }
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Bmp
                | ImageFormat::Gif
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }
}
