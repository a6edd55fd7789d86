use image::{DynamicImage, RgbImage};

/// 内存中的RGB位图（来自摄像头帧或用户选择的文件）
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pixels: RgbImage,
}

impl RawImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// 任意颜色格式统一转换为3通道RGB
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            pixels: image.to_rgb8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_is_empty() {
        let image = RawImage::from_rgb(RgbImage::new(0, 12));
        assert!(image.is_empty());
        assert_eq!(image.dimensions(), (0, 12));
    }

    #[test]
    fn test_from_dynamic_drops_alpha() {
        let rgba = DynamicImage::new_rgba8(3, 2);
        let image = RawImage::from_dynamic(rgba);
        assert_eq!(image.as_rgb().as_raw().len(), 3 * 2 * 3);
    }
}
