use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Serialize;

/// 缩放插值策略，默认双线性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResizePolicy {
    #[default]
    Bilinear,
    Nearest,
}

impl ResizePolicy {
    pub fn filter(self) -> FilterType {
        match self {
            ResizePolicy::Bilinear => FilterType::Triangle,
            ResizePolicy::Nearest => FilterType::Nearest,
        }
    }
}

/// 图像变换工具集
pub struct ImageTransforms;

impl ImageTransforms {
    /// 缩放到精确尺寸（不保持宽高比）
    pub fn resize_exact(
        image: &RgbImage,
        target_width: u32,
        target_height: u32,
        policy: ResizePolicy,
    ) -> RgbImage {
        if image.dimensions() == (target_width, target_height) {
            return image.clone();
        }
        imageops::resize(image, target_width, target_height, policy.filter())
    }

    /// 居中裁剪为正方形（1:1）
    pub fn center_square_crop(image: &RgbImage) -> RgbImage {
        let (width, height) = image.dimensions();
        let side = width.min(height);
        let x = (width - side) / 2;
        let y = (height - side) / 2;

        imageops::crop_imm(image, x, y, side, side).to_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_resize_exact_both_policies() {
        let img = RgbImage::from_pixel(640, 480, Rgb([10, 20, 30]));
        for policy in [ResizePolicy::Bilinear, ResizePolicy::Nearest] {
            let resized = ImageTransforms::resize_exact(&img, 256, 256, policy);
            assert_eq!(resized.dimensions(), (256, 256));
            // 纯色图像缩放后颜色不变
            assert_eq!(resized.get_pixel(128, 128), &Rgb([10, 20, 30]));
        }
    }

    #[test]
    fn test_upscale_tiny_image() {
        let img = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
        let resized = ImageTransforms::resize_exact(&img, 256, 256, ResizePolicy::Bilinear);
        assert_eq!(resized.dimensions(), (256, 256));
        assert_eq!(resized.get_pixel(255, 255), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_center_square_crop_landscape() {
        let mut img = RgbImage::new(6, 4);
        img.put_pixel(1, 0, Rgb([9, 9, 9]));
        let cropped = ImageTransforms::center_square_crop(&img);
        assert_eq!(cropped.dimensions(), (4, 4));
        // 左侧裁掉1列
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([9, 9, 9]));
    }

    #[test]
    fn test_center_square_crop_portrait() {
        let img = RgbImage::new(3, 9);
        let cropped = ImageTransforms::center_square_crop(&img);
        assert_eq!(cropped.dimensions(), (3, 3));
    }
}
