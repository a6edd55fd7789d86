use crate::image::{ImageTransforms, RawImage, ResizePolicy};
use crate::utils::error::RoastError;
use crate::Result;
use ndarray::{Array4, ArrayView4};

/// 模型输入张量，形状 [1, H, W, 3]，取值 [0, 1]
///
/// 张量在推理前创建，并由推理引擎按值消费，调用结束即释放。
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// 图像预处理器：缩放、归一化、添加batch维度
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    target_size: u32,
    policy: ResizePolicy,
}

impl ImagePreprocessor {
    pub fn new(target_size: u32, policy: ResizePolicy) -> Self {
        Self {
            target_size,
            policy,
        }
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    pub fn policy(&self) -> ResizePolicy {
        self.policy
    }

    /// RawImage -> [1, size, size, 3] 张量
    pub fn prepare(&self, image: &RawImage) -> Result<InputTensor> {
        if image.is_empty() {
            return Err(RoastError::InvalidImage(format!(
                "bitmap has zero dimension: {}x{}",
                image.width(),
                image.height()
            )));
        }

        let size = self.target_size as usize;
        let resized =
            ImageTransforms::resize_exact(image.as_rgb(), self.target_size, self.target_size, self.policy);

        // u8 -> f32 并缩放到 [0, 1]
        let normalized: Vec<f32> = resized
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect();

        let data = Array4::from_shape_vec((1, size, size, 3), normalized)
            .map_err(|e| RoastError::InvalidImage(format!("tensor shape mismatch: {}", e)))?;

        tracing::debug!(
            "Prepared tensor {:?} from {}x{} image ({:?})",
            data.shape(),
            image.width(),
            image.height(),
            self.policy
        );

        Ok(InputTensor { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> RawImage {
        RawImage::from_rgb(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn test_prepare_shape_and_range() {
        let preprocessor = ImagePreprocessor::new(256, ResizePolicy::Bilinear);
        for (w, h) in [(1, 1), (37, 500), (640, 480), (256, 256)] {
            let tensor = preprocessor.prepare(&gradient(w, h)).unwrap();
            assert_eq!(tensor.shape(), [1, 256, 256, 3]);
            assert!(tensor.view().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_prepare_scales_by_255() {
        let white = RawImage::from_rgb(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let black = RawImage::from_rgb(RgbImage::from_pixel(10, 10, Rgb([0, 0, 0])));
        let preprocessor = ImagePreprocessor::new(256, ResizePolicy::Nearest);

        let white = preprocessor.prepare(&white).unwrap();
        let black = preprocessor.prepare(&black).unwrap();
        assert!(white.view().iter().all(|v| *v == 1.0));
        assert!(black.view().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_prepare_keeps_channel_order() {
        let red = RawImage::from_rgb(RgbImage::from_pixel(4, 4, Rgb([255, 0, 51])));
        let tensor = ImagePreprocessor::new(256, ResizePolicy::Bilinear)
            .prepare(&red)
            .unwrap();
        let view = tensor.view();
        assert_eq!(view[[0, 100, 100, 0]], 1.0);
        assert_eq!(view[[0, 100, 100, 1]], 0.0);
        assert!((view[[0, 100, 100, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_prepare_is_deterministic() {
        let preprocessor = ImagePreprocessor::new(256, ResizePolicy::Bilinear);
        let image = gradient(300, 200);
        assert_eq!(preprocessor.prepare(&image).unwrap(), preprocessor.prepare(&image).unwrap());
    }

    #[test]
    fn test_zero_dimension_fails_with_invalid_image() {
        let preprocessor = ImagePreprocessor::new(256, ResizePolicy::Bilinear);
        for (w, h) in [(0, 0), (0, 10), (10, 0)] {
            let empty = RawImage::from_rgb(RgbImage::new(w, h));
            let err = preprocessor.prepare(&empty).unwrap_err();
            assert!(matches!(err, RoastError::InvalidImage(_)));
        }
    }
}
