use crate::image::InputTensor;
use crate::models::classifier::RoastModel;
use crate::models::labels::{PredictionResult, NUM_CLASSES};
use crate::utils::error::RoastError;
use crate::Result;
use std::time::Instant;

/// 推理引擎：执行前向传播并映射到标签
pub struct InferenceEngine;

impl InferenceEngine {
    /// 返回长度为4的置信度向量；输入张量在调用内被消费并释放
    pub fn predict(model: &dyn RoastModel, tensor: InputTensor) -> Result<[f32; NUM_CLASSES]> {
        let start = Instant::now();
        let shape = tensor.shape();

        let scores = model.forward(tensor.into_array()).map_err(|e| match e {
            RoastError::Inference(_) => e,
            other => RoastError::Inference(other.to_string()),
        })?;

        if scores.len() != NUM_CLASSES {
            return Err(RoastError::Inference(format!(
                "model '{}' returned {} scores for input {:?}, expected {}",
                model.name(),
                scores.len(),
                shape,
                NUM_CLASSES
            )));
        }

        if let Some(bad) = scores.iter().find(|v| !v.is_finite()) {
            return Err(RoastError::Inference(format!(
                "model '{}' returned non-finite score {}",
                model.name(),
                bad
            )));
        }

        let mut confidences = [0.0f32; NUM_CLASSES];
        confidences.copy_from_slice(&scores);

        tracing::debug!(
            "Forward pass on {:?} took {:.3}ms: {:?}",
            shape,
            start.elapsed().as_secs_f64() * 1000.0,
            confidences
        );

        Ok(confidences)
    }

    /// 推理并按 argmax 选出标签
    pub fn classify(model: &dyn RoastModel, tensor: InputTensor) -> Result<PredictionResult> {
        let confidences = Self::predict(model, tensor)?;
        PredictionResult::from_confidences(confidences)
            .ok_or_else(|| RoastError::Inference("empty confidence vector".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImagePreprocessor, RawImage, ResizePolicy};
    use crate::models::labels::RoastLevel;
    use image::{Rgb, RgbImage};
    use ndarray::Array4;

    struct FixedModel(Vec<f32>);

    impl RoastModel for FixedModel {
        fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
            assert_eq!(input.shape(), &[1, 256, 256, 3]);
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenModel;

    impl RoastModel for BrokenModel {
        fn forward(&self, _input: Array4<f32>) -> Result<Vec<f32>> {
            Err(RoastError::Internal("shape mismatch in layer 3".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn tensor() -> InputTensor {
        let image = RawImage::from_rgb(RgbImage::from_pixel(32, 24, Rgb([90, 60, 30])));
        ImagePreprocessor::new(256, ResizePolicy::Bilinear)
            .prepare(&image)
            .unwrap()
    }

    #[test]
    fn test_classify_dark() {
        let model = FixedModel(vec![0.8, 0.05, 0.05, 0.1]);
        let result = InferenceEngine::classify(&model, tensor()).unwrap();
        assert_eq!(result.label.name, RoastLevel::Dark);
        assert_eq!(result.confidences, [0.8, 0.05, 0.05, 0.1]);
    }

    #[test]
    fn test_all_tied_resolves_to_first() {
        let model = FixedModel(vec![0.25; 4]);
        let result = InferenceEngine::classify(&model, tensor()).unwrap();
        assert_eq!(result.label.name, RoastLevel::Dark);
    }

    #[test]
    fn test_wrong_length_is_inference_failure() {
        let model = FixedModel(vec![0.5, 0.5]);
        let err = InferenceEngine::predict(&model, tensor()).unwrap_err();
        assert!(matches!(err, RoastError::Inference(_)));
    }

    #[test]
    fn test_non_finite_is_inference_failure() {
        let model = FixedModel(vec![0.5, f32::NAN, 0.1, 0.1]);
        let err = InferenceEngine::predict(&model, tensor()).unwrap_err();
        assert!(matches!(err, RoastError::Inference(_)));
    }

    #[test]
    fn test_model_errors_become_inference_failures() {
        let err = InferenceEngine::predict(&BrokenModel, tensor()).unwrap_err();
        assert!(matches!(err, RoastError::Inference(_)));
    }
}
