use crate::utils::error::RoastError;
use crate::{Config, Result};
use ndarray::Array4;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::path::Path;

/// 已加载的分类模型：输入 [1, H, W, 3]，输出每类得分
pub trait RoastModel: Send + Sync {
    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>>;

    fn name(&self) -> &str;
}

/// 基于ONNX Runtime的烘焙度分类模型
pub struct OnnxRoastModel {
    session: Mutex<Session>,
    name: String,
    input_name: String,  // 动态发现的输入名称
    output_name: String, // 动态发现的输出名称
}

impl OnnxRoastModel {
    pub fn load(config: &Config) -> Result<Self> {
        Self::from_path(&config.model_path(), config)
    }

    pub fn from_path(model_path: &Path, config: &Config) -> Result<Self> {
        if !model_path.exists() {
            return Err(RoastError::ModelLoad(format!(
                "Roast model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading roast model from: {}", model_path.display());

        let level = if config.onnx_config.enable_optimization {
            match config.onnx_config.optimization_level {
                0 => GraphOptimizationLevel::Disable,
                1 => GraphOptimizationLevel::Level1,
                2 => GraphOptimizationLevel::Level2,
                _ => GraphOptimizationLevel::Level3,
            }
        } else {
            GraphOptimizationLevel::Disable
        };

        let session = Session::builder()?
            .with_optimization_level(level)?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(model_path)
            .map_err(|e| RoastError::ModelLoad(format!("{}: {}", model_path.display(), e)))?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(RoastError::ModelLoad(
                    "Roast model has no inputs".to_string(),
                ))
            }
        };

        let output_name = match session.outputs.first() {
            Some(output) => output.name.clone(),
            None => {
                return Err(RoastError::ModelLoad(
                    "Roast model has no outputs".to_string(),
                ))
            }
        };

        tracing::info!("Roast model input: '{}', output: '{}'", input_name, output_name);
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Roast model output[{}]: '{}'", i, output.name);
        }

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "roast".to_string());

        Ok(Self {
            session: Mutex::new(session),
            name,
            input_name,
            output_name,
        })
    }
}

impl RoastModel for OnnxRoastModel {
    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(input)
            .map_err(|e| RoastError::Inference(format!("failed to build input tensor: {}", e)))?;

        // 立即拷贝输出，输出缓冲随 outputs 一起释放
        let mut session = self.session.lock();
        let outputs = session
            .run(inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| RoastError::Inference(e.to_string()))?;

        let scores = match outputs.get(self.output_name.as_str()) {
            Some(output) => output
                .try_extract_array::<f32>()
                .map_err(|e| RoastError::Inference(e.to_string()))?
                .iter()
                .copied()
                .collect(),
            None => {
                let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                return Err(RoastError::Inference(format!(
                    "Roast model output '{}' not found. Available outputs: {:?}",
                    self.output_name, available
                )));
            }
        };

        Ok(scores)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
