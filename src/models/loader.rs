use crate::models::classifier::{OnnxRoastModel, RoastModel};
use crate::utils::error::RoastError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// 模型生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// 模型产物的来源
pub trait ModelProvider: Send + Sync {
    fn load(&self) -> Result<Arc<dyn RoastModel>>;

    fn describe(&self) -> String;
}

/// 从固定路径加载ONNX模型
pub struct OnnxModelProvider {
    config: Config,
}

impl OnnxModelProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ModelProvider for OnnxModelProvider {
    fn load(&self) -> Result<Arc<dyn RoastModel>> {
        let model = OnnxRoastModel::load(&self.config)?;
        Ok(Arc::new(model))
    }

    fn describe(&self) -> String {
        self.config.model_path().display().to_string()
    }
}

/// 每个会话只加载一次模型，加载后只读共享
pub struct ModelLoader {
    provider: Arc<dyn ModelProvider>,
    status: Mutex<ModelStatus>,
    model: OnceCell<Arc<dyn RoastModel>>,
}

impl ModelLoader {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            status: Mutex::new(ModelStatus::Unloaded),
            model: OnceCell::new(),
        }
    }

    pub fn status(&self) -> ModelStatus {
        *self.status.lock()
    }

    pub fn model(&self) -> Option<Arc<dyn RoastModel>> {
        self.model.get().cloned()
    }

    pub fn source(&self) -> String {
        self.provider.describe()
    }

    /// 加载模型；失败后可再次调用，不自动重试
    pub async fn load(&self) -> Result<Arc<dyn RoastModel>> {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        {
            let mut status = self.status.lock();
            if *status == ModelStatus::Loading {
                return Err(RoastError::Busy);
            }
            *status = ModelStatus::Loading;
        }

        tracing::info!("Loading roast model from {}", self.provider.describe());

        let provider = Arc::clone(&self.provider);
        let result = tokio::task::spawn_blocking(move || provider.load())
            .await
            .map_err(|e| RoastError::ModelLoad(format!("model loading task failed: {}", e)))
            .and_then(|r| r);

        match result {
            Ok(model) => {
                let model = Arc::clone(self.model.get_or_init(|| model));
                *self.status.lock() = ModelStatus::Ready;
                tracing::info!("Roast model '{}' loaded successfully", model.name());
                Ok(model)
            }
            Err(e) => {
                *self.status.lock() = ModelStatus::Failed;
                tracing::error!("Failed to load roast model: {}", e);
                Err(match e {
                    RoastError::ModelLoad(_) => e,
                    other => RoastError::ModelLoad(other.to_string()),
                })
            }
        }
    }
}
