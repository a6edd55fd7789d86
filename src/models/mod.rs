pub mod classifier;
pub mod engine;
pub mod labels;
pub mod loader;

pub use classifier::{OnnxRoastModel, RoastModel};
pub use engine::InferenceEngine;
pub use labels::{argmax, ClassLabel, PredictionResult, RoastLevel, CLASS_LABELS, NUM_CLASSES};
pub use loader::{ModelLoader, ModelProvider, ModelStatus, OnnxModelProvider};
