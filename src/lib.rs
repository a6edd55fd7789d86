pub mod capture;
pub mod config;
pub mod image;
pub mod models;
pub mod session;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use models::{PredictionResult, RoastLevel};
pub use session::{Session, SessionState};
pub use utils::error::RoastError;

pub type Result<T> = std::result::Result<T, RoastError>;
