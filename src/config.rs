use crate::capture::{CaptureMode, FacingMode};
use crate::image::ResizePolicy;
use anyhow::Result;
use std::path::PathBuf;

/// 模型输入的固定空间分辨率
pub const TARGET_SIZE: u32 = 256;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型文件目录
    pub models_dir: PathBuf,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 采集与预处理配置
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,

    /// 启用图优化
    pub enable_optimization: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 图像采集方式
    pub capture_mode: CaptureMode,

    /// 缩放插值策略
    pub resize_policy: ResizePolicy,

    /// 目标边长（像素）
    pub target_size: u32,

    /// 优先请求的摄像头朝向
    pub facing: FacingMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_mode: CaptureMode::LiveStream,
            resize_policy: ResizePolicy::Bilinear,
            target_size: TARGET_SIZE,
            facing: FacingMode::Environment,
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        workers: Option<usize>,
        dev_mode: bool,
        pipeline: PipelineConfig,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);

        if workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
            enable_optimization: true,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 20 * 1024 * 1024, // 20MB
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            workers,
            dev_mode,
            onnx_config,
            server_config,
            pipeline,
        })
    }

    /// 获取烘焙度分类模型路径
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join("roast/model.onnx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_is_well_known() {
        let config = Config::new(
            "127.0.0.1:0".to_string(),
            "/srv/models".to_string(),
            Some(2),
            false,
            PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(config.model_path(), PathBuf::from("/srv/models/roast/model.onnx"));
        assert_eq!(config.pipeline.target_size, 256);
        assert_eq!(config.pipeline.resize_policy, ResizePolicy::Bilinear);
        assert!(config.onnx_config.intra_threads >= 1);
    }

    #[test]
    fn test_dev_mode_extends_timeout() {
        let config = Config::new(
            "127.0.0.1:0".to_string(),
            "models".to_string(),
            None,
            true,
            PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(config.server_config.request_timeout, 300);
    }
}
