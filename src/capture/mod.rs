pub mod device;
pub mod file;
pub mod snapshot;
pub mod stream;

pub use device::{
    acquire_stream, CameraDevice, DeviceAvailability, FacingMode, FeedCamera, FrameFeed, MediaStream,
    StreamGuard,
};
pub use file::{FileCapture, SelectedFile};
pub use snapshot::SnapshotCapture;
pub use stream::LiveStreamCapture;

use crate::image::RawImage;
use crate::{Config, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// 图像采集方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// 实时视频流 + 手动拍照
    LiveStream,
    /// 相机组件快照（1:1）
    Snapshot,
    /// 本地文件上传
    File,
}

/// 开始采集的请求
#[derive(Debug)]
pub enum CaptureRequest {
    Camera,
    File(SelectedFile),
}

/// 统一的采集接口：产出一张静态图
#[async_trait]
pub trait CaptureSource: Send {
    fn mode(&self) -> CaptureMode;

    /// 申请设备或接收文件
    async fn start(&mut self, request: CaptureRequest) -> Result<()>;

    /// 产出静态图；设备在返回前释放
    async fn produce_still_image(&mut self) -> Result<RawImage>;

    /// 同步释放所有设备/文件句柄，可重复调用
    fn release(&mut self);

    fn is_active(&self) -> bool;
}

/// 按配置选择采集实现
pub fn build_capture_source(config: &Config, camera: Arc<dyn CameraDevice>) -> Box<dyn CaptureSource> {
    let facing = config.pipeline.facing;
    match config.pipeline.capture_mode {
        CaptureMode::LiveStream => Box::new(LiveStreamCapture::new(camera, facing)),
        CaptureMode::Snapshot => Box::new(SnapshotCapture::new(camera, facing)),
        CaptureMode::File => Box::new(FileCapture::new(config.server_config.max_request_size)),
    }
}
