use crate::image::RawImage;
use crate::utils::error::RoastError;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 摄像头朝向提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// 后置摄像头
    #[default]
    Environment,
    /// 前置摄像头
    User,
    /// 不限制，使用默认摄像头
    Any,
}

/// 视频输入设备
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// 打开视频流（可能等待用户授权）
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>>;
}

/// 已打开的视频流
pub trait MediaStream: Send {
    /// 以原始分辨率拷贝当前帧
    fn grab_frame(&mut self) -> Result<RawImage>;

    /// 停止所有轨道，可重复调用
    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// 持有视频流，离开作用域时停止所有轨道
pub struct StreamGuard {
    stream: Option<Box<dyn MediaStream>>,
}

impl StreamGuard {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn grab_frame(&mut self) -> Result<RawImage> {
        match self.stream.as_mut() {
            Some(stream) if stream.is_live() => stream.grab_frame(),
            _ => Err(RoastError::InvalidImage(
                "camera stream was closed before capture".to_string(),
            )),
        }
    }

    pub fn is_live(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_live())
    }

    /// 释放设备，返回本次是否真正执行了释放
    pub fn release(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop();
                tracing::debug!("Camera stream released");
                true
            }
            None => false,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// 按朝向提示打开摄像头；提示无法满足时回退到默认摄像头，授权被拒绝时不回退
pub async fn acquire_stream(device: &dyn CameraDevice, facing: FacingMode) -> Result<StreamGuard> {
    match device.open(facing).await {
        Ok(stream) => Ok(StreamGuard::new(stream)),
        Err(RoastError::FacingUnavailable(reason)) if facing != FacingMode::Any => {
            tracing::info!(
                "Camera facing {:?} unavailable ({}), falling back to default camera",
                facing,
                reason
            );
            let stream = device.open(FacingMode::Any).await.map_err(|e| match e {
                RoastError::FacingUnavailable(msg) => RoastError::NoDeviceAvailable(msg),
                other => other,
            })?;
            Ok(StreamGuard::new(stream))
        }
        Err(RoastError::FacingUnavailable(msg)) => Err(RoastError::NoDeviceAvailable(msg)),
        Err(e) => Err(e),
    }
}

/// 设备授权状态（由前端上报）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAvailability {
    #[default]
    Available,
    PermissionDenied,
    NoDevice,
}

/// 连续帧源：生产者不断写入最新帧，采集时读取
#[derive(Debug, Default)]
pub struct FrameFeed {
    latest: Mutex<Option<RawImage>>,
    availability: Mutex<DeviceAvailability>,
    active_streams: AtomicUsize,
}

impl FrameFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_frame(&self, frame: RawImage) {
        *self.latest.lock() = Some(frame);
    }

    pub fn latest_frame(&self) -> Option<RawImage> {
        self.latest.lock().clone()
    }

    pub fn report(&self, availability: DeviceAvailability) {
        tracing::debug!("Camera availability reported: {:?}", availability);
        *self.availability.lock() = availability;
    }

    pub fn availability(&self) -> DeviceAvailability {
        *self.availability.lock()
    }

    /// 当前未释放的视频流数量
    pub fn active_streams(&self) -> usize {
        self.active_streams.load(Ordering::SeqCst)
    }
}

/// 由 FrameFeed 驱动的摄像头
pub struct FeedCamera {
    feed: Arc<FrameFeed>,
}

impl FeedCamera {
    pub fn new(feed: Arc<FrameFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl CameraDevice for FeedCamera {
    async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>> {
        match self.feed.availability() {
            DeviceAvailability::PermissionDenied => {
                return Err(RoastError::DevicePermissionDenied(
                    "camera access was not granted".to_string(),
                ))
            }
            DeviceAvailability::NoDevice => {
                return Err(RoastError::NoDeviceAvailable(
                    "no video input device present".to_string(),
                ))
            }
            DeviceAvailability::Available => {}
        }

        // 新流只接受打开之后推送的帧
        *self.feed.latest.lock() = None;
        self.feed.active_streams.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Feed camera opened (facing hint: {:?})", facing);

        Ok(Box::new(FeedStream {
            feed: Arc::clone(&self.feed),
            live: true,
        }))
    }
}

struct FeedStream {
    feed: Arc<FrameFeed>,
    live: bool,
}

impl MediaStream for FeedStream {
    fn grab_frame(&mut self) -> Result<RawImage> {
        let frame = self
            .feed
            .latest_frame()
            .ok_or_else(|| RoastError::InvalidImage("no camera frame received yet".to_string()))?;
        if frame.is_empty() {
            return Err(RoastError::InvalidImage(format!(
                "camera frame has zero dimension: {}x{}",
                frame.width(),
                frame.height()
            )));
        }
        Ok(frame)
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.feed.active_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for FeedStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct RearlessCamera {
        feed: Arc<FrameFeed>,
    }

    #[async_trait]
    impl CameraDevice for RearlessCamera {
        async fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>> {
            if facing == FacingMode::Environment {
                return Err(RoastError::FacingUnavailable("no rear camera".to_string()));
            }
            FeedCamera::new(Arc::clone(&self.feed)).open(facing).await
        }
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let feed = FrameFeed::new();
        let camera = FeedCamera::new(Arc::clone(&feed));
        {
            let guard = acquire_stream(&camera, FacingMode::Environment).await.unwrap();
            assert!(guard.is_live());
            assert_eq!(feed.active_streams(), 1);
        }
        assert_eq!(feed.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let feed = FrameFeed::new();
        let camera = FeedCamera::new(Arc::clone(&feed));
        let mut guard = acquire_stream(&camera, FacingMode::Any).await.unwrap();
        assert!(guard.release());
        assert!(!guard.release());
        assert_eq!(feed.active_streams(), 0);
        assert!(guard.grab_frame().is_err());
    }

    #[tokio::test]
    async fn test_falls_back_to_default_camera() {
        let feed = FrameFeed::new();
        let camera = RearlessCamera {
            feed: Arc::clone(&feed),
        };
        let guard = acquire_stream(&camera, FacingMode::Environment).await.unwrap();
        assert!(guard.is_live());
    }

    #[tokio::test]
    async fn test_permission_denied_does_not_fall_back() {
        let feed = FrameFeed::new();
        feed.report(DeviceAvailability::PermissionDenied);
        let camera = FeedCamera::new(Arc::clone(&feed));
        let err = acquire_stream(&camera, FacingMode::Environment)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RoastError::DevicePermissionDenied(_)));
        assert_eq!(feed.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_grab_copies_latest_frame() {
        let feed = FrameFeed::new();
        let camera = FeedCamera::new(Arc::clone(&feed));
        let mut guard = acquire_stream(&camera, FacingMode::Any).await.unwrap();

        assert!(matches!(guard.grab_frame(), Err(RoastError::InvalidImage(_))));

        feed.push_frame(RawImage::from_rgb(RgbImage::new(1280, 720)));
        let frame = guard.grab_frame().unwrap();
        assert_eq!(frame.dimensions(), (1280, 720));
    }

    #[tokio::test]
    async fn test_reopened_stream_ignores_previous_frames() {
        let feed = FrameFeed::new();
        let camera = FeedCamera::new(Arc::clone(&feed));

        let mut first = acquire_stream(&camera, FacingMode::Any).await.unwrap();
        feed.push_frame(RawImage::from_rgb(RgbImage::new(640, 480)));
        first.grab_frame().unwrap();
        first.release();

        let mut second = acquire_stream(&camera, FacingMode::Any).await.unwrap();
        assert!(matches!(second.grab_frame(), Err(RoastError::InvalidImage(_))));

        feed.push_frame(RawImage::from_rgb(RgbImage::new(320, 240)));
        assert_eq!(second.grab_frame().unwrap().dimensions(), (320, 240));
    }
}
