use crate::capture::device::{acquire_stream, CameraDevice, FacingMode, StreamGuard};
use crate::capture::{CaptureMode, CaptureRequest, CaptureSource};
use crate::image::RawImage;
use crate::utils::error::RoastError;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// 实时视频流采集：持续预览，触发时拷贝当前帧
pub struct LiveStreamCapture {
    device: Arc<dyn CameraDevice>,
    facing: FacingMode,
    stream: Option<StreamGuard>,
}

impl LiveStreamCapture {
    pub fn new(device: Arc<dyn CameraDevice>, facing: FacingMode) -> Self {
        Self {
            device,
            facing,
            stream: None,
        }
    }
}

#[async_trait]
impl CaptureSource for LiveStreamCapture {
    fn mode(&self) -> CaptureMode {
        CaptureMode::LiveStream
    }

    async fn start(&mut self, request: CaptureRequest) -> Result<()> {
        if let CaptureRequest::File(_) = request {
            return Err(RoastError::InvalidInput(
                "file selection is not available in live stream mode".to_string(),
            ));
        }

        self.release();
        let guard = acquire_stream(self.device.as_ref(), self.facing).await?;
        self.stream = Some(guard);
        tracing::info!("Live camera stream started");
        Ok(())
    }

    async fn produce_still_image(&mut self) -> Result<RawImage> {
        // 取出后无论成功与否，guard 离开作用域即释放设备
        let mut guard = self.stream.take().ok_or_else(|| {
            RoastError::InvalidImage("camera stream is not active".to_string())
        })?;
        let frame = guard.grab_frame();
        guard.release();

        let frame = frame?;
        tracing::info!("Captured frame {}x{}", frame.width(), frame.height());
        Ok(frame)
    }

    fn release(&mut self) {
        if let Some(mut guard) = self.stream.take() {
            guard.release();
        }
    }

    fn is_active(&self) -> bool {
        self.stream.as_ref().is_some_and(|g| g.is_live())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::device::{DeviceAvailability, FeedCamera, FrameFeed};
    use crate::capture::SelectedFile;
    use image::RgbImage;

    fn capture_with_feed() -> (LiveStreamCapture, Arc<FrameFeed>) {
        let feed = FrameFeed::new();
        let camera = Arc::new(FeedCamera::new(Arc::clone(&feed)));
        (LiveStreamCapture::new(camera, FacingMode::Environment), feed)
    }

    #[tokio::test]
    async fn test_capture_releases_device() {
        let (mut capture, feed) = capture_with_feed();
        capture.start(CaptureRequest::Camera).await.unwrap();
        assert!(capture.is_active());

        feed.push_frame(RawImage::from_rgb(RgbImage::new(640, 480)));
        let image = capture.produce_still_image().await.unwrap();

        assert_eq!(image.dimensions(), (640, 480));
        assert!(!capture.is_active());
        assert_eq!(feed.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_failed_capture_releases_device() {
        let (mut capture, feed) = capture_with_feed();
        capture.start(CaptureRequest::Camera).await.unwrap();
        feed.push_frame(RawImage::from_rgb(RgbImage::new(0, 0)));

        let err = capture.produce_still_image().await.unwrap_err();
        assert!(matches!(err, RoastError::InvalidImage(_)));
        assert_eq!(feed.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_restart_does_not_leak_stream() {
        let (mut capture, feed) = capture_with_feed();
        capture.start(CaptureRequest::Camera).await.unwrap();
        capture.start(CaptureRequest::Camera).await.unwrap();
        assert_eq!(feed.active_streams(), 1);

        capture.release();
        assert_eq!(feed.active_streams(), 0);
    }

    #[tokio::test]
    async fn test_denied_leaves_inactive() {
        let (mut capture, feed) = capture_with_feed();
        feed.report(DeviceAvailability::PermissionDenied);

        let err = capture.start(CaptureRequest::Camera).await.unwrap_err();
        assert!(matches!(err, RoastError::DevicePermissionDenied(_)));
        assert!(!capture.is_active());
    }

    #[tokio::test]
    async fn test_rejects_file_request() {
        let (mut capture, _feed) = capture_with_feed();
        let file = SelectedFile::new(vec![1, 2, 3], None, Some("image/png".to_string())).unwrap();
        assert!(capture.start(CaptureRequest::File(file)).await.is_err());
    }
}
