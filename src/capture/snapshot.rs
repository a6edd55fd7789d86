use crate::capture::device::{CameraDevice, FacingMode};
use crate::capture::stream::LiveStreamCapture;
use crate::capture::{CaptureMode, CaptureRequest, CaptureSource};
use crate::image::{ImageTransforms, RawImage};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// 快照式采集：相机组件直接给出 1:1 静态图
pub struct SnapshotCapture {
    camera: LiveStreamCapture,
}

impl SnapshotCapture {
    pub fn new(device: Arc<dyn CameraDevice>, facing: FacingMode) -> Self {
        Self {
            camera: LiveStreamCapture::new(device, facing),
        }
    }
}

#[async_trait]
impl CaptureSource for SnapshotCapture {
    fn mode(&self) -> CaptureMode {
        CaptureMode::Snapshot
    }

    async fn start(&mut self, request: CaptureRequest) -> Result<()> {
        self.camera.start(request).await
    }

    async fn produce_still_image(&mut self) -> Result<RawImage> {
        let frame = self.camera.produce_still_image().await?;
        let square = ImageTransforms::center_square_crop(frame.as_rgb());
        Ok(RawImage::from_rgb(square))
    }

    fn release(&mut self) {
        self.camera.release();
    }

    fn is_active(&self) -> bool {
        self.camera.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::device::{FeedCamera, FrameFeed};
    use image::RgbImage;

    #[tokio::test]
    async fn test_snapshot_is_square_and_releases() {
        let feed = FrameFeed::new();
        let camera = Arc::new(FeedCamera::new(Arc::clone(&feed)));
        let mut capture = SnapshotCapture::new(camera, FacingMode::Environment);

        capture.start(CaptureRequest::Camera).await.unwrap();
        feed.push_frame(RawImage::from_rgb(RgbImage::new(1280, 720)));

        let image = capture.produce_still_image().await.unwrap();
        assert_eq!(image.dimensions(), (720, 720));
        assert_eq!(feed.active_streams(), 0);
        assert_eq!(capture.mode(), CaptureMode::Snapshot);
    }
}
