use crate::capture::{build_capture_source, CameraDevice, CaptureMode, CaptureRequest, CaptureSource};
use crate::image::{ImagePreprocessor, RawImage};
use crate::models::{InferenceEngine, ModelLoader, ModelProvider, ModelStatus, PredictionResult};
use crate::session::state::{
    CaptureStatus, ImageSummary, SessionEvent, SessionPhase, SessionState,
};
use crate::utils::error::{ErrorInfo, RoastError};
use crate::{Config, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

struct SessionInner {
    phase: SessionPhase,
    busy: bool,
    /// 每次 reset 递增；完成回调据此识别过期结果
    token: u64,
    camera_active: bool,
    image: Option<Arc<RawImage>>,
    prediction: Option<PredictionResult>,
    error: Option<ErrorInfo>,
    /// 模型加载失败的全局提示，仅在重新加载成功后清除
    model_error: Option<ErrorInfo>,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            busy: false,
            token: 0,
            camera_active: false,
            image: None,
            prediction: None,
            error: None,
            model_error: None,
        }
    }

    fn require_phase(&self, operation: &'static str, allowed: &[SessionPhase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(RoastError::InvalidTransition {
                operation,
                state: self.phase.to_string(),
            })
        }
    }
}

/// 会话状态机：唯一持有会话状态，串行化采集与推理
pub struct Session {
    loader: ModelLoader,
    capture: AsyncMutex<Box<dyn CaptureSource>>,
    capture_mode: CaptureMode,
    preprocessor: ImagePreprocessor,
    inner: Mutex<SessionInner>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl Session {
    pub fn new(loader: ModelLoader, capture: Box<dyn CaptureSource>, preprocessor: ImagePreprocessor) -> Self {
        let capture_mode = capture.mode();
        Self {
            loader,
            capture: AsyncMutex::new(capture),
            capture_mode,
            preprocessor,
            inner: Mutex::new(SessionInner::new()),
            events: None,
        }
    }

    pub fn from_config(
        config: &Config,
        provider: Arc<dyn ModelProvider>,
        camera: Arc<dyn CameraDevice>,
    ) -> Self {
        let preprocessor =
            ImagePreprocessor::new(config.pipeline.target_size, config.pipeline.resize_policy);
        Self::new(
            ModelLoader::new(provider),
            build_capture_source(config, camera),
            preprocessor,
        )
    }

    /// 订阅状态转换事件
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.capture_mode
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    pub fn model_status(&self) -> ModelStatus {
        self.loader.status()
    }

    pub fn model_source(&self) -> String {
        self.loader.source()
    }

    pub fn image(&self) -> Option<Arc<RawImage>> {
        self.inner.lock().image.clone()
    }

    pub fn snapshot(&self) -> SessionState {
        let inner = self.inner.lock();
        let capture_status = if inner.image.is_some() {
            CaptureStatus::ImageCaptured
        } else if inner.camera_active {
            CaptureStatus::CameraActive
        } else {
            CaptureStatus::Idle
        };

        SessionState {
            model_status: self.loader.status(),
            capture_status,
            capture_mode: self.capture_mode,
            phase: inner.phase,
            busy: inner.busy,
            image: inner.image.as_ref().map(|img| ImageSummary {
                width: img.width(),
                height: img.height(),
            }),
            prediction: inner.prediction.clone(),
            error: inner.error.clone().or_else(|| inner.model_error.clone()),
        }
    }

    fn emit(&self, phase: SessionPhase, token: u64, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("Session [{}] -> {}: {}", token, phase, message);
        if let Some(ref tx) = self.events {
            let _ = tx.send(SessionEvent::new(phase, token, message));
        }
    }

    /// 进入一个操作：忙时直接拒绝且不修改状态
    fn begin<T>(&self, enter: impl FnOnce(&mut SessionInner) -> Result<T>) -> Result<(u64, T)> {
        let mut inner = self.inner.lock();
        if inner.busy {
            return Err(RoastError::Busy);
        }
        let value = enter(&mut inner)?;
        inner.busy = true;
        Ok((inner.token, value))
    }

    /// 结束操作；token 已过期则丢弃结果并返回 false
    fn finish(&self, token: u64, apply: impl FnOnce(&mut SessionInner)) -> bool {
        let mut inner = self.inner.lock();
        inner.busy = false;
        if inner.token != token {
            return false;
        }
        apply(&mut inner);
        true
    }

    /// 加载模型（每个会话一次；失败后可手动重试）
    ///
    /// 全局提示不受 token 过期影响。
    pub async fn load_model(&self) -> Result<()> {
        let (token, _) = self.begin(|_| Ok(()))?;

        let result = self.loader.load().await;
        self.inner.lock().model_error = result.as_ref().err().map(RoastError::error_info);
        self.finish(token, |_| {});

        match result {
            Ok(model) => {
                self.emit(self.phase(), token, format!("model '{}' ready", model.name()));
                Ok(())
            }
            Err(e) => {
                self.emit(self.phase(), token, format!("model load failed: {}", e));
                Err(e)
            }
        }
    }

    /// 模型未就绪时重新加载；已就绪时不做任何事
    pub async fn ensure_model(&self) -> Result<()> {
        match self.loader.status() {
            ModelStatus::Ready => Ok(()),
            _ => self.load_model().await,
        }
    }

    /// Idle/Errored -> Capturing
    pub async fn start_capture(&self, request: CaptureRequest) -> Result<()> {
        let (token, _) = self.begin(|inner| {
            inner.require_phase("start_capture", &[SessionPhase::Idle, SessionPhase::Errored])?;
            inner.phase = SessionPhase::Capturing;
            inner.image = None;
            inner.prediction = None;
            inner.error = None;
            Ok(())
        })?;
        self.emit(SessionPhase::Capturing, token, "capture requested");

        let mut source = self.capture.lock().await;
        let result = source.start(request).await;

        match result {
            Ok(()) => {
                let active = source.is_active();
                if !self.finish(token, |inner| inner.camera_active = active) {
                    source.release();
                    tracing::debug!("Discarding stale capture start [{}]", token);
                }
                Ok(())
            }
            Err(e) => {
                source.release();
                let info = e.error_info();
                if self.finish(token, |inner| {
                    inner.phase = SessionPhase::Errored;
                    inner.camera_active = false;
                    inner.error = Some(info);
                }) {
                    self.emit(SessionPhase::Errored, token, format!("capture start failed: {}", e));
                }
                Err(e)
            }
        }
    }

    /// Capturing -> Captured | Errored
    pub async fn capture_image(&self) -> Result<()> {
        let (token, _) = self.begin(|inner| inner.require_phase("capture_image", &[SessionPhase::Capturing]))?;

        let result = {
            let mut source = self.capture.lock().await;
            let result = source.produce_still_image().await;
            source.release();
            result
        };

        match result {
            Ok(image) => {
                let (width, height) = image.dimensions();
                let image = Arc::new(image);
                if self.finish(token, |inner| {
                    inner.phase = SessionPhase::Captured;
                    inner.camera_active = false;
                    inner.image = Some(image);
                    inner.prediction = None;
                    inner.error = None;
                }) {
                    self.emit(SessionPhase::Captured, token, format!("image captured {}x{}", width, height));
                } else {
                    tracing::debug!("Discarding stale capture [{}]", token);
                }
                Ok(())
            }
            Err(e) => {
                let info = e.error_info();
                if self.finish(token, |inner| {
                    inner.phase = SessionPhase::Errored;
                    inner.camera_active = false;
                    inner.error = Some(info);
                }) {
                    self.emit(SessionPhase::Errored, token, format!("capture failed: {}", e));
                }
                Err(e)
            }
        }
    }

    /// Captured -> Predicting -> Resulted | Errored
    ///
    /// 返回 `Ok(None)` 表示结果到达时会话已被重置，结果被丢弃。
    pub async fn predict(&self) -> Result<Option<PredictionResult>> {
        let (token, (image, model)) = self.begin(|inner| {
            let model = self.loader.model().ok_or_else(|| {
                RoastError::ModelUnavailable(format!("model status is {:?}", self.loader.status()))
            })?;
            inner.require_phase("predict", &[SessionPhase::Captured])?;
            let image = inner.image.clone().ok_or_else(|| RoastError::InvalidTransition {
                operation: "predict",
                state: "no image captured".to_string(),
            })?;
            inner.phase = SessionPhase::Predicting;
            Ok((image, model))
        })?;
        self.emit(SessionPhase::Predicting, token, "prediction requested");

        let preprocessor = self.preprocessor;
        let result = tokio::task::spawn_blocking(move || {
            let tensor = preprocessor.prepare(&image)?;
            InferenceEngine::classify(model.as_ref(), tensor)
        })
        .await
        .map_err(|e| RoastError::Inference(format!("inference task failed: {}", e)))
        .and_then(|r| r);

        match result {
            Ok(prediction) => {
                let applied = prediction.clone();
                if self.finish(token, |inner| {
                    inner.phase = SessionPhase::Resulted;
                    inner.prediction = Some(applied);
                    inner.error = None;
                }) {
                    self.emit(
                        SessionPhase::Resulted,
                        token,
                        format!("predicted {} ({:.3})", prediction.label.name, prediction.confidence()),
                    );
                    Ok(Some(prediction))
                } else {
                    tracing::debug!("Discarding stale prediction [{}]", token);
                    Ok(None)
                }
            }
            Err(e) => {
                let info = e.error_info();
                if self.finish(token, |inner| {
                    inner.phase = SessionPhase::Errored;
                    inner.prediction = None;
                    inner.error = Some(info);
                }) {
                    self.emit(SessionPhase::Errored, token, format!("prediction failed: {}", e));
                }
                Err(e)
            }
        }
    }

    /// 任意状态 -> Idle，丢弃图像、结果与错误；进行中的操作完成后结果作废
    pub fn reset(&self) {
        let token = {
            let mut inner = self.inner.lock();
            inner.token += 1;
            inner.phase = SessionPhase::Idle;
            inner.camera_active = false;
            inner.image = None;
            inner.prediction = None;
            inner.error = None;
            inner.token
        };

        self.release_capture();
        self.emit(SessionPhase::Idle, token, "session reset");
    }

    /// 关闭摄像头预览
    pub fn close_camera(&self) -> Result<()> {
        let token = {
            let mut inner = self.inner.lock();
            if inner.busy {
                return Err(RoastError::Busy);
            }
            if inner.phase == SessionPhase::Capturing {
                inner.phase = SessionPhase::Idle;
            }
            inner.camera_active = false;
            inner.token
        };

        self.release_capture();
        self.emit(self.phase(), token, "camera closed");
        Ok(())
    }

    /// 会话结束：同步释放设备
    pub fn shutdown(&self) {
        tracing::info!("Session shutting down");
        self.reset();
    }

    fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    fn release_capture(&self) {
        match self.capture.try_lock() {
            Ok(mut source) => source.release(),
            // 进行中的操作在完成时检测到过期 token 并自行释放
            Err(_) => tracing::debug!("Capture in flight, device will be released on completion"),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.capture.get_mut().release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FacingMode, FeedCamera, FrameFeed, LiveStreamCapture};
    use crate::image::ResizePolicy;
    use crate::models::{RoastLevel, RoastModel};
    use image::RgbImage;
    use ndarray::Array4;

    struct FixedModel;

    impl RoastModel for FixedModel {
        fn forward(&self, _input: Array4<f32>) -> Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.6, 0.1])
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FixedProvider;

    impl ModelProvider for FixedProvider {
        fn load(&self) -> Result<Arc<dyn RoastModel>> {
            Ok(Arc::new(FixedModel))
        }

        fn describe(&self) -> String {
            "fixed".to_string()
        }
    }

    fn session() -> (Session, Arc<FrameFeed>) {
        let feed = FrameFeed::new();
        let camera = Arc::new(FeedCamera::new(Arc::clone(&feed)));
        let session = Session::new(
            ModelLoader::new(Arc::new(FixedProvider)),
            Box::new(LiveStreamCapture::new(camera, FacingMode::Environment)),
            ImagePreprocessor::new(256, ResizePolicy::Bilinear),
        );
        (session, feed)
    }

    #[tokio::test]
    async fn test_full_flow_emits_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (session, feed) = session();
        let session = session.with_events(tx);

        session.load_model().await.unwrap();
        session.start_capture(CaptureRequest::Camera).await.unwrap();
        assert_eq!(session.snapshot().capture_status, CaptureStatus::CameraActive);

        feed.push_frame(RawImage::from_rgb(RgbImage::new(320, 240)));
        session.capture_image().await.unwrap();
        assert_eq!(feed.active_streams(), 0);

        let prediction = session.predict().await.unwrap().unwrap();
        assert_eq!(prediction.label.name, RoastLevel::Light);

        let state = session.snapshot();
        assert_eq!(state.phase, SessionPhase::Resulted);
        assert_eq!(state.image, Some(ImageSummary { width: 320, height: 240 }));
        assert!(!state.busy);

        let mut phases = Vec::new();
        while let Ok(event) = rx.try_recv() {
            phases.push(event.phase);
        }
        assert!(phases.contains(&SessionPhase::Capturing));
        assert!(phases.contains(&SessionPhase::Captured));
        assert!(phases.contains(&SessionPhase::Predicting));
        assert_eq!(phases.last(), Some(&SessionPhase::Resulted));
    }

    #[tokio::test]
    async fn test_predict_requires_captured_image() {
        let (session, _feed) = session();
        session.load_model().await.unwrap();

        let err = session.predict().await.unwrap_err();
        assert!(matches!(err, RoastError::InvalidTransition { .. }));
        assert_eq!(session.snapshot().phase, SessionPhase::Idle);
        assert!(!session.snapshot().busy);
    }

    #[tokio::test]
    async fn test_capture_without_start_is_rejected() {
        let (session, _feed) = session();
        let err = session.capture_image().await.unwrap_err();
        assert!(matches!(err, RoastError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_close_camera_releases_device() {
        let (session, feed) = session();
        session.start_capture(CaptureRequest::Camera).await.unwrap();
        assert_eq!(feed.active_streams(), 1);

        session.close_camera().unwrap();
        assert_eq!(feed.active_streams(), 0);
        let state = session.snapshot();
        assert_eq!(state.phase, SessionPhase::Idle);
        assert_eq!(state.capture_status, CaptureStatus::Idle);
    }

    #[tokio::test]
    async fn test_drop_releases_device() {
        let (session, feed) = session();
        session.start_capture(CaptureRequest::Camera).await.unwrap();
        assert_eq!(feed.active_streams(), 1);
        drop(session);
        assert_eq!(feed.active_streams(), 0);
    }
}
