use crate::capture::CaptureMode;
use crate::models::{ModelStatus, PredictionResult};
use crate::utils::error::ErrorInfo;
use serde::Serialize;
use std::fmt;

/// 会话流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Capturing,
    Captured,
    Predicting,
    Resulted,
    Errored,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 采集状态（由阶段与设备状态推导）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    Idle,
    CameraActive,
    ImageCaptured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub width: u32,
    pub height: u32,
}

/// 会话状态快照，驱动界面渲染
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub model_status: ModelStatus,
    pub capture_status: CaptureStatus,
    pub capture_mode: CaptureMode,
    pub phase: SessionPhase,
    pub busy: bool,
    pub image: Option<ImageSummary>,
    pub prediction: Option<PredictionResult>,
    pub error: Option<ErrorInfo>,
}

/// 状态转换事件
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub phase: SessionPhase,
    pub token: u64,
    pub message: String,
}

impl SessionEvent {
    pub fn new(phase: SessionPhase, token: u64, message: impl Into<String>) -> Self {
        Self {
            phase,
            token,
            message: message.into(),
        }
    }
}
