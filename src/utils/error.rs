use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoastError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model is not ready: {0}")]
    ModelUnavailable(String),

    #[error("Camera permission denied: {0}")]
    DevicePermissionDenied(String),

    #[error("No camera device available: {0}")]
    NoDeviceAvailable(String),

    /// 请求的摄像头朝向无法满足（可回退到默认摄像头）
    #[error("Requested camera facing unavailable: {0}")]
    FacingUnavailable(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Operation '{operation}' is not allowed in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// 面向用户的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModelLoadFailure,
    DevicePermissionDenied,
    NoDeviceAvailable,
    InvalidImage,
    InferenceFailure,
    Busy,
    InvalidRequest,
    Internal,
}

/// 会话中保存的单一用户可见错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl RoastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoastError::ModelLoad(_) | RoastError::ModelUnavailable(_) => ErrorKind::ModelLoadFailure,
            RoastError::DevicePermissionDenied(_) => ErrorKind::DevicePermissionDenied,
            RoastError::NoDeviceAvailable(_) | RoastError::FacingUnavailable(_) => {
                ErrorKind::NoDeviceAvailable
            }
            RoastError::InvalidImage(_)
            | RoastError::ImageDecode(_)
            | RoastError::Base64(_)
            | RoastError::UnsupportedFormat(_)
            | RoastError::FileTooLarge(_, _) => ErrorKind::InvalidImage,
            RoastError::Inference(_) | RoastError::Ort(_) => ErrorKind::InferenceFailure,
            RoastError::Busy => ErrorKind::Busy,
            RoastError::InvalidTransition { .. } | RoastError::InvalidInput(_) | RoastError::Json(_) => {
                ErrorKind::InvalidRequest
            }
            RoastError::Config(_) | RoastError::Io(_) | RoastError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 转换为用户可见的错误信息
    pub fn error_info(&self) -> ErrorInfo {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::ModelLoadFailure => {
                "The roast classification model could not be loaded. Refresh the page to try again.".to_string()
            }
            ErrorKind::DevicePermissionDenied => {
                "Camera access was denied. Allow camera access and try again.".to_string()
            }
            ErrorKind::NoDeviceAvailable => "No camera was found on this device.".to_string(),
            ErrorKind::InvalidImage => "The image could not be processed. Please try again.".to_string(),
            ErrorKind::InferenceFailure => "Prediction failed. Please try again.".to_string(),
            _ => self.to_string(),
        };

        ErrorInfo { kind, message }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RoastError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RoastError::InvalidImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RoastError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RoastError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            RoastError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RoastError::Base64(_) => StatusCode::BAD_REQUEST,
            RoastError::Json(_) => StatusCode::BAD_REQUEST,
            RoastError::Busy => StatusCode::CONFLICT,
            RoastError::InvalidTransition { .. } => StatusCode::CONFLICT,
            RoastError::DevicePermissionDenied(_) => StatusCode::FORBIDDEN,
            RoastError::NoDeviceAvailable(_) | RoastError::FacingUnavailable(_) => StatusCode::NOT_FOUND,
            RoastError::ModelLoad(_) | RoastError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RoastError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            RoastError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            RoastError::DevicePermissionDenied(_) => "DEVICE_PERMISSION_DENIED",
            RoastError::NoDeviceAvailable(_) => "NO_DEVICE_AVAILABLE",
            RoastError::FacingUnavailable(_) => "FACING_UNAVAILABLE",
            RoastError::InvalidImage(_) => "INVALID_IMAGE",
            RoastError::Inference(_) => "INFERENCE_ERROR",
            RoastError::Busy => "BUSY",
            RoastError::InvalidTransition { .. } => "INVALID_TRANSITION",
            RoastError::InvalidInput(_) => "INVALID_INPUT",
            RoastError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            RoastError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            RoastError::Config(_) => "CONFIG_ERROR",
            RoastError::Io(_) => "IO_ERROR",
            RoastError::Json(_) => "JSON_ERROR",
            RoastError::Base64(_) => "BASE64_DECODE_ERROR",
            RoastError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            RoastError::Ort(_) => "ORT_ERROR",
            RoastError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for RoastError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let info = self.error_info();
        let error_response = serde_json::json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "kind": info.kind,
                "message": info.message,
                "detail": self.to_string(),
            }
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
