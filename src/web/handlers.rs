use crate::{
    capture::{CaptureRequest, DeviceAvailability, SelectedFile},
    image::ImageLoader,
    session::{SessionPhase, SessionState},
    utils::error::RoastError,
    web::{extractors::{RequestId, ValidatedJson}, AppState},
    Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// JSON上传请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct UploadJsonRequest {
    /// Base64编码的图像数据或数据URL
    pub image: String,

    /// 原始文件名
    #[serde(default)]
    pub file_name: Option<String>,
}

/// 前端上报的摄像头状态
#[derive(Debug, Deserialize)]
pub struct CameraErrorRequest {
    pub kind: DeviceAvailability,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: String,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FrameAck {
    pub width: u32,
    pub height: u32,
}

type SessionResponse = Result<Json<ApiResponse<SessionState>>>;

fn session_response(state: &AppState, request_id: String) -> SessionResponse {
    Ok(Json(ApiResponse::success(state.session.snapshot(), request_id)))
}

/// 当前会话状态
pub async fn session_handler(State(state): State<AppState>, RequestId(request_id): RequestId) -> SessionResponse {
    session_response(&state, request_id)
}

/// 加载模型；页面刷新时用于重试失败的加载
pub async fn load_model_handler(State(state): State<AppState>, RequestId(request_id): RequestId) -> SessionResponse {
    tracing::info!(
        "Model load requested: request_id={}, status={:?}",
        request_id,
        state.session.model_status()
    );
    state.session.ensure_model().await?;
    session_response(&state, request_id)
}

/// 打开摄像头
pub async fn start_capture_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
) -> SessionResponse {
    tracing::info!("Start capture: request_id={}", request_id);
    state.session.start_capture(CaptureRequest::Camera).await?;
    session_response(&state, request_id)
}

/// 前端推送实时帧
pub async fn frame_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    body: Bytes,
) -> Result<Json<ApiResponse<FrameAck>>> {
    let max_size = state.config.server_config.max_request_size;
    let frame = tokio::task::spawn_blocking(move || ImageLoader::from_bytes(&body, max_size))
        .await
        .map_err(|e| RoastError::Internal(format!("frame decode task failed: {}", e)))??;

    let ack = FrameAck {
        width: frame.width(),
        height: frame.height(),
    };
    state.feed.push_frame(frame);

    Ok(Json(ApiResponse::success(ack, request_id)))
}

/// 前端上报授权被拒绝或无设备
pub async fn camera_error_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Json(request): Json<CameraErrorRequest>,
) -> SessionResponse {
    tracing::info!("Camera reported {:?}: request_id={}", request.kind, request_id);
    state.feed.report(request.kind);
    session_response(&state, request_id)
}

/// 拍照
pub async fn capture_handler(State(state): State<AppState>, RequestId(request_id): RequestId) -> SessionResponse {
    tracing::info!("Capture image: request_id={}", request_id);
    state.session.capture_image().await?;
    session_response(&state, request_id)
}

/// Multipart文件上传处理器
pub async fn upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> SessionResponse {
    tracing::info!("Processing multipart upload: request_id={}", request_id);

    let mut selected: Option<SelectedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RoastError::InvalidInput(format!("Failed to read multipart field: {}", e)))?
    {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| RoastError::InvalidInput(format!("Failed to read file data: {}", e)))?;

                tracing::debug!("Received file: {:?}, {} bytes", file_name, data.len());
                selected = Some(SelectedFile::new(data.to_vec(), file_name, content_type)?);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let file = selected.ok_or_else(|| RoastError::InvalidInput("No image file provided".to_string()))?;
    select_and_capture(&state, file).await?;
    session_response(&state, request_id)
}

/// JSON base64上传处理器
pub async fn upload_base64_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<UploadJsonRequest>,
) -> SessionResponse {
    tracing::info!("Processing base64 upload: request_id={}", request_id);

    let (bytes, content_type) = ImageLoader::decode_base64(&request.image)?;
    let file = SelectedFile::new(bytes, request.file_name, content_type)?;
    select_and_capture(&state, file).await?;
    session_response(&state, request_id)
}

/// 重新上传会丢弃当前图像与结果
async fn select_and_capture(state: &AppState, file: SelectedFile) -> Result<()> {
    if matches!(
        state.session.snapshot().phase,
        SessionPhase::Captured | SessionPhase::Resulted
    ) {
        state.session.reset();
    }

    state.session.start_capture(CaptureRequest::File(file)).await?;
    state.session.capture_image().await
}

/// 预测烘焙度
pub async fn predict_handler(State(state): State<AppState>, RequestId(request_id): RequestId) -> SessionResponse {
    let start_time = Instant::now();
    tracing::info!("Processing prediction: request_id={}", request_id);

    match state.session.predict().await? {
        Some(prediction) => tracing::info!(
            "Prediction completed: request_id={}, label={}, time={:.3}s",
            request_id,
            prediction.label.name,
            start_time.elapsed().as_secs_f32()
        ),
        None => tracing::info!("Prediction discarded after reset: request_id={}", request_id),
    }

    session_response(&state, request_id)
}

/// 重拍 / 重置
pub async fn reset_handler(State(state): State<AppState>, RequestId(request_id): RequestId) -> SessionResponse {
    state.session.reset();
    session_response(&state, request_id)
}

/// 关闭摄像头
pub async fn close_camera_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
) -> SessionResponse {
    state.session.close_camera()?;
    session_response(&state, request_id)
}
