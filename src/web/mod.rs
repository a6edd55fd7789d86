pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ui;

use crate::{
    capture::{FeedCamera, FrameFeed},
    models::{OnnxModelProvider, CLASS_LABELS},
    session::{Session, SessionEvent},
    utils::error::RoastError,
    Config, Result,
};
use axum::{
    extract::DefaultBodyLimit,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 处理器共享状态：每个进程一个会话
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub session: Arc<Session>,
    pub feed: Arc<FrameFeed>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let feed = FrameFeed::new();
        let camera = Arc::new(FeedCamera::new(Arc::clone(&feed)));
        let provider = Arc::new(OnnxModelProvider::new(config.clone()));
        let mut session = Session::from_config(&config, provider, camera);

        // 开发模式下记录每次状态转换
        if config.dev_mode {
            let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    tracing::debug!(
                        "Session event [{}]: {:?} - {}",
                        event.token,
                        event.phase,
                        event.message
                    );
                }
            });
            session = session.with_events(tx);
        }

        Self {
            config,
            session: Arc::new(session),
            feed,
        }
    }
}

pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::new(config.clone());

    // 启动时加载模型；失败时服务照常启动，由会话状态展示错误
    if let Err(e) = state.session.load_model().await {
        tracing::error!("Roast model unavailable, predictions are disabled: {}", e);
    }

    let app = create_app(state.clone());

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|e| RoastError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e)))?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Capture mode: {:?}, resize: {:?}", config.pipeline.capture_mode, config.pipeline.resize_policy);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /session                - Session state");
    tracing::info!("  POST /session/model/load     - Retry model loading");
    tracing::info!("  POST /session/capture/start  - Open camera");
    tracing::info!("  POST /session/frame          - Push live frame");
    tracing::info!("  POST /session/capture        - Take photo");
    tracing::info!("  POST /session/upload         - Multipart file upload");
    tracing::info!("  POST /session/upload/base64  - JSON base64 upload");
    tracing::info!("  POST /session/predict        - Classify roast level");
    tracing::info!("  POST /session/reset          - Retake");
    tracing::info!("  GET  /                       - Web UI");

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RoastError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    let session = Arc::clone(&state.session);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RoastError::Internal(format!("Server failed: {}", e)))?;

    // 退出时同步释放摄像头
    session.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

pub fn create_app(state: AppState) -> Router {
    let server_config = state.config.server_config.clone();

    Router::new()
        // 会话路由
        .route("/session", get(handlers::session_handler))
        .route("/session/model/load", post(handlers::load_model_handler))
        .route("/session/capture/start", post(handlers::start_capture_handler))
        .route("/session/frame", post(handlers::frame_handler))
        .route("/session/camera/error", post(handlers::camera_error_handler))
        .route("/session/camera/close", post(handlers::close_camera_handler))
        .route("/session/capture", post(handlers::capture_handler))
        .route("/session/upload", post(handlers::upload_handler))
        .route("/session/upload/base64", post(handlers::upload_base64_handler))
        .route("/session/predict", post(handlers::predict_handler))
        .route("/session/reset", post(handlers::reset_handler))
        // Web UI路由
        .route("/", get(ui::index_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(DefaultBodyLimit::max(server_config.max_request_size))
        .layer(RequestBodyLimitLayer::new(server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(server_config.request_timeout)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 健康检查端点
async fn health_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "model_status": state.session.model_status(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 服务信息端点
async fn info_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    let preprocessor = state.session.preprocessor();
    Json(json!({
        "service": "Bean Roast Classifier",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": {
            "status": state.session.model_status(),
            "source": state.session.model_source(),
        },
        "pipeline": {
            "capture_mode": state.session.capture_mode(),
            "resize_policy": preprocessor.policy(),
            "input_shape": [1, preprocessor.target_size(), preprocessor.target_size(), 3],
        },
        "labels": CLASS_LABELS,
    }))
}
