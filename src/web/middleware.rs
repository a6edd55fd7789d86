use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// 实时帧推送路径，高频请求只记debug日志
const FRAME_PATH: &str = "/session/frame";

/// 请求日志中间件：补全请求ID并回写到响应头
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let request_id = match req.headers().get(&REQUEST_ID_HEADER) {
        Some(value) => value.clone(),
        None => {
            let generated = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            req.headers_mut().insert(REQUEST_ID_HEADER.clone(), generated.clone());
            generated
        }
    };

    let method = req.method().clone();
    let uri = req.uri().clone();
    let quiet = uri.path() == FRAME_PATH;
    let start_time = Instant::now();

    let mut response = next.run(req).await;
    let elapsed = start_time.elapsed().as_millis();
    let id = request_id.to_str().unwrap_or("invalid");

    if quiet {
        tracing::debug!("{} {} - {} - {}ms [{}]", method, uri, response.status(), elapsed, id);
    } else {
        tracing::info!(
            "Request completed: {} {} - {} - {}ms [{}]",
            method,
            uri,
            response.status(),
            elapsed,
            id
        );
    }

    response.headers_mut().insert(REQUEST_ID_HEADER.clone(), request_id);
    response
}
