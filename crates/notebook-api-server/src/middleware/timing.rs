use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::debug;

pub const PROCESS_TIME_HEADER: &str = "x-process-time-ms";

/// Stamp every response with its handling time in milliseconds
pub async fn process_time_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{:.2}", elapsed_ms)) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    debug!(%method, path = %path, status = response.status().as_u16(), elapsed_ms, "Request handled");

    response
}
