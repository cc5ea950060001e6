use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{debug, warn};

static RESPONSE_TIME_US: HeaderName = HeaderName::from_static("x-response-time-us");
static SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

/// Stamps each response with its handling time (`X-Response-Time-Us` and
/// `Server-Timing: total;dur=<ms>`) and logs API calls against their
/// route template, so `/api/network/connections` is one log key no
/// matter how it was queried.
pub async fn timing_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let route = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

    let headers = response.headers_mut();
    headers.insert(RESPONSE_TIME_US.clone(), HeaderValue::from(micros));
    if let Ok(value) = HeaderValue::from_str(&format!("total;dur={:.3}", micros as f64 / 1000.0)) {
        headers.insert(SERVER_TIMING.clone(), value);
    }

    // Dashboard assets are not worth a log line
    if !route.starts_with("/api/") {
        return response;
    }
    let status = response.status();
    if status.is_server_error() {
        warn!(status = status.as_u16(), %method, %route, elapsed_us = micros, "request failed");
    } else {
        debug!(status = status.as_u16(), %method, %route, elapsed_us = micros, "request");
    }
    response
}
