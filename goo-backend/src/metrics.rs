//! HTTP request metrics and the `/metrics` endpoint.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Extension, MatchedPath};
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::time::Instant;

use crate::auth::{require_basic_auth, METRICS_USER};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct HttpMetrics {
    pub requests: IntCounterVec,
    pub duration: HistogramVec,
}

impl HttpMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            Opts::new("app_http_requests_total", "The number of HTTP requests processed."),
            &["method", "path", "code"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "app_http_request_duration_seconds",
                "HTTP request duration in seconds.",
            ),
            &["code"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self { requests, duration })
    }
}

/// Register CPU, memory and file descriptor series of the current process.
/// The collector only exists on Linux.
#[cfg_attr(not(target_os = "linux"), allow(unused_variables))]
pub fn register_process_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    #[cfg(target_os = "linux")]
    registry.register(Box::new(
        prometheus::process_collector::ProcessCollector::for_self(),
    ))?;
    Ok(())
}

/// Middleware recording a counter and a duration sample for every request.
pub async fn track_metrics(
    Extension(state): Extension<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };

    let response = next.run(req).await;

    let code = response.status().as_u16().to_string();
    state
        .http_metrics
        .requests
        .with_label_values(&[method.as_str(), path.as_str(), code.as_str()])
        .inc();
    state
        .http_metrics
        .duration
        .with_label_values(&[code.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}

pub async fn metrics_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_basic_auth(&headers, METRICS_USER, state.metrics_password())?;

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.registry.gather(), &mut buffer)
        .map_err(|e| ApiError::internal(format!("encoding metrics: {e}")))?;

    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_owned())],
        buffer,
    )
        .into_response())
}
