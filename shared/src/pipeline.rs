//! Per-request instrumentation wrapped around every route.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use lambda_http::http::HeaderValue;
use lambda_http::{Body, Request, Response};
use tracing::info;
use uuid::Uuid;

use crate::metrics::{MetricsRecorder, RequestMetricRecord};

/// Response header carrying the id logged for the request.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Times each request, logs one line for it and records a request metric.
///
/// All timing state lives on the stack of [`RequestPipeline::run`], so
/// concurrent requests never contend here; only the recorder is shared.
#[derive(Clone)]
pub struct RequestPipeline {
    metrics: Arc<dyn MetricsRecorder>,
}

impl RequestPipeline {
    pub fn new(metrics: Arc<dyn MetricsRecorder>) -> Self {
        Self { metrics }
    }

    /// Run `handler` for `request` and record its outcome.
    ///
    /// Handlers report failure as an error response, so the status recorded
    /// here is whatever the caller receives.
    pub async fn run<F, Fut>(&self, request: Request, handler: F) -> Response<Body>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response<Body>>,
    {
        let request_id = Uuid::new_v4().to_string();
        let method = request.method().to_string();
        let path = request.uri().path().to_string();
        let started = Instant::now();

        let mut response = handler(request).await;

        let latency_seconds = started.elapsed().as_secs_f64();
        let status = response.status().as_u16();

        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status,
            latency_seconds,
            "request completed"
        );

        self.metrics
            .record_request(RequestMetricRecord {
                method,
                status_code: status,
                latency_seconds,
                timestamp: Utc::now(),
            })
            .await;

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}
