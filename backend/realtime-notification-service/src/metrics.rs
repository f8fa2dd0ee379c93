//! Prometheus metrics for socket connections, dispatch and the HTTP API
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::rc::Rc;
use std::time::Instant;

use crate::error::{AppError, AppResult};

static API_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "realtime_notification_api_requests_total",
        "HTTP requests served, by route template and status",
        &["method", "route", "status"]
    )
    .expect("Failed to register API request counter")
});

static API_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "realtime_notification_api_latency_seconds",
        "HTTP handler latency, by route template",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register API latency histogram")
});

static DISPATCH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "realtime_notification_dispatch_total",
        "Notification dispatch attempts by event and outcome",
        &["event", "outcome"]
    )
    .expect("Failed to register dispatch counter")
});

static CONNECTED_USERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "realtime_notification_connected_users",
        "Users with a registered socket connection"
    )
    .expect("Failed to register connected users gauge")
});

pub fn record_dispatch(event: &str, delivered: bool) {
    let outcome = if delivered { "delivered" } else { "dropped" };
    DISPATCH_TOTAL.with_label_values(&[event, outcome]).inc();
}

pub fn set_connected_users(count: usize) {
    CONNECTED_USERS.set(count as i64);
}

/// Endpoint: GET /metrics
pub async fn serve_metrics() -> AppResult<HttpResponse> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| {
            tracing::error!(error = %e, "failed to encode metrics");
            AppError::Internal
        })?;

    Ok(HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer))
}

/// One in-flight API request
struct ApiTimer {
    method: String,
    route: String,
    started: Instant,
}

impl ApiTimer {
    fn start(req: &ServiceRequest) -> Self {
        Self {
            method: req.method().to_string(),
            // `/api/v1/notifications/{user_id}`, never the concrete user
            route: req.match_pattern().unwrap_or_else(|| "unmatched".to_string()),
            started: Instant::now(),
        }
    }

    fn finish(self, status: u16) {
        let status = status.to_string();
        API_REQUESTS
            .with_label_values(&[&self.method, &self.route, &status])
            .inc();
        API_LATENCY
            .with_label_values(&[&self.method, &self.route])
            .observe(self.started.elapsed().as_secs_f64());
    }
}

/// Middleware feeding the API request counter and latency histogram
pub struct RequestMetrics;

impl<S, B> Transform<S, ServiceRequest> for RequestMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestMetricsService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestMetricsService {
            inner: Rc::new(service),
        }))
    }
}

pub struct RequestMetricsService<S> {
    inner: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestMetricsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(inner);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let timer = ApiTimer::start(&req);
        let inner = Rc::clone(&self.inner);

        Box::pin(async move {
            let result = inner.call(req).await;
            let status = match &result {
                Ok(res) => res.status(),
                Err(e) => e.as_response_error().status_code(),
            };
            timer.finish(status.as_u16());
            result
        })
    }
}
