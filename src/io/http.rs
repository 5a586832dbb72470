//! HTTP API for impression calculation
//!
//! Endpoints:
//! - `POST /api/calculate` - run a calculation on the JSON body
//! - `GET /health` - liveness and build info
//! - `GET /metrics` - Prometheus text exposition
//!
//! Uses hyper for the HTTP server. Each request parses its own copy of the
//! input; the calculation itself runs synchronously and shares nothing.

use crate::domain::types::CalculateResponse;
use crate::infra::config::Config;
use crate::infra::metrics::{
    Metrics, MetricsSummary, RequestOutcome, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS,
};
use crate::io::wire::{parse_request, ValidationIssue};
use crate::services::calculator::calculate;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const REQUEST_ID_HEADER: &str = "x-request-id";
const JSON: &str = "application/json";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";

/// Shared, read-only state handed to every request
pub struct ApiContext {
    config: Config,
    metrics: Arc<Metrics>,
    cors_origin: HeaderValue,
}

impl ApiContext {
    pub fn new(config: Config, metrics: Arc<Metrics>) -> Self {
        let cors_origin = HeaderValue::from_str(config.cors_allow_origin()).unwrap_or_else(|_| {
            warn!(origin = %config.cors_allow_origin(), "invalid_cors_origin_using_wildcard");
            HeaderValue::from_static("*")
        });
        Self { config, metrics, cors_origin }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn respond(
        &self,
        status: StatusCode,
        content_type: &'static str,
        body: Bytes,
    ) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.cors_origin.clone());
        response
    }

    fn respond_json(&self, status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
        self.respond(status, JSON, Bytes::from(value.to_string()))
    }
}

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with service label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    service: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{service=\"{service}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    service: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in METRICS_BUCKET_BOUNDS.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(
            output,
            "{name}_bucket{{service=\"{service}\",le=\"{bound}\"}} {cumulative}"
        );
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{service=\"{service}\",le=\"+Inf\"}} {cumulative}");
    let _ = writeln!(output, "{name}_sum{{service=\"{service}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{service=\"{service}\"}} {cumulative}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(summary: &MetricsSummary, service: &str) -> String {
    let mut output = String::with_capacity(4096);

    write_metric(
        &mut output,
        "impressions_requests_total",
        "Total calculation requests",
        MetricType::Counter,
        service,
        summary.requests_total,
    );
    write_metric(
        &mut output,
        "impressions_calculations_succeeded_total",
        "Calculations completed",
        MetricType::Counter,
        service,
        summary.calculations_succeeded,
    );
    write_metric(
        &mut output,
        "impressions_requests_rejected_total",
        "Requests rejected by boundary validation",
        MetricType::Counter,
        service,
        summary.requests_rejected,
    );
    write_metric(
        &mut output,
        "impressions_calculations_failed_total",
        "Calculations aborted by reference errors",
        MetricType::Counter,
        service,
        summary.calculations_failed,
    );
    write_metric(
        &mut output,
        "impressions_routes_attributed_total",
        "Routes attributed",
        MetricType::Counter,
        service,
        summary.routes_attributed,
    );
    write_metric(
        &mut output,
        "impressions_campaigns_computed_total",
        "Campaign results computed",
        MetricType::Counter,
        service,
        summary.campaigns_computed,
    );
    write_metric(
        &mut output,
        "impressions_warnings_total",
        "Data-sufficiency warnings emitted",
        MetricType::Counter,
        service,
        summary.warnings_emitted,
    );
    write_metric(
        &mut output,
        "impressions_attributed_total",
        "Impressions attributed across all calculations",
        MetricType::Counter,
        service,
        summary.impressions_attributed,
    );
    write_histogram(
        &mut output,
        "impressions_request_latency_us",
        "Calculation request latency in microseconds",
        service,
        &summary.lat_buckets,
        summary.latency_sum_us,
    );
    write_metric(
        &mut output,
        "impressions_request_latency_p99_us",
        "99th percentile request latency",
        MetricType::Gauge,
        service,
        summary.lat_p99_us,
    );

    output
}

/// Route one HTTP request
pub async fn handle_request<B>(
    req: Request<B>,
    ctx: Arc<ApiContext>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let request_id = Uuid::now_v7().to_string();

    let mut response = match (req.method(), req.uri().path()) {
        (&Method::POST, "/api/calculate") => handle_calculate(req, &ctx, &request_id).await,
        (&Method::GET, "/health") => ctx.respond_json(
            StatusCode::OK,
            &json!({
                "status": "ok",
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                "version": env!("CARGO_PKG_VERSION"),
                "git": env!("GIT_HASH"),
            }),
        ),
        (&Method::GET, "/metrics") => {
            let body =
                format_prometheus_metrics(&ctx.metrics.snapshot(), ctx.config.service_name());
            ctx.respond(StatusCode::OK, PROMETHEUS_TEXT, Bytes::from(body))
        }
        (&Method::OPTIONS, _) => {
            let mut response = ctx.respond(StatusCode::OK, "text/plain", Bytes::new());
            let headers = response.headers_mut();
            headers.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            );
            headers
                .insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
            response
        }
        _ => ctx.respond(StatusCode::NOT_FOUND, "text/plain", Bytes::from_static(b"Not Found")),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    Ok(response)
}

async fn handle_calculate<B>(
    req: Request<B>,
    ctx: &ApiContext,
    request_id: &str,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let start = Instant::now();
    let limit = ctx.config.max_body_bytes();

    let body = match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            warn!(request_id = %request_id, limit = %limit, "request_body_too_large");
            ctx.metrics.record_request(RequestOutcome::Rejected, elapsed_us(start));
            return ctx.respond_json(
                StatusCode::PAYLOAD_TOO_LARGE,
                &json!({ "error": "Request body too large", "limit": limit }),
            );
        }
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "request_body_read_failed");
            ctx.metrics.record_request(RequestOutcome::Rejected, elapsed_us(start));
            return ctx.respond_json(
                StatusCode::BAD_REQUEST,
                &json!({ "error": "Invalid request body", "details": [e.to_string()] }),
            );
        }
    };

    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(issues) => {
            warn!(request_id = %request_id, issues = %issues.len(), "calculate_request_invalid");
            ctx.metrics.record_request(RequestOutcome::Rejected, elapsed_us(start));
            return invalid_body(ctx, &issues);
        }
    };

    debug!(
        request_id = %request_id,
        markets = %request.markets.len(),
        campaigns = %request.campaigns.len(),
        routes = %request.routes.len(),
        "calculate_request_parsed"
    );

    match calculate(&request, ctx.config.return_intervals_default()) {
        Ok(calculation) => {
            let latency_us = elapsed_us(start);
            let summary = calculation.response.summary;
            ctx.metrics.record_request(RequestOutcome::Succeeded, latency_us);
            ctx.metrics.record_calculation(
                summary.route_count,
                summary.campaign_count,
                calculation.warnings.len(),
                summary.total_impressions,
            );
            for warning in &calculation.warnings {
                debug!(
                    request_id = %request_id,
                    route_id = %warning.route_id(),
                    warning = %warning,
                    "calculation_warning"
                );
            }
            info!(
                request_id = %request_id,
                campaigns = %summary.campaign_count,
                routes = %summary.route_count,
                impressions = %summary.total_impressions,
                seconds_inside = %format!("{:.1}", summary.total_seconds_inside),
                warnings = %calculation.warnings.len(),
                latency_us = %latency_us,
                "calculation_completed"
            );
            calculation_ok(ctx, &calculation.response)
        }
        Err(e) => {
            ctx.metrics.record_request(RequestOutcome::Failed, elapsed_us(start));
            error!(request_id = %request_id, kind = %e.kind(), error = %e, "calculation_failed");
            ctx.respond_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "Internal server error", "message": e.to_string() }),
            )
        }
    }
}

fn invalid_body(ctx: &ApiContext, issues: &[ValidationIssue]) -> Response<Full<Bytes>> {
    ctx.respond_json(
        StatusCode::BAD_REQUEST,
        &json!({ "error": "Invalid request body", "details": issues }),
    )
}

fn calculation_ok(ctx: &ApiContext, response: &CalculateResponse) -> Response<Full<Bytes>> {
    match serde_json::to_vec(response) {
        Ok(body) => ctx.respond(StatusCode::OK, JSON, Bytes::from(body)),
        Err(e) => {
            error!(error = %e, "response_serialization_failed");
            ctx.respond_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "Internal server error", "message": e.to_string() }),
            )
        }
    }
}

#[inline]
fn elapsed_us(start: Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

/// Bind the configured address and serve until shutdown
pub async fn start_server(
    ctx: Arc<ApiContext>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), BoxError> {
    let addr: SocketAddr =
        format!("{}:{}", ctx.config.bind_address(), ctx.config.port()).parse()?;
    let listener = TcpListener::bind(addr).await?;
    serve(listener, ctx, shutdown).await
}

/// Accept connections on `listener` until the shutdown flag flips
pub async fn serve(
    listener: TcpListener,
    ctx: Arc<ApiContext>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), BoxError> {
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, service = %ctx.config.service_name(), "http_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let ctx = ctx.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let ctx = ctx.clone();
                                async move { handle_request(req, ctx).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "markets": [{"marketId": "LA", "impressionsPerMinute": 1200}],
        "campaigns": [{
            "campaignId": "camp_001",
            "marketId": "LA",
            "geofence": {"minLon": -118.5, "maxLon": -118.2, "minLat": 34.0, "maxLat": 34.2}
        }],
        "routes": [{
            "routeId": "route_001",
            "campaignId": "camp_001",
            "pings": [
                {"timestamp": "2025-01-15T10:00:00Z", "lon": -118.4, "lat": 34.1},
                {"timestamp": "2025-01-15T10:02:00Z", "lon": -118.3, "lat": 34.15}
            ]
        }],
        "options": {"returnIntervals": true}
    }"#;

    fn context(config: Config) -> Arc<ApiContext> {
        Arc::new(ApiContext::new(config, Arc::new(Metrics::new())))
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn call(
        ctx: &Arc<ApiContext>,
        req: Request<Full<Bytes>>,
    ) -> (StatusCode, serde_json::Value) {
        let response = handle_request(req, ctx.clone()).await.unwrap();
        let status = response.status();
        assert!(response.headers().contains_key("x-request-id"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_calculate_success() {
        let ctx = context(Config::default());
        let (status, body) = call(&ctx, request(Method::POST, "/api/calculate", VALID)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["totalImpressions"], 2400);
        assert_eq!(body["summary"]["routeCount"], 1);
        let route = &body["campaigns"][0]["routes"][0];
        assert_eq!(route["impressions"], 2400);
        assert_eq!(route["intervals"][0]["start"], "2025-01-15T10:00:00Z");
        assert_eq!(ctx.metrics().snapshot().calculations_succeeded, 1);
    }

    #[tokio::test]
    async fn test_calculate_invalid_body() {
        let ctx = context(Config::default());
        let (status, body) = call(&ctx, request(Method::POST, "/api/calculate", "{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request body");
        assert!(body["details"].as_array().is_some_and(|d| !d.is_empty()));
        assert_eq!(ctx.metrics().snapshot().requests_rejected, 1);
    }

    #[tokio::test]
    async fn test_calculate_reference_error() {
        let ctx = context(Config::default());
        let body = VALID.replace("\"marketId\": \"LA\",\n", "\"marketId\": \"NYC\",\n");
        let (status, body) = call(&ctx, request(Method::POST, "/api/calculate", &body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Campaign camp_001 references non-existent market NYC");
        assert_eq!(ctx.metrics().snapshot().calculations_failed, 1);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let ctx = context(Config::default().with_max_body_bytes(16));
        let (status, _) = call(&ctx, request(Method::POST, "/api/calculate", VALID)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_health_and_not_found() {
        let ctx = context(Config::default());
        let (status, body) = call(&ctx, request(Method::GET, "/health", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = call(&ctx, request(Method::GET, "/nope", "")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let ctx = context(Config::default());
        let response =
            handle_request(request(Method::OPTIONS, "/api/calculate", ""), ctx).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().contains_key(ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[test]
    fn test_format_prometheus_metrics() {
        let metrics = Metrics::new();
        metrics.record_request(RequestOutcome::Succeeded, 150);
        metrics.record_request(RequestOutcome::Rejected, 40);
        metrics.record_calculation(2, 1, 0, 4800);

        let output = format_prometheus_metrics(&metrics.snapshot(), "impressions");

        assert!(output.contains("impressions_requests_total{service=\"impressions\"} 2"));
        assert!(output.contains("impressions_attributed_total{service=\"impressions\"} 4800"));
        assert!(output.contains(
            "impressions_request_latency_us_bucket{service=\"impressions\",le=\"+Inf\"} 2"
        ));
        assert!(output.contains("impressions_request_latency_us_sum{service=\"impressions\"} 190"));
    }

    #[tokio::test]
    async fn test_metrics_scrape_keeps_log_interval() {
        let ctx = context(Config::default());
        ctx.metrics().record_request(RequestOutcome::Succeeded, 5000);

        let response = handle_request(request(Method::GET, "/metrics", ""), ctx.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let periodic = ctx.metrics().report();
        assert_eq!(periodic.max_latency_us, 5000);
        assert_eq!(periodic.requests_total, 1);
    }
}
