//! # Prometheus Metrics
//!
//! HTTP metrics (request counts, latency, errors by status class) are
//! recorded in middleware. Domain gauges (documents by status, signers by
//! status, audit events) are refreshed on each `/metrics` scrape from the
//! in-memory stores.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    documents_total: GaugeVec,
    signers_total: GaugeVec,
    audit_events_total: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("client_errors", &self.client_errors())
            .field("server_errors", &self.server_errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create the metric families and register them in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("signsecure_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "signsecure_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new(
                "signsecure_http_errors_total",
                "HTTP responses with a 4xx or 5xx status",
            ),
            &["class"],
        )?;
        let documents_total = GaugeVec::new(
            Opts::new("signsecure_documents_total", "Live documents by status"),
            &["status"],
        )?;
        let signers_total = GaugeVec::new(
            Opts::new("signsecure_signers_total", "Live signers by status"),
            &["status"],
        )?;
        let audit_events_total =
            Gauge::new("signsecure_audit_events_total", "Recorded audit events")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(documents_total.clone()))?;
        registry.register(Box::new(signers_total.clone()))?;
        registry.register(Box::new(audit_events_total.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                documents_total,
                signers_total,
                audit_events_total,
            }),
        })
    }

    /// Requests served, summed across labels.
    pub fn requests(&self) -> u64 {
        sum_counters(&self.inner.http_requests_total)
    }

    /// Responses with a 4xx status.
    pub fn client_errors(&self) -> u64 {
        self.error_count("4xx")
    }

    /// Responses with a 5xx status.
    pub fn server_errors(&self) -> u64 {
        self.error_count("5xx")
    }

    fn error_count(&self, class: &str) -> u64 {
        self.inner
            .http_errors_total
            .get_metric_with_label_values(&[class])
            .map(|c| c.get())
            .unwrap_or(0)
    }

    fn record_request(&self, method: &str, path: &str, status: StatusCode, duration_secs: f64) {
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        let class = if status.is_client_error() {
            Some("4xx")
        } else if status.is_server_error() {
            Some("5xx")
        } else {
            None
        };
        if let Some(class) = class {
            self.inner.http_errors_total.with_label_values(&[class]).inc();
        }
    }

    /// Gauge of live documents, labelled by status.
    pub fn documents_total(&self) -> &GaugeVec {
        &self.inner.documents_total
    }

    /// Gauge of live signers, labelled by status.
    pub fn signers_total(&self) -> &GaugeVec {
        &self.inner.signers_total
    }

    /// Gauge of recorded audit events.
    pub fn audit_events_total(&self) -> &Gauge {
        &self.inner.audit_events_total
    }

    /// Gather all metrics and encode them in the Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

fn sum_counters(vec: &IntCounterVec) -> u64 {
    vec.collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Collapse high-cardinality path segments into placeholders.
///
/// UUIDs become `{id}`. The token segment of `/v1/signing/{document}/{token}`
/// becomes `{token}`, so signer credentials never reach a label.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = path
        .split('/')
        .map(|segment| {
            if uuid::Uuid::try_parse(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect();
    if segments.len() > 4 && segments[1] == "v1" && segments[2] == "signing" {
        segments[4] = "{token}";
    }
    segments.join("/")
}

/// Middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record_request(&method, &path, response.status(), start.elapsed().as_secs_f64());
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(metrics: ApiMetrics) -> Router {
        Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/boom", get(|| async { StatusCode::BAD_GATEWAY }))
            .layer(from_fn(metrics_middleware))
            .layer(axum::Extension(metrics))
    }

    async fn hit(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn starts_at_zero() {
        let m = ApiMetrics::new().unwrap();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.client_errors(), 0);
        assert_eq!(m.server_errors(), 0);
    }

    #[tokio::test]
    async fn counts_by_status_class() {
        let metrics = ApiMetrics::new().unwrap();
        assert_eq!(hit(app(metrics.clone()), "/ok").await, StatusCode::OK);
        assert_eq!(hit(app(metrics.clone()), "/missing").await, StatusCode::NOT_FOUND);
        assert_eq!(hit(app(metrics.clone()), "/boom").await, StatusCode::BAD_GATEWAY);
        assert_eq!(metrics.requests(), 3);
        assert_eq!(metrics.client_errors(), 1);
        assert_eq!(metrics.server_errors(), 1);
    }

    #[tokio::test]
    async fn exposition_is_prometheus_text() {
        let metrics = ApiMetrics::new().unwrap();
        hit(app(metrics.clone()), "/boom").await;
        metrics.documents_total().with_label_values(&["draft"]).set(2.0);

        let text = metrics.gather_and_encode().unwrap();
        assert!(text.contains("# TYPE signsecure_http_requests_total counter"));
        assert!(text.contains(r#"signsecure_http_errors_total{class="5xx"} 1"#));
        assert!(text.contains(r#"signsecure_documents_total{status="draft"} 2"#));
    }

    #[test]
    fn path_normalization_hides_ids_and_tokens() {
        let doc = "0b7e3c1a-5f2d-4e8a-9c64-2d1f0a9b8e71";
        assert_eq!(
            normalize_path(&format!("/v1/documents/{doc}/send_for_signature")),
            "/v1/documents/{id}/send_for_signature"
        );
        assert_eq!(
            normalize_path(&format!("/v1/signing/{doc}/eyJhbGciOi.eyJzaWduZXIi.c2ln/sign")),
            "/v1/signing/{id}/{token}/sign"
        );
        assert_eq!(normalize_path("/v1/signing"), "/v1/signing");
        assert_eq!(normalize_path("/health/liveness"), "/health/liveness");
    }
}
