//! Prometheus metrics definitions and HTTP server

use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Total number of reconciliations
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "replica_pool_operator_reconciliations_total",
        "Total number of reconciliations",
        &["kind"]
    ).unwrap();

    /// Total number of reconciliation errors
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "replica_pool_operator_reconciliation_errors_total",
        "Total number of reconciliation errors",
        &["kind"]
    ).unwrap();

    /// Reconciliation duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "replica_pool_operator_reconcile_duration_seconds",
        "Duration of reconciliations in seconds",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Pods created by the operator
    pub static ref UNITS_CREATED: CounterVec = register_counter_vec!(
        "replica_pool_operator_pods_created_total",
        "Total number of Pods created",
        &["namespace", "name"]
    ).unwrap();

    /// Pods deleted by the operator
    pub static ref UNITS_DELETED: CounterVec = register_counter_vec!(
        "replica_pool_operator_pods_deleted_total",
        "Total number of Pods deleted",
        &["namespace", "name"]
    ).unwrap();

    /// Failed Pod operations
    pub static ref UNIT_FAILURES: CounterVec = register_counter_vec!(
        "replica_pool_operator_pod_failures_total",
        "Total number of failed Pod create/delete operations",
        &["operation", "namespace", "name"]
    ).unwrap();

    /// Declared pool size
    pub static ref DESIRED_UNITS: GaugeVec = register_gauge_vec!(
        "replica_pool_operator_desired_pods",
        "Desired number of Pods per ReplicaPool",
        &["namespace", "name"]
    ).unwrap();

    /// Pods matching the pool selector on the last pass
    pub static ref OBSERVED_UNITS: GaugeVec = register_gauge_vec!(
        "replica_pool_operator_observed_pods",
        "Observed number of Pods per ReplicaPool",
        &["namespace", "name"]
    ).unwrap();

    /// Operator health (1 = healthy, 0 = unhealthy)
    pub static ref OPERATOR_HEALTH: prometheus::Gauge = prometheus::register_gauge!(
        "replica_pool_operator_health",
        "Operator health status (1 = healthy, 0 = unhealthy)"
    ).unwrap();
}

/// Drop every per-pool series for a pool that no longer exists
pub fn forget_pool(namespace: &str, name: &str) {
    let labels = [namespace, name];
    // Absent series are not an error here
    let _ = DESIRED_UNITS.remove_label_values(&labels);
    let _ = OBSERVED_UNITS.remove_label_values(&labels);
    let _ = UNITS_CREATED.remove_label_values(&labels);
    let _ = UNITS_DELETED.remove_label_values(&labels);
    for operation in ["create", "delete"] {
        let _ = UNIT_FAILURES.remove_label_values(&[operation, namespace, name]);
    }
}

/// Start the metrics HTTP server
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    // Set initial health
    OPERATOR_HEALTH.set(1.0);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                error!("Error serving connection: {}", e);
            }
        });
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    Ok(route(req.uri().path()))
}

/// Pick the response for a request path
fn route(path: &str) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => metrics_response(),
        "/healthz" | "/health" | "/readyz" | "/ready" => text_response(StatusCode::OK, "ok"),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Generate metrics response
fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

/// Plain-text response with a fixed body
fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
