use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // Answer store metrics
    pub static ref ANSWER_EVENTS_RECORDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answer_events_recorded_total",
        "Total number of warned/wrong answer events persisted",
        &["result", "backend"]
    )
    .unwrap();

    pub static ref ANSWER_STORE_FALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answer_store_fallbacks_total",
        "Total number of remote store failures served by the local store",
        &["operation"]
    )
    .unwrap();

    pub static ref ANSWER_STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "answer_store_operations_total",
        "Total number of answer store backend operations",
        &["operation", "backend", "status"]
    )
    .unwrap();

    pub static ref ANSWER_STORE_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "answer_store_operation_duration_seconds",
        "Answer store backend operation duration in seconds",
        &["operation", "backend"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Practice metrics
    pub static ref PRACTICE_SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "practice_sessions_total",
        "Total number of practice sessions by mode and status",
        &["mode", "status"]
    )
    .unwrap();

    pub static ref PRACTICE_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "practice_sessions_active",
        "Number of practice sessions currently in progress"
    )
    .unwrap();

    pub static ref PRACTICE_POOL_SIZE: HistogramVec = register_histogram_vec!(
        "practice_pool_size",
        "Number of candidates in a built practice pool",
        &["mode"],
        vec![0.0, 1.0, 3.0, 6.0, 9.0, 12.0, 18.0, 27.0, 50.0]
    )
    .unwrap();

    pub static ref ATTEMPT_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempt_outcomes_total",
        "Total number of reported question outcomes",
        &["outcome"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track an answer store backend operation with metrics
pub async fn track_store_operation<F, T, E>(
    operation: &str,
    backend: &str,
    future: F,
) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    ANSWER_STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, backend, status])
        .inc();

    ANSWER_STORE_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, backend])
        .observe(duration);

    result
}

pub fn record_fallback(operation: &str) {
    ANSWER_STORE_FALLBACKS_TOTAL
        .with_label_values(&[operation])
        .inc();
}
