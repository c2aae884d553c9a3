use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // Pool metrics
    pub static ref CODES_LOADED: IntCounter = register_int_counter!(
        "fulfillment_codes_loaded_total",
        "Total codes inserted into redemption pools"
    ).expect("metric can be created");

    /// Claim attempts by outcome: claimed, replayed, exhausted, contended, mismatched.
    pub static ref CLAIMS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "fulfillment_claims_total",
        "Total claim attempts by outcome",
        &["outcome"]
    ).expect("metric can be created");

    // Dedup metrics
    pub static ref DUPLICATES_MARKED: IntCounter = register_int_counter!(
        "fulfillment_duplicates_marked_total",
        "Total duplicate secrets marked claimed in other pools"
    ).expect("metric can be created");

    pub static ref DEDUP_FAILURES: IntCounter = register_int_counter!(
        "fulfillment_dedup_failures_total",
        "Total duplicate marking passes that failed"
    ).expect("metric can be created");

    // RPC metrics
    pub static ref RPC_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "fulfillment_rpc_request_duration_seconds",
        "Ethereum JSON-RPC request duration in seconds",
        &["method"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).expect("metric can be created");

    pub static ref RPC_ERRORS: IntCounterVec = register_int_counter_vec!(
        "fulfillment_rpc_errors_total",
        "Total Ethereum JSON-RPC transport failures",
        &["method"]
    ).expect("metric can be created");
}

/// Renders every registered metric in the Prometheus text format.
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
