//! Metrics module
//!
//! Prometheus counters for upload activity. The CLI can dump them in text
//! exposition format after a run.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "chunked_uploads_total",
        "Total number of upload attempts by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "chunked_upload_duration_seconds",
        "Duration of successful uploads in seconds",
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    // Chunk metrics
    pub static ref CHUNKS_TOTAL: CounterVec = register_counter_vec!(
        "chunked_upload_chunks_total",
        "Chunks handled by disposition",
        &["disposition"]  // "sent" or "skipped"
    ).unwrap();

    pub static ref CHUNK_BYTES_TOTAL: Counter = register_counter!(
        "chunked_upload_bytes_total",
        "Chunk bytes acknowledged by the server"
    ).unwrap();

    pub static ref BATCH_SIZE: Histogram = register_histogram!(
        "chunked_upload_batch_size",
        "Number of chunk transfers per batch",
        vec![1.0, 2.0, 4.0, 8.0, 16.0, 32.0]
    ).unwrap();
}

/// Record a successful upload
pub fn record_upload_success(duration_secs: f64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record a failed upload under its error category
pub fn record_upload_failure(category: &str) {
    UPLOADS_TOTAL.with_label_values(&[category]).inc();
}

/// Record one acknowledged chunk
pub fn record_chunk_sent(bytes: u64) {
    CHUNKS_TOTAL.with_label_values(&["sent"]).inc();
    CHUNK_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record chunks the server already had
pub fn record_chunks_skipped(count: u32) {
    if count > 0 {
        CHUNKS_TOTAL
            .with_label_values(&["skipped"])
            .inc_by(f64::from(count));
    }
}

/// Record the start of a batch
pub fn record_batch(size: usize) {
    BATCH_SIZE.observe(size as f64);
}

/// Encode every registered metric in Prometheus text format
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
