//! Prometheus metrics for the topic transport.
//!
//! All metrics follow the naming convention: `tp_<component>_<metric>_<unit>`
//!
//! Counters are process-wide. Components also keep their own atomic stats,
//! which tests assert on, so several transport contexts in one process do
//! not interfere.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISCOVERY METRICS
    // =========================================================================

    /// Discovery messages sent, by kind
    pub static ref DISCOVERY_MESSAGES_SENT: CounterVec = CounterVec::new(
        Opts::new("tp_discovery_messages_sent_total", "Discovery messages sent"),
        &["kind"]  // kind: advertise/unadvertise/subscribe/heartbeat/bye
    ).expect("metric creation failed");

    /// Discovery messages received, by kind
    pub static ref DISCOVERY_MESSAGES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("tp_discovery_messages_received_total", "Discovery messages received"),
        &["kind"]
    ).expect("metric creation failed");

    /// Discovery broadcasts that could not be sent
    pub static ref DISCOVERY_SEND_FAILURES: Counter = Counter::new(
        "tp_discovery_send_failures_total",
        "Discovery messages that failed to send"
    ).expect("metric creation failed");

    /// Remote records expired for silence
    pub static ref DISCOVERY_EXPIRATIONS: Counter = Counter::new(
        "tp_discovery_expirations_total",
        "Remote publishers expired after missing heartbeats"
    ).expect("metric creation failed");

    /// Remote publishers currently known
    pub static ref DISCOVERY_KNOWN_PUBLISHERS: Gauge = Gauge::new(
        "tp_discovery_known_publishers",
        "Remote message and service publishers in the discovery store"
    ).expect("metric creation failed");

    // =========================================================================
    // MESSAGE BUS METRICS
    // =========================================================================

    /// Payloads accepted by publisher handles
    pub static ref MESSAGES_PUBLISHED: Counter = Counter::new(
        "tp_bus_messages_published_total",
        "Payloads accepted for publication"
    ).expect("metric creation failed");

    /// Callback invocations, by path
    pub static ref MESSAGES_DELIVERED: CounterVec = CounterVec::new(
        Opts::new("tp_bus_messages_delivered_total", "Payloads handed to subscriber callbacks"),
        &["path"]  // path: local/remote
    ).expect("metric creation failed");

    /// Payloads discarded by a throttle
    pub static ref THROTTLE_DROPS: CounterVec = CounterVec::new(
        Opts::new("tp_bus_throttle_drops_total", "Payloads dropped by throttling"),
        &["side"]  // side: publisher/subscriber
    ).expect("metric creation failed");

    /// Payloads that failed to decode
    pub static ref DECODE_FAILURES: Counter = Counter::new(
        "tp_bus_decode_failures_total",
        "Inbound payloads that failed to decode"
    ).expect("metric creation failed");

    /// Stale or duplicate frames dropped by sequence tracking
    pub static ref STALE_FRAMES: Counter = Counter::new(
        "tp_bus_stale_frames_total",
        "Out-of-order frames dropped"
    ).expect("metric creation failed");

    /// Point-to-point sends that failed
    pub static ref SEND_FAILURES: Counter = Counter::new(
        "tp_bus_send_failures_total",
        "Data frames that failed to send"
    ).expect("metric creation failed");

    // =========================================================================
    // SERVICE BUS METRICS
    // =========================================================================

    /// Service requests, by outcome
    pub static ref SERVICE_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("tp_service_requests_total", "Service requests by outcome"),
        &["outcome"]  // outcome: replied/timed_out/no_responder
    ).expect("metric creation failed");

    /// Request round trip duration
    pub static ref SERVICE_REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "tp_service_request_duration_seconds",
            "Time from request to outcome"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // NODE METRICS
    // =========================================================================

    /// Live nodes in this process
    pub static ref ACTIVE_NODES: Gauge = Gauge::new(
        "tp_node_active_nodes",
        "Nodes currently alive"
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Registering twice returns an error from the registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Discovery
        Box::new(DISCOVERY_MESSAGES_SENT.clone()),
        Box::new(DISCOVERY_MESSAGES_RECEIVED.clone()),
        Box::new(DISCOVERY_SEND_FAILURES.clone()),
        Box::new(DISCOVERY_EXPIRATIONS.clone()),
        Box::new(DISCOVERY_KNOWN_PUBLISHERS.clone()),
        // Message bus
        Box::new(MESSAGES_PUBLISHED.clone()),
        Box::new(MESSAGES_DELIVERED.clone()),
        Box::new(THROTTLE_DROPS.clone()),
        Box::new(DECODE_FAILURES.clone()),
        Box::new(STALE_FRAMES.clone()),
        Box::new(SEND_FAILURES.clone()),
        // Service bus
        Box::new(SERVICE_REQUESTS.clone()),
        Box::new(SERVICE_REQUEST_DURATION.clone()),
        // Node
        Box::new(ACTIVE_NODES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
