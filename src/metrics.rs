//! Prometheus metrics collection for runegated.
//!
//! Tracks server health, tick timing, packet throughput, and persistence
//! outcomes, exposed on an HTTP endpoint for scraping.

use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry for all metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    // ========================================================================
    // Counters (monotonic increasing)
    // ========================================================================

    /// Total client packets dispatched to handlers.
    pub static ref PACKETS_DISPATCHED: IntCounter = IntCounter::new(
        "world_packets_dispatched_total",
        "Client packets dispatched"
    ).unwrap();

    /// Total handler failures (all error codes).
    pub static ref HANDLER_ERRORS: IntCounter = IntCounter::new(
        "world_handler_errors_total",
        "Handler failures"
    ).unwrap();

    /// Total sessions dropped for a full inbound queue.
    pub static ref SESSION_QUEUE_FULL: IntCounter = IntCounter::new(
        "world_session_queue_full_total",
        "Sessions dropped for inbound queue overflow"
    ).unwrap();

    /// Total player save failures (retried next interval).
    pub static ref SAVE_FAILURES: IntCounter = IntCounter::new(
        "world_save_failures_total",
        "Player save failures"
    ).unwrap();

    /// Total WAL batches written.
    pub static ref WAL_WRITES: IntCounter = IntCounter::new(
        "world_wal_writes_total",
        "Economic WAL batches written"
    ).unwrap();

    /// Total ticks dropped by the missed-tick policy.
    pub static ref TICKS_DROPPED: IntCounter = IntCounter::new(
        "world_ticks_dropped_total",
        "Backlogged ticks dropped"
    ).unwrap();

    // ========================================================================
    // Gauges (can increase/decrease)
    // ========================================================================

    /// Currently connected sessions.
    pub static ref CONNECTED_SESSIONS: IntGauge = IntGauge::new(
        "world_connected_sessions",
        "Currently connected sessions"
    ).unwrap();

    /// Players currently in-world.
    pub static ref PLAYERS_IN_WORLD: IntGauge = IntGauge::new(
        "world_players_in_world",
        "Players currently in world"
    ).unwrap();

    /// Live NPCs.
    pub static ref LIVE_NPCS: IntGauge = IntGauge::new(
        "world_live_npcs",
        "Live NPCs"
    ).unwrap();

    // ========================================================================
    // Histograms
    // ========================================================================

    /// Wall time of a full tick, in seconds.
    pub static ref TICK_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("world_tick_duration_seconds", "Tick wall time")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.4])
    ).unwrap();
}

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    REGISTRY
        .register(Box::new(PACKETS_DISPATCHED.clone()))
        .unwrap();
    REGISTRY.register(Box::new(HANDLER_ERRORS.clone())).unwrap();
    REGISTRY
        .register(Box::new(SESSION_QUEUE_FULL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(SAVE_FAILURES.clone())).unwrap();
    REGISTRY.register(Box::new(WAL_WRITES.clone())).unwrap();
    REGISTRY.register(Box::new(TICKS_DROPPED.clone())).unwrap();
    REGISTRY
        .register(Box::new(CONNECTED_SESSIONS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(PLAYERS_IN_WORLD.clone()))
        .unwrap();
    REGISTRY.register(Box::new(LIVE_NPCS.clone())).unwrap();
    REGISTRY.register(Box::new(TICK_DURATION.clone())).unwrap();
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
