//! Prometheus metrics for the price-relay bot.
//!
//! Covers the pipeline surface: stream connection state, reauthentication
//! attempts, received price events, queue depth, and webhook delivery
//! outcomes per destination.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. Registration failure
//! means a duplicate metric name, a fatal configuration error best caught by
//! crashing at startup. These panics only occur during static
//! initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_int_gauge, Counter, CounterVec, Gauge, GaugeVec, IntGauge,
};

/// Stream connection state (1 = open, 0 = not open).
pub static STREAM_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("relay_stream_connected", "Stream connection state (1=open)").unwrap()
});

/// Connection state machine current state.
/// Labels: state (closed/connecting/open/reauthenticating)
pub static STREAM_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "relay_stream_state",
        "Connection state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total reauthentication attempts by outcome.
pub static REAUTH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_reauth_total",
        "Total reauthentication attempts",
        &["outcome"]
    )
    .unwrap()
});

/// Total price-update events received from the stream.
pub static PRICE_EVENTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "relay_price_events_total",
        "Total price-update events received from the stream"
    )
    .unwrap()
});

/// Total inbound frames dropped as undecodable.
pub static FRAMES_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "relay_frames_dropped_total",
        "Total inbound frames dropped as undecodable"
    )
    .unwrap()
});

/// Current delivery queue depth (pending keys).
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("relay_queue_depth", "Current delivery queue depth").unwrap()
});

/// Total webhook deliveries by destination index.
pub static WEBHOOK_DELIVERED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_webhook_delivered_total",
        "Total successful webhook deliveries",
        &["destination"]
    )
    .unwrap()
});

/// Total failed webhook deliveries by destination index.
pub static WEBHOOK_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_webhook_failed_total",
        "Total failed webhook deliveries",
        &["destination"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record the stream reaching the open state.
    pub fn stream_connected() {
        STREAM_CONNECTED.set(1.0);
    }

    /// Record the stream leaving the open state.
    pub fn stream_disconnected() {
        STREAM_CONNECTED.set(0.0);
    }

    /// Set the connection state machine state.
    /// Only the active state is set to 1, all others to 0.
    pub fn stream_state_set(state: &str) {
        for s in &["closed", "connecting", "open", "reauthenticating"] {
            STREAM_STATE.with_label_values(&[s]).set(0.0);
        }
        STREAM_STATE.with_label_values(&[state]).set(1.0);
    }

    /// Record a reauthentication attempt outcome ("ok" / "failed").
    pub fn reauth(outcome: &str) {
        REAUTH_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a received price-update event.
    pub fn price_event() {
        PRICE_EVENTS_TOTAL.inc();
    }

    /// Record a dropped undecodable frame.
    pub fn frame_dropped() {
        FRAMES_DROPPED_TOTAL.inc();
    }

    /// Update the delivery queue depth.
    pub fn queue_depth(depth: i64) {
        QUEUE_DEPTH.set(depth);
    }

    /// Record a successful webhook delivery.
    pub fn webhook_delivered(destination: usize) {
        WEBHOOK_DELIVERED_TOTAL
            .with_label_values(&[&destination.to_string()])
            .inc();
    }

    /// Record a failed webhook delivery.
    pub fn webhook_failed(destination: usize) {
        WEBHOOK_FAILED_TOTAL
            .with_label_values(&[&destination.to_string()])
            .inc();
    }
}
