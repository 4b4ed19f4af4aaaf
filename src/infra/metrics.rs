//! Lock-free channel metrics and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Do NOT use them for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Counters for one realtime channel
pub struct Metrics {
    /// Event frames received from the transport (monotonic)
    events_received: AtomicU64,
    /// Events handed to a registered handler (monotonic)
    events_dispatched: AtomicU64,
    /// Events that arrived while no handler was registered (monotonic)
    events_unhandled: AtomicU64,
    /// Payloads that failed to decode into a LocationEvent (monotonic)
    decode_errors: AtomicU64,
    /// Handlers that panicked during dispatch (monotonic)
    handler_panics: AtomicU64,
    /// Successful transport opens, including the first (monotonic)
    connects_total: AtomicU64,
    /// Reconnect attempts after a lost transport (monotonic)
    reconnects_total: AtomicU64,
    /// Dispatches since last report (reset on report)
    dispatched_since_report: AtomicU64,
    /// Sum of handler durations in microseconds (reset on report)
    handler_sum_us: AtomicU64,
    /// Max handler duration in microseconds (reset on report)
    handler_max_us: AtomicU64,
    /// Last report time (for rate calculation)
    last_report: parking_lot::Mutex<Instant>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_dispatched: AtomicU64::new(0),
            events_unhandled: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
            connects_total: AtomicU64::new(0),
            reconnects_total: AtomicU64::new(0),
            dispatched_since_report: AtomicU64::new(0),
            handler_sum_us: AtomicU64::new(0),
            handler_max_us: AtomicU64::new(0),
            last_report: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_event_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_dispatch(&self, handler_us: u64) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
        self.dispatched_since_report.fetch_add(1, Ordering::Relaxed);
        self.handler_sum_us.fetch_add(handler_us, Ordering::Relaxed);
        update_atomic_max(&self.handler_max_us, handler_us);
    }

    #[inline]
    pub fn record_unhandled(&self) {
        self.events_unhandled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_handler_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_connect(&self) {
        self.connects_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reconnect(&self) {
        self.reconnects_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    pub fn events_dispatched(&self) -> u64 {
        self.events_dispatched.load(Ordering::Relaxed)
    }

    pub fn events_unhandled(&self) -> u64 {
        self.events_unhandled.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn handler_panics(&self) -> u64 {
        self.handler_panics.load(Ordering::Relaxed)
    }

    pub fn connects_total(&self) -> u64 {
        self.connects_total.load(Ordering::Relaxed)
    }

    pub fn reconnects_total(&self) -> u64 {
        self.reconnects_total.load(Ordering::Relaxed)
    }

    /// Snapshot totals and swap the per-interval counters to zero
    pub fn report(&self) -> MetricsSummary {
        let elapsed = {
            let mut last = self.last_report.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let dispatched = self.dispatched_since_report.swap(0, Ordering::Relaxed);
        let handler_sum_us = self.handler_sum_us.swap(0, Ordering::Relaxed);
        let handler_max_us = self.handler_max_us.swap(0, Ordering::Relaxed);

        let secs = elapsed.as_secs_f64();
        let events_per_sec = if secs > 0.0 { dispatched as f64 / secs } else { 0.0 };
        let handler_avg_us = if dispatched > 0 { handler_sum_us / dispatched } else { 0 };

        MetricsSummary {
            events_received: self.events_received(),
            events_dispatched: self.events_dispatched(),
            events_unhandled: self.events_unhandled(),
            decode_errors: self.decode_errors(),
            handler_panics: self.handler_panics(),
            connects_total: self.connects_total(),
            reconnects_total: self.reconnects_total(),
            events_per_sec,
            handler_avg_us,
            handler_max_us,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub events_received: u64,
    pub events_dispatched: u64,
    pub events_unhandled: u64,
    pub decode_errors: u64,
    pub handler_panics: u64,
    pub connects_total: u64,
    pub reconnects_total: u64,
    pub events_per_sec: f64,
    pub handler_avg_us: u64,
    pub handler_max_us: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            events_received = %self.events_received,
            events_dispatched = %self.events_dispatched,
            events_unhandled = %self.events_unhandled,
            decode_errors = %self.decode_errors,
            handler_panics = %self.handler_panics,
            connects = %self.connects_total,
            reconnects = %self.reconnects_total,
            events_per_sec = %format!("{:.1}", self.events_per_sec),
            handler_avg_us = %self.handler_avg_us,
            handler_max_us = %self.handler_max_us,
            "channel_metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_event_received();
        metrics.record_event_received();
        metrics.record_dispatch(10);
        metrics.record_unhandled();
        metrics.record_decode_error();
        metrics.record_handler_panic();
        metrics.record_connect();
        metrics.record_reconnect();

        assert_eq!(metrics.events_received(), 2);
        assert_eq!(metrics.events_dispatched(), 1);
        assert_eq!(metrics.events_unhandled(), 1);
        assert_eq!(metrics.decode_errors(), 1);
        assert_eq!(metrics.handler_panics(), 1);
        assert_eq!(metrics.connects_total(), 1);
        assert_eq!(metrics.reconnects_total(), 1);
    }

    #[test]
    fn test_report_resets_interval_counters() {
        let metrics = Metrics::new();
        metrics.record_dispatch(100);
        metrics.record_dispatch(300);

        let summary = metrics.report();
        assert_eq!(summary.events_dispatched, 2);
        assert_eq!(summary.handler_avg_us, 200);
        assert_eq!(summary.handler_max_us, 300);

        let summary = metrics.report();
        // totals persist, interval stats reset
        assert_eq!(summary.events_dispatched, 2);
        assert_eq!(summary.handler_avg_us, 0);
        assert_eq!(summary.handler_max_us, 0);
    }
}
