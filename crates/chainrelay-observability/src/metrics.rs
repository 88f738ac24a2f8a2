//! ChainRelay pipeline counters.
//!
//! One `RelayMetrics` is shared (behind `Arc`) by every orchestrator and log
//! task of a relay. Counters are relaxed atomics; a [`MetricsSnapshot`] is
//! a point-in-time copy for logging.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Central metrics handle for a relay.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    logs_received: AtomicU64,
    events_decoded: AtomicU64,
    unknown_events: AtomicU64,
    decode_errors: AtomicU64,
    records_forwarded: AtomicU64,
    forward_skipped: AtomicU64,
    forward_errors: AtomicU64,
    reconnects: AtomicU64,
    processing_micros: AtomicU64,
    processed: AtomicU64,
}

/// Point-in-time copy of [`RelayMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub logs_received: u64,
    pub events_decoded: u64,
    pub unknown_events: u64,
    pub decode_errors: u64,
    pub records_forwarded: u64,
    pub forward_skipped: u64,
    pub forward_errors: u64,
    pub reconnects: u64,
    /// Mean per-log processing latency in milliseconds (0 when nothing processed)
    pub mean_latency_ms: f64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.logs_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.events_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown(&self) {
        self.unknown_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.records_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_skipped(&self) {
        self.forward_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_error(&self) {
        self.forward_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Wall time spent on one log, from receipt to forward outcome.
    pub fn record_latency(&self, elapsed: Duration) {
        self.processing_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let processed = self.processed.load(Ordering::Relaxed);
        let micros = self.processing_micros.load(Ordering::Relaxed);
        MetricsSnapshot {
            logs_received: self.logs_received.load(Ordering::Relaxed),
            events_decoded: self.events_decoded.load(Ordering::Relaxed),
            unknown_events: self.unknown_events.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            records_forwarded: self.records_forwarded.load(Ordering::Relaxed),
            forward_skipped: self.forward_skipped.load(Ordering::Relaxed),
            forward_errors: self.forward_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            mean_latency_ms: if processed == 0 {
                0.0
            } else {
                micros as f64 / processed as f64 / 1_000.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let m = RelayMetrics::new();
        m.record_received();
        m.record_received();
        m.record_decoded();
        m.record_unknown();
        m.record_forwarded();
        m.record_reconnect();
        let s = m.snapshot();
        assert_eq!(s.logs_received, 2);
        assert_eq!(s.events_decoded, 1);
        assert_eq!(s.unknown_events, 1);
        assert_eq!(s.records_forwarded, 1);
        assert_eq!(s.reconnects, 1);
        assert_eq!(s.forward_errors, 0);
    }

    #[test]
    fn mean_latency() {
        let m = RelayMetrics::new();
        assert_eq!(m.snapshot().mean_latency_ms, 0.0);
        m.record_latency(Duration::from_millis(2));
        m.record_latency(Duration::from_millis(4));
        assert!((m.snapshot().mean_latency_ms - 3.0).abs() < 1e-9);
    }
}
