//! Process-wide metrics.
//!
//! Cheap atomics updated on hot paths by the clients and the worker pools.
//! Read through [`Metrics::snapshot`] by the progress reporter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 5ms, 25ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s, 60s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [5, 25, 100, 250, 500, 1000, 2500, 5000, 10000, 30000, 60000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(ms, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the exporter process.
#[derive(Debug, Default)]
pub struct Metrics {
    // Document store
    pub documents_fetched: Counter,
    pub document_fetch_errors: Counter,
    pub document_fetch_latency_ms: Histogram,

    // Upstream API
    pub upstream_requests: Counter,
    pub upstream_retries: Counter,
    pub upstream_not_found: Counter,
    pub upstream_errors: Counter,
    pub upstream_latency_ms: Histogram,
    pub upstream_gate_waiting: Gauge,

    // Object store
    pub objects_written: Counter,
    pub object_bytes_written: Counter,
    pub object_write_errors: Counter,
    pub object_put_latency_ms: Histogram,

    // Worker pools
    pub match_pool_running: Gauge,
    pub match_pool_queued: Gauge,
    pub timeline_pool_running: Gauge,
    pub timeline_pool_queued: Gauge,
    pub backpressure_active: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub documents_fetched: u64,
    pub document_fetch_errors: u64,
    pub upstream_requests: u64,
    pub upstream_retries: u64,
    pub upstream_not_found: u64,
    pub upstream_errors: u64,
    pub objects_written: u64,
    pub object_bytes_written: u64,
    pub object_write_errors: u64,
    pub document_fetch_latency_mean_ms: f64,
    pub upstream_latency_mean_ms: f64,
    pub upstream_latency_max_ms: u64,
    pub object_put_latency_mean_ms: f64,
    pub upstream_gate_waiting: u64,
    pub match_pool_running: u64,
    pub match_pool_queued: u64,
    pub timeline_pool_running: u64,
    pub timeline_pool_queued: u64,
    pub backpressure_active: bool,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            documents_fetched: self.documents_fetched.get(),
            document_fetch_errors: self.document_fetch_errors.get(),
            upstream_requests: self.upstream_requests.get(),
            upstream_retries: self.upstream_retries.get(),
            upstream_not_found: self.upstream_not_found.get(),
            upstream_errors: self.upstream_errors.get(),
            objects_written: self.objects_written.get(),
            object_bytes_written: self.object_bytes_written.get(),
            object_write_errors: self.object_write_errors.get(),
            document_fetch_latency_mean_ms: self.document_fetch_latency_ms.mean(),
            upstream_latency_mean_ms: self.upstream_latency_ms.mean(),
            upstream_latency_max_ms: self.upstream_latency_ms.max(),
            object_put_latency_mean_ms: self.object_put_latency_ms.mean(),
            upstream_gate_waiting: self.upstream_gate_waiting.get(),
            match_pool_running: self.match_pool_running.get(),
            match_pool_queued: self.match_pool_queued.get(),
            timeline_pool_running: self.timeline_pool_running.get(),
            timeline_pool_queued: self.timeline_pool_queued.get(),
            backpressure_active: self.backpressure_active.get() > 0,
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
