//! Run progress and error sampling.
//!
//! Purely observational: nothing here influences scheduling.

use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lake_core::{Provenance, Stage};
use parking_lot::Mutex;
use serde::Serialize;
use telemetry::{metrics, Counter, ResourceSampler};
use tokio::task::JoinHandle;
use tracing::info;

use crate::pool::WorkerPool;

/// First `capacity` error messages of a run.
#[derive(Debug, Clone)]
pub struct ErrorSample {
    capacity: usize,
    messages: Vec<String>,
    total: u64,
}

impl ErrorSample {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Vec::with_capacity(capacity),
            total: 0,
        }
    }

    /// Records an error. Only the first `capacity` messages are kept.
    pub fn push(&mut self, message: String) {
        self.total += 1;
        if self.messages.len() < self.capacity {
            self.messages.push(message);
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Every error seen, sampled or not.
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Point-in-time copy of the run counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub matches_exported: u64,
    pub matches_missing: u64,
    pub matches_filtered: u64,
    pub matches_failed: u64,
    pub timelines_local: u64,
    pub timelines_upstream: u64,
    pub timelines_skipped: u64,
    pub timelines_failed: u64,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl ProgressSnapshot {
    pub fn timelines_exported(&self) -> u64 {
        self.timelines_local + self.timelines_upstream
    }

    /// Tasks of both stages that reached a terminal state.
    pub fn processed(&self) -> u64 {
        self.matches_exported
            + self.matches_missing
            + self.matches_filtered
            + self.matches_failed
            + self.timelines_exported()
            + self.timelines_skipped
            + self.timelines_failed
    }

    pub fn failed(&self) -> u64 {
        self.matches_failed + self.timelines_failed
    }

    /// Share of processed tasks that did not fail, in percent.
    pub fn success_rate(&self) -> f64 {
        match self.processed() {
            0 => 100.0,
            n => (n - self.failed()) as f64 * 100.0 / n as f64,
        }
    }

    /// Processed tasks per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed() as f64 / secs
        } else {
            0.0
        }
    }
}

/// Counters shared by both stages of a run.
pub struct ProgressTracker {
    started_at: Instant,
    matches_exported: Counter,
    matches_missing: Counter,
    matches_filtered: Counter,
    matches_failed: Counter,
    timelines_local: Counter,
    timelines_upstream: Counter,
    timelines_skipped: Counter,
    timelines_failed: Counter,
    errors: Mutex<ErrorSample>,
}

impl ProgressTracker {
    pub fn new(error_capacity: usize) -> Self {
        Self {
            started_at: Instant::now(),
            matches_exported: Counter::new(),
            matches_missing: Counter::new(),
            matches_filtered: Counter::new(),
            matches_failed: Counter::new(),
            timelines_local: Counter::new(),
            timelines_upstream: Counter::new(),
            timelines_skipped: Counter::new(),
            timelines_failed: Counter::new(),
            errors: Mutex::new(ErrorSample::new(error_capacity)),
        }
    }

    pub fn match_exported(&self) {
        self.matches_exported.inc();
    }

    pub fn match_missing(&self) {
        self.matches_missing.inc();
    }

    pub fn match_filtered(&self) {
        self.matches_filtered.inc();
    }

    pub fn timeline_exported(&self, provenance: Provenance) {
        match provenance {
            Provenance::LocalStore => self.timelines_local.inc(),
            Provenance::UpstreamApi => self.timelines_upstream.inc(),
        }
    }

    pub fn timeline_skipped(&self) {
        self.timelines_skipped.inc();
    }

    /// Counts a per-task failure and samples its message.
    pub fn failure(&self, stage: Stage, match_id: &str, error: &dyn Display) {
        match stage {
            Stage::Match => self.matches_failed.inc(),
            Stage::Timeline => self.timelines_failed.inc(),
        }
        self.errors
            .lock()
            .push(format!("[{}] {}: {}", stage, match_id, error));
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            matches_exported: self.matches_exported.get(),
            matches_missing: self.matches_missing.get(),
            matches_filtered: self.matches_filtered.get(),
            matches_failed: self.matches_failed.get(),
            timelines_local: self.timelines_local.get(),
            timelines_upstream: self.timelines_upstream.get(),
            timelines_skipped: self.timelines_skipped.get(),
            timelines_failed: self.timelines_failed.get(),
            elapsed: self.started_at.elapsed(),
        }
    }

    pub fn error_sample(&self) -> ErrorSample {
        self.errors.lock().clone()
    }

    /// Logs one progress line.
    pub fn report(
        &self,
        match_pool: &WorkerPool,
        timeline_pool: &WorkerPool,
        sampler: &mut ResourceSampler,
    ) {
        let snapshot = self.snapshot();
        info!(
            processed = snapshot.processed(),
            failed = snapshot.failed(),
            matches_exported = snapshot.matches_exported,
            timelines_exported = snapshot.timelines_exported(),
            timelines_skipped = snapshot.timelines_skipped,
            success_rate = format!("{:.1}%", snapshot.success_rate()),
            throughput = format!("{:.1}/s", snapshot.throughput()),
            elapsed_secs = snapshot.elapsed.as_secs(),
            memory_mb = format!("{:.1}", sampler.resident_mb()),
            match_running = match_pool.running(),
            match_queued = match_pool.queued(),
            timeline_running = timeline_pool.running(),
            timeline_queued = timeline_pool.queued(),
            upstream_retries = metrics().upstream_retries.get(),
            "Export progress"
        );
    }
}

/// Logs progress every `every` until the handle is aborted.
pub fn spawn_reporter(
    progress: Arc<ProgressTracker>,
    match_pool: WorkerPool,
    timeline_pool: WorkerPool,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = ResourceSampler::new();
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            progress.report(&match_pool, &timeline_pool, &mut sampler);
        }
    })
}
