//! Match id batch accumulator.

use std::time::Duration;
use tokio::time::Instant;

/// Batch accumulator configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum batch size before flush
    pub max_size: usize,
    /// Maximum batch age before flush
    pub max_age: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: lake_core::limits::DEFAULT_BATCH_SIZE,
            max_age: Duration::from_millis(lake_core::limits::DEFAULT_FLUSH_INTERVAL_MS),
        }
    }
}

/// Ids read from the cursor and not yet dispatched.
///
/// Duplicate detection is the driver's job; the batch keeps ids in cursor
/// order as given.
#[derive(Debug)]
pub struct IdBatch {
    config: BatchConfig,
    ids: Vec<String>,
    /// Set when the first id of the current batch arrives.
    started_at: Option<Instant>,
}

impl IdBatch {
    pub fn new(config: BatchConfig) -> Self {
        let max_size = config.max_size.max(1);
        Self {
            config: BatchConfig { max_size, ..config },
            ids: Vec::with_capacity(max_size),
            started_at: None,
        }
    }

    pub fn push(&mut self, id: String) {
        if self.ids.is_empty() {
            self.started_at = Some(Instant::now());
        }
        self.ids.push(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= self.config.max_size
    }

    /// When a partial batch must be flushed, or `None` while empty.
    pub fn deadline(&self) -> Option<Instant> {
        self.started_at.map(|start| start + self.config.max_age)
    }

    pub fn should_flush(&self) -> bool {
        self.is_full() || self.deadline().is_some_and(|d| Instant::now() >= d)
    }

    /// Take the ids and reset the batch.
    pub fn take(&mut self) -> Vec<String> {
        self.started_at = None;
        std::mem::replace(&mut self.ids, Vec::with_capacity(self.config.max_size))
    }
}
