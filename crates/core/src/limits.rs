//! Default sizes and bounds for an export run.
//!
//! Memory held by a run is proportional to these values, not to the size of
//! the corpus: one batch of ids, the in-flight documents of the match pool,
//! the queued timeline tasks, and a fixed number of sampled error strings.

/// Match ids accumulated before a batch is dispatched.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A partial batch older than this is dispatched anyway (ms).
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;

/// Concurrent match-stage workers.
pub const DEFAULT_MATCH_CONCURRENCY: usize = 16;

/// Concurrent timeline-stage workers.
pub const DEFAULT_TIMELINE_CONCURRENCY: usize = 8;

/// Outstanding timeline tasks above which the driver pauses between batches.
/// Zero disables the pause.
pub const DEFAULT_TIMELINE_HIGH_WATERMARK: usize = 5_000;

/// Error strings kept for the final summary.
pub const MAX_ERROR_SAMPLES: usize = 10;

/// Seconds between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 30;
