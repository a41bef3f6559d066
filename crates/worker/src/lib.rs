//! Export workers for the match lake exporter.
//!
//! - Batch driver (cursor -> fixed-size id batches)
//! - Match export stage (document -> `bronze/matches`)
//! - Timeline export stage (local store or upstream -> `bronze/timelines`)
//! - Bounded worker pools and progress tracking

pub mod batch;
pub mod driver;
pub mod match_stage;
pub mod pool;
pub mod progress;
pub mod timeline_stage;

pub use batch::{BatchConfig, IdBatch};
pub use driver::*;
pub use match_stage::{MatchExportWorker, MatchOutcome};
pub use pool::WorkerPool;
pub use progress::{ErrorSample, ProgressSnapshot, ProgressTracker};
pub use timeline_stage::{TimelineExportWorker, TimelineOutcome};
