//! Timeline export stage.
//!
//! Each task walks a small state machine:
//!
//! ```text
//! LookupLocal --found--> Write --> Exported
//!     |
//!   absent
//!     v
//! FetchUpstream --frames--> Write --> Exported
//!     |--no frames--> Skipped
//!     '--error------> Failed
//! ```
//!
//! A local document with no frames, or a failed local lookup, counts as
//! absent.

use std::sync::Arc;

use chrono::Utc;
use lake_core::{
    to_ndjson, ExportTask, PartitionKey, Provenance, Result, Stage, TimelineExport,
    TimelineRecord, TIMELINES_PREFIX,
};
use mongo_source::TimelineStore;
use riot_api::RetryingClient;
use s3_sink::RecordWriter;
use tracing::{debug, warn};

use crate::progress::ProgressTracker;

/// Terminal state of one timeline task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineOutcome {
    Exported(Provenance),
    /// Unavailable both locally and upstream.
    Skipped,
    Failed,
}

enum Step {
    LookupLocal,
    FetchUpstream,
    Write(TimelineRecord),
}

/// Resolves timelines locally or upstream and writes them.
pub struct TimelineExportWorker {
    local: Arc<dyn TimelineStore>,
    upstream: RetryingClient,
    writer: RecordWriter,
    progress: Arc<ProgressTracker>,
}

impl TimelineExportWorker {
    pub fn new(
        local: Arc<dyn TimelineStore>,
        upstream: RetryingClient,
        writer: RecordWriter,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            local,
            upstream,
            writer,
            progress,
        }
    }

    /// Exports the timeline of one exported match. Never returns an error.
    pub async fn export(&self, task: ExportTask) -> TimelineOutcome {
        let mut step = Step::LookupLocal;

        loop {
            step = match step {
                Step::LookupLocal => match self.local.fetch_timeline(&task.match_id).await {
                    Ok(Some(timeline)) if timeline.has_frames() => Step::Write(timeline),
                    Ok(_) => Step::FetchUpstream,
                    Err(e) => {
                        warn!(
                            match_id = %task.match_id,
                            error = %e,
                            "Local timeline lookup failed, falling back to upstream"
                        );
                        Step::FetchUpstream
                    }
                },
                Step::FetchUpstream => match self.upstream.fetch(&task.match_id).await {
                    Ok(Some(timeline)) => Step::Write(timeline),
                    Ok(None) => {
                        debug!(match_id = %task.match_id, "Timeline unavailable, skipping");
                        self.progress.timeline_skipped();
                        return TimelineOutcome::Skipped;
                    }
                    Err(e) => {
                        self.progress.failure(Stage::Timeline, &task.match_id, &e);
                        return TimelineOutcome::Failed;
                    }
                },
                Step::Write(timeline) => {
                    return match self.write(&timeline, &task).await {
                        Ok(()) => {
                            self.progress.timeline_exported(timeline.provenance);
                            TimelineOutcome::Exported(timeline.provenance)
                        }
                        Err(e) => {
                            self.progress.failure(Stage::Timeline, &task.match_id, &e);
                            TimelineOutcome::Failed
                        }
                    };
                }
            };
        }
    }

    async fn write(&self, timeline: &TimelineRecord, task: &ExportTask) -> Result<()> {
        let key = PartitionKey::build(TIMELINES_PREFIX, &task.partition, &task.match_id);
        let line = to_ndjson(&TimelineExport::new(timeline, task, Utc::now()))?;
        let object_key = self.writer.write(&key, line).await?;
        debug!(
            match_id = %task.match_id,
            key = %object_key,
            provenance = timeline.provenance.as_str(),
            "Exported timeline"
        );
        Ok(())
    }
}
