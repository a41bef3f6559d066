//! Match export stage.

use std::sync::Arc;

use chrono::Utc;
use lake_core::{
    to_ndjson, ExportTask, MatchExport, PartitionKey, QueueAllowList, Result, Stage,
    MATCHES_PREFIX,
};
use mongo_source::MatchStore;
use s3_sink::RecordWriter;
use tracing::debug;

use crate::progress::ProgressTracker;

/// Terminal state of one match task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Written; carries the handoff for the timeline stage.
    Exported(ExportTask),
    /// No document for the id.
    Missing,
    /// Queue not in the allow-list.
    Filtered,
    Failed,
}

/// Fetches, normalizes and writes single match documents.
pub struct MatchExportWorker {
    store: Arc<dyn MatchStore>,
    writer: RecordWriter,
    allow_list: QueueAllowList,
    progress: Arc<ProgressTracker>,
}

impl MatchExportWorker {
    pub fn new(
        store: Arc<dyn MatchStore>,
        writer: RecordWriter,
        allow_list: QueueAllowList,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            store,
            writer,
            allow_list,
            progress,
        }
    }

    /// Exports one match. Errors are counted and sampled here and never
    /// returned.
    pub async fn export(&self, match_id: &str) -> MatchOutcome {
        let outcome = match self.try_export(match_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.progress.failure(Stage::Match, match_id, &e);
                return MatchOutcome::Failed;
            }
        };

        match &outcome {
            MatchOutcome::Exported(_) => self.progress.match_exported(),
            MatchOutcome::Missing => self.progress.match_missing(),
            MatchOutcome::Filtered => self.progress.match_filtered(),
            MatchOutcome::Failed => {}
        }
        outcome
    }

    async fn try_export(&self, match_id: &str) -> Result<MatchOutcome> {
        let Some(record) = self.store.fetch_match(match_id).await? else {
            debug!(match_id = %match_id, "Match document not found");
            return Ok(MatchOutcome::Missing);
        };

        if !self.allow_list.allows(record.queue_id) {
            debug!(
                match_id = %match_id,
                queue_id = ?record.queue_id,
                "Skipping match outside queue allow-list"
            );
            return Ok(MatchOutcome::Filtered);
        }

        let partition = record.partition();
        let key = PartitionKey::build(MATCHES_PREFIX, &partition, &record.match_id);
        let line = to_ndjson(&MatchExport::new(&record, &partition, Utc::now()))?;
        let object_key = self.writer.write(&key, line).await?;
        debug!(match_id = %record.match_id, key = %object_key, "Exported match");

        Ok(MatchOutcome::Exported(ExportTask::new(
            record.match_id,
            partition,
        )))
    }
}
