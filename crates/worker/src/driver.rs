//! Batch driver.
//!
//! Streams match ids from the source cursor into fixed-size batches and feeds
//! them through the two worker pools. Per batch the driver waits for the match
//! stage only; timeline tasks are queued by each match task as soon as its
//! match is written and are drained once, at the end of the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::StreamExt;
use lake_core::limits::{
    DEFAULT_MATCH_CONCURRENCY, DEFAULT_PROGRESS_INTERVAL_SECS, DEFAULT_TIMELINE_CONCURRENCY,
    DEFAULT_TIMELINE_HIGH_WATERMARK, MAX_ERROR_SAMPLES,
};
use lake_core::{ExportFilter, QueueAllowList, Result, Stage};
use mongo_source::{MatchIdSource, MatchStore, TimelineStore};
use riot_api::RetryingClient;
use s3_sink::RecordWriter;
use serde::Serialize;
use telemetry::metrics;
use tracing::{debug, error, info, warn};

use crate::batch::{BatchConfig, IdBatch};
use crate::match_stage::{MatchExportWorker, MatchOutcome};
use crate::pool::WorkerPool;
use crate::progress::{spawn_reporter, ProgressSnapshot, ProgressTracker};
use crate::timeline_stage::TimelineExportWorker;

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub batch: BatchConfig,
    pub match_concurrency: usize,
    pub timeline_concurrency: usize,
    /// Pause between batches while more timeline tasks than this are
    /// outstanding. Zero disables the pause.
    pub timeline_high_watermark: usize,
    /// Stop reading after this many unique ids.
    pub limit: Option<usize>,
    pub progress_interval: Duration,
    pub error_sample_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            match_concurrency: DEFAULT_MATCH_CONCURRENCY,
            timeline_concurrency: DEFAULT_TIMELINE_CONCURRENCY,
            timeline_high_watermark: DEFAULT_TIMELINE_HIGH_WATERMARK,
            limit: None,
            progress_interval: Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS),
            error_sample_size: MAX_ERROR_SAMPLES,
        }
    }
}

/// Read side of the document store.
#[derive(Clone)]
pub struct Sources {
    pub ids: Arc<dyn MatchIdSource>,
    pub matches: Arc<dyn MatchStore>,
    pub timelines: Arc<dyn TimelineStore>,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub ids_read: u64,
    pub duplicate_ids: u64,
    pub batches: u64,
    #[serde(flatten)]
    pub progress: ProgressSnapshot,
    pub errors_total: u64,
    pub error_sample: Vec<String>,
}

impl ExportSummary {
    pub fn log(&self) {
        info!(
            ids_read = self.ids_read,
            duplicate_ids = self.duplicate_ids,
            batches = self.batches,
            matches_exported = self.progress.matches_exported,
            matches_missing = self.progress.matches_missing,
            matches_filtered = self.progress.matches_filtered,
            matches_failed = self.progress.matches_failed,
            timelines_local = self.progress.timelines_local,
            timelines_upstream = self.progress.timelines_upstream,
            timelines_skipped = self.progress.timelines_skipped,
            timelines_failed = self.progress.timelines_failed,
            success_rate = format!("{:.1}%", self.progress.success_rate()),
            elapsed_secs = self.progress.elapsed.as_secs(),
            "Export finished"
        );
        for message in &self.error_sample {
            warn!("Sampled error: {}", message);
        }
        if self.errors_total > self.error_sample.len() as u64 {
            warn!(
                "{} more errors not shown",
                self.errors_total - self.error_sample.len() as u64
            );
        }
    }
}

#[derive(Default)]
struct CursorStats {
    ids_read: u64,
    duplicate_ids: u64,
    batches: u64,
}

/// Runs one export over a filtered range of matches.
pub struct BatchDriver {
    config: DriverConfig,
    ids: Arc<dyn MatchIdSource>,
    allow_list: QueueAllowList,
    match_worker: Arc<MatchExportWorker>,
    timeline_worker: Arc<TimelineExportWorker>,
    match_pool: WorkerPool,
    timeline_pool: WorkerPool,
    progress: Arc<ProgressTracker>,
}

impl BatchDriver {
    pub fn new(
        config: DriverConfig,
        sources: Sources,
        upstream: RetryingClient,
        writer: RecordWriter,
        allow_list: QueueAllowList,
    ) -> Self {
        let progress = Arc::new(ProgressTracker::new(config.error_sample_size));
        let match_worker = Arc::new(MatchExportWorker::new(
            sources.matches,
            writer.clone(),
            allow_list.clone(),
            progress.clone(),
        ));
        let timeline_worker = Arc::new(TimelineExportWorker::new(
            sources.timelines,
            upstream,
            writer,
            progress.clone(),
        ));

        Self {
            match_pool: WorkerPool::new(Stage::Match, config.match_concurrency),
            timeline_pool: WorkerPool::new(Stage::Timeline, config.timeline_concurrency),
            config,
            ids: sources.ids,
            allow_list,
            match_worker,
            timeline_worker,
            progress,
        }
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    pub fn timeline_pool(&self) -> &WorkerPool {
        &self.timeline_pool
    }

    /// Runs the export to completion.
    ///
    /// Returns an error only for fatal failures (the cursor). Per-task
    /// failures are counted in the summary.
    pub async fn run(&self, filter: &ExportFilter) -> Result<ExportSummary> {
        info!(
            season = ?filter.season,
            patch = ?filter.patch,
            queues = ?filter.effective_queues(&self.allow_list),
            updated_since = ?filter.updated_since,
            batch_size = self.config.batch.max_size,
            match_concurrency = self.match_pool.concurrency(),
            timeline_concurrency = self.timeline_pool.concurrency(),
            "Starting export"
        );

        let reporter = spawn_reporter(
            self.progress.clone(),
            self.match_pool.clone(),
            self.timeline_pool.clone(),
            self.config.progress_interval,
        );
        let stats = match self.read_cursor(filter).await {
            Ok(stats) => stats,
            Err(e) => {
                reporter.abort();
                error!("Export aborted: {}", e);
                return Err(e);
            }
        };

        info!(
            outstanding = self.timeline_pool.outstanding(),
            "Cursor exhausted, draining timeline pool"
        );
        self.timeline_pool.drain().await;
        reporter.abort();

        let errors = self.progress.error_sample();
        Ok(ExportSummary {
            ids_read: stats.ids_read,
            duplicate_ids: stats.duplicate_ids,
            batches: stats.batches,
            progress: self.progress.snapshot(),
            errors_total: errors.total(),
            error_sample: errors.messages().to_vec(),
        })
    }

    async fn read_cursor(&self, filter: &ExportFilter) -> Result<CursorStats> {
        let mut cursor = self.ids.open_cursor(filter, &self.allow_list).await?;
        let mut batch = IdBatch::new(self.config.batch.clone());
        let mut stats = CursorStats::default();
        // Ids only, never documents; one task per match id per run.
        let mut dispatched: HashSet<String> = HashSet::new();

        loop {
            if let Some(limit) = self.config.limit.filter(|&l| stats.ids_read >= l as u64) {
                info!(limit, "Id limit reached");
                break;
            }

            let next = match batch.deadline() {
                Some(deadline) => match tokio::time::timeout_at(deadline, cursor.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.dispatch(batch.take(), &mut stats).await;
                        continue;
                    }
                },
                None => cursor.next().await,
            };
            let Some(next) = next else { break };
            let match_id = next?;

            if !dispatched.insert(match_id.clone()) {
                debug!(match_id = %match_id, "Skipping duplicate id");
                stats.duplicate_ids += 1;
                continue;
            }
            batch.push(match_id);
            stats.ids_read += 1;

            if batch.should_flush() {
                self.dispatch(batch.take(), &mut stats).await;
            }
        }

        if !batch.is_empty() {
            self.dispatch(batch.take(), &mut stats).await;
        }
        Ok(stats)
    }

    /// Runs the match stage of one batch to completion, then applies the
    /// timeline high-watermark.
    async fn dispatch(&self, ids: Vec<String>, stats: &mut CursorStats) {
        stats.batches += 1;
        debug!(batch = stats.batches, size = ids.len(), "Dispatching batch");

        let handles: Vec<_> = ids
            .into_iter()
            .map(|match_id| self.submit_match(match_id))
            .collect();

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                self.progress.failure(Stage::Match, "<task>", &e);
            }
        }

        self.apply_high_watermark().await;
    }

    fn submit_match(&self, match_id: String) -> tokio::task::JoinHandle<MatchOutcome> {
        let match_worker = self.match_worker.clone();
        let timeline_worker = self.timeline_worker.clone();
        let timeline_pool = self.timeline_pool.clone();

        self.match_pool.submit(async move {
            let outcome = match_worker.export(&match_id).await;
            if let MatchOutcome::Exported(task) = &outcome {
                let task = task.clone();
                timeline_pool.submit(async move { timeline_worker.export(task).await });
            }
            outcome
        })
    }

    async fn apply_high_watermark(&self) {
        let watermark = self.config.timeline_high_watermark;
        if watermark == 0 || self.timeline_pool.outstanding() <= watermark {
            return;
        }

        warn!(
            outstanding = self.timeline_pool.outstanding(),
            watermark,
            "Timeline backlog above watermark, pausing cursor"
        );
        metrics().backpressure_active.set(1);
        self.timeline_pool.wait_for_depth(watermark).await;
        metrics().backpressure_active.set(0);
        info!("Timeline backlog recovered, resuming cursor");
    }
}
