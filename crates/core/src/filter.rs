//! Export filter and the queue allow-list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Queues approved for analytics exports.
///
/// 400 draft pick, 420 ranked solo/duo, 430 blind pick, 440 ranked flex,
/// 450 ARAM, 490 quickplay.
pub const DEFAULT_ALLOWED_QUEUES: [i32; 6] = [400, 420, 430, 440, 450, 490];

/// Set of queue ids that may be written to the lake.
///
/// This is the authoritative gate: it is applied to every fetched document
/// regardless of what the store-side query asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAllowList(BTreeSet<i32>);

impl QueueAllowList {
    pub fn new(queues: impl IntoIterator<Item = i32>) -> Self {
        Self(queues.into_iter().collect())
    }

    pub fn allows(&self, queue_id: Option<i32>) -> bool {
        queue_id.is_some_and(|q| self.0.contains(&q))
    }

    pub fn queues(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for QueueAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_QUEUES)
    }
}

/// Which matches a run should export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFilter {
    /// Calendar year of match creation.
    pub season: Option<i32>,
    /// `major.minor` patch bucket.
    pub patch: Option<String>,
    /// Queues to query for. Defaults to the allow-list when empty.
    pub queue_ids: Option<Vec<i32>>,
    /// Only matches updated at or after this instant.
    pub updated_since: Option<DateTime<Utc>>,
}

impl ExportFilter {
    /// Queue ids to send to the store, falling back to the allow-list.
    pub fn effective_queues(&self, allow_list: &QueueAllowList) -> Vec<i32> {
        match &self.queue_ids {
            Some(queues) if !queues.is_empty() => queues.clone(),
            _ => allow_list.queues().collect(),
        }
    }
}
