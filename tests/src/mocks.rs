//! Mock implementations for testing.
//!
//! Each mock implements the same trait as its production counterpart, so the
//! driver and both worker stages run their real code paths against memory.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lake_core::{
    Error, ExportFilter, MatchRecord, Provenance, QueueAllowList, Result, TimelineRecord,
};
use mongo_source::{MatchIdSource, MatchIdStream, MatchStore, TimelineStore};
use parking_lot::Mutex;
use riot_api::{ApiError, Sleeper, TimelineApi};
use s3_sink::{Codec, ObjectStore};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// In-memory document store holding matches, timelines and the cursor order.
#[derive(Default)]
pub struct MockDocumentStore {
    matches: Mutex<HashMap<String, Value>>,
    timelines: Mutex<HashMap<String, Value>>,
    cursor: Mutex<Vec<String>>,
    /// Cursor yields an error after this many ids.
    cursor_fails_after: Mutex<Option<usize>>,
    failing_matches: Mutex<HashSet<String>>,
    failing_timelines: Mutex<HashSet<String>>,
    filters_seen: Mutex<Vec<ExportFilter>>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a match document and appends its id to the cursor.
    pub fn insert_match(&self, match_id: &str, doc: Value) {
        self.matches.lock().insert(match_id.to_string(), doc);
        self.cursor.lock().push(match_id.to_string());
    }

    pub fn insert_timeline(&self, match_id: &str, doc: Value) {
        self.timelines.lock().insert(match_id.to_string(), doc);
    }

    /// Appends an id to the cursor without a backing document.
    pub fn push_cursor_id(&self, match_id: &str) {
        self.cursor.lock().push(match_id.to_string());
    }

    pub fn fail_cursor_after(&self, ids: usize) {
        *self.cursor_fails_after.lock() = Some(ids);
    }

    pub fn fail_match_fetch(&self, match_id: &str) {
        self.failing_matches.lock().insert(match_id.to_string());
    }

    pub fn fail_timeline_lookup(&self, match_id: &str) {
        self.failing_timelines.lock().insert(match_id.to_string());
    }

    pub fn filters_seen(&self) -> Vec<ExportFilter> {
        self.filters_seen.lock().clone()
    }
}

#[async_trait]
impl MatchStore for MockDocumentStore {
    async fn fetch_match(&self, match_id: &str) -> Result<Option<MatchRecord>> {
        if self.failing_matches.lock().contains(match_id) {
            return Err(Error::source("mock document store unavailable"));
        }
        let doc = self.matches.lock().get(match_id).cloned();
        doc.map(MatchRecord::from_document).transpose()
    }
}

#[async_trait]
impl TimelineStore for MockDocumentStore {
    async fn fetch_timeline(&self, match_id: &str) -> Result<Option<TimelineRecord>> {
        if self.failing_timelines.lock().contains(match_id) {
            return Err(Error::source("mock timeline collection unavailable"));
        }
        let doc = self.timelines.lock().get(match_id).cloned();
        Ok(doc.map(|doc| TimelineRecord::from_document(match_id, doc, Provenance::LocalStore)))
    }
}

#[async_trait]
impl MatchIdSource for MockDocumentStore {
    /// Yields every inserted id regardless of the filter, so the allow-list
    /// post-filter is what keeps disallowed queues out.
    async fn open_cursor(
        &self,
        filter: &ExportFilter,
        _allow_list: &QueueAllowList,
    ) -> Result<MatchIdStream> {
        self.filters_seen.lock().push(filter.clone());

        let mut items: Vec<Result<String>> = self.cursor.lock().iter().cloned().map(Ok).collect();
        if let Some(after) = *self.cursor_fails_after.lock() {
            items.truncate(after);
            items.push(Err(Error::cursor("mock cursor killed")));
        }
        Ok(stream::iter(items).boxed())
    }
}

/// Object store that keeps every put in memory.
#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    puts: Mutex<usize>,
    /// Puts to keys containing any of these fragments fail.
    failing_fragments: Mutex<Vec<String>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_keys_containing(&self, fragment: &str) {
        self.failing_fragments.lock().push(fragment.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn put_count(&self) -> usize {
        *self.puts.lock()
    }

    /// Decodes the single NDJSON record stored under `key`.
    pub fn record(&self, key: &str) -> Option<Value> {
        let body = self.objects.lock().get(key).cloned()?;
        let codec = if key.ends_with(".zst") {
            Codec::Zstd
        } else {
            Codec::None
        };
        let raw = codec.decompress(&body).ok()?;
        let line = std::str::from_utf8(&raw).ok()?.lines().next()?.to_string();
        serde_json::from_str(&line).ok()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, _content_encoding: Option<&str>) -> Result<()> {
        let fails = self
            .failing_fragments
            .lock()
            .iter()
            .any(|fragment| key.contains(fragment.as_str()));
        if fails {
            return Err(Error::object_store(key, "mock put rejected"));
        }

        *self.puts.lock() += 1;
        self.objects.lock().insert(key.to_string(), body);
        Ok(())
    }
}

/// Upstream API with per-match scripted responses.
///
/// Ids without a script answer 404.
#[derive(Default)]
pub struct MockTimelineApi {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<Value, ApiError>>>>,
    calls: Mutex<HashMap<String, usize>>,
    stalls: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockTimelineApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `match_id`. `Ok` carries a raw timeline document.
    pub fn respond(&self, match_id: &str, response: std::result::Result<Value, ApiError>) {
        self.scripts
            .lock()
            .entry(match_id.to_string())
            .or_default()
            .push_back(response);
    }

    /// Blocks calls for `match_id` until the returned handle is notified.
    pub fn stall(&self, match_id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.stalls
            .lock()
            .insert(match_id.to_string(), notify.clone());
        notify
    }

    pub fn calls(&self, match_id: &str) -> usize {
        self.calls.lock().get(match_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl TimelineApi for MockTimelineApi {
    async fn get_timeline(
        &self,
        match_id: &str,
    ) -> std::result::Result<TimelineRecord, ApiError> {
        *self.calls.lock().entry(match_id.to_string()).or_default() += 1;

        let stall = self.stalls.lock().get(match_id).cloned();
        if let Some(stall) = stall {
            stall.notified().await;
        }

        let response = self
            .scripts
            .lock()
            .get_mut(match_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Err(ApiError::Status(404)));

        response.map(|doc| TimelineRecord::from_document(match_id, doc, Provenance::UpstreamApi))
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_mock_object_store_failure_mode() {
        let store = MockObjectStore::new();
        store.fail_keys_containing("matchId=EUW1_2");

        assert!(store.put("a/matchId=EUW1_1.jsonl", b"{}\n".to_vec(), None).await.is_ok());
        assert!(store.put("a/matchId=EUW1_2.jsonl", b"{}\n".to_vec(), None).await.is_err());
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.record("a/matchId=EUW1_1.jsonl"), Some(serde_json::json!({})));
    }

    #[tokio::test]
    async fn test_mock_cursor_failure() {
        let store = MockDocumentStore::new();
        store.insert_match("EUW1_1", fixtures::ranked_match("EUW1_1"));
        store.insert_match("EUW1_2", fixtures::ranked_match("EUW1_2"));
        store.fail_cursor_after(1);

        let stream = store
            .open_cursor(&ExportFilter::default(), &QueueAllowList::default())
            .await
            .unwrap();
        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Cursor(_))));
    }

    #[tokio::test]
    async fn test_mock_api_defaults_to_not_found() {
        let api = MockTimelineApi::new();
        assert_eq!(
            api.get_timeline("EUW1_1").await.unwrap_err(),
            ApiError::Status(404)
        );
        assert_eq!(api.calls("EUW1_1"), 1);
    }
}
