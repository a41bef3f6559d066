//! Read access to match and timeline documents.
//!
//! The exporter consumes the store through three narrow traits so the worker
//! pools can be exercised against in-memory doubles.

use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lake_core::{
    Error, ExportFilter, MatchRecord, Provenance, QueueAllowList, Result, TimelineRecord,
};
use mongodb::bson::{doc, Document};
use telemetry::metrics;
use tracing::{debug, warn};

use crate::client::{to_json, MongoClient};
use crate::query::{build_match_query, id_projection, match_sort, MATCH_ID_FIELD};

/// Stream of match ids in cursor order.
pub type MatchIdStream = BoxStream<'static, Result<String>>;

/// Point lookups of full match documents.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Returns `None` when no document exists for the id.
    async fn fetch_match(&self, match_id: &str) -> Result<Option<MatchRecord>>;
}

/// Point lookups of locally stored timelines.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn fetch_timeline(&self, match_id: &str) -> Result<Option<TimelineRecord>>;
}

/// Cursor over the ids of matches selected by a filter.
#[async_trait]
pub trait MatchIdSource: Send + Sync {
    /// Opens a cursor sorted by descending creation time.
    ///
    /// Failing to open the cursor, and any error yielded by the stream, is
    /// reported as [`Error::Cursor`].
    async fn open_cursor(
        &self,
        filter: &ExportFilter,
        allow_list: &QueueAllowList,
    ) -> Result<MatchIdStream>;
}

fn extract_match_id(document: &Document) -> Option<String> {
    document
        .get_document("metadata")
        .ok()?
        .get_str("matchId")
        .ok()
        .map(str::to_string)
}

impl MongoClient {
    async fn find_by_match_id(
        &self,
        collection: mongodb::Collection<Document>,
        match_id: &str,
    ) -> Result<Option<Document>> {
        let start = Instant::now();
        let result = collection
            .find_one(doc! { MATCH_ID_FIELD: match_id })
            .projection(doc! { "_id": 0 })
            .await;
        metrics()
            .document_fetch_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match result {
            Ok(found) => {
                metrics().documents_fetched.inc();
                Ok(found)
            }
            Err(e) => {
                metrics().document_fetch_errors.inc();
                Err(Error::source(format!("lookup of {} failed: {}", match_id, e)))
            }
        }
    }
}

#[async_trait]
impl MatchStore for MongoClient {
    async fn fetch_match(&self, match_id: &str) -> Result<Option<MatchRecord>> {
        match self.find_by_match_id(self.matches(), match_id).await? {
            Some(document) => MatchRecord::from_document(to_json(document)).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TimelineStore for MongoClient {
    async fn fetch_timeline(&self, match_id: &str) -> Result<Option<TimelineRecord>> {
        let found = self.find_by_match_id(self.timelines(), match_id).await?;
        Ok(found.map(|document| {
            TimelineRecord::from_document(match_id, to_json(document), Provenance::LocalStore)
        }))
    }
}

#[async_trait]
impl MatchIdSource for MongoClient {
    async fn open_cursor(
        &self,
        filter: &ExportFilter,
        allow_list: &QueueAllowList,
    ) -> Result<MatchIdStream> {
        let config = self.config();
        let query = build_match_query(filter, allow_list, &config.updated_at_field);
        debug!(query = %query, "Opening match id cursor");

        let cursor = self
            .matches()
            .find(query)
            .sort(match_sort())
            .projection(id_projection())
            .batch_size(config.cursor_batch_size)
            .no_cursor_timeout(true)
            .await
            .map_err(|e| Error::cursor(format!("failed to open cursor: {}", e)))?;

        let ids = cursor.filter_map(|item| async move {
            match item {
                Ok(document) => {
                    let id = extract_match_id(&document);
                    if id.is_none() {
                        warn!(document = %document, "Cursor document without match id");
                    }
                    id.map(Ok)
                }
                Err(e) => Some(Err(Error::cursor(e.to_string()))),
            }
        });

        Ok(ids.boxed())
    }
}
