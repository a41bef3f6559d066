//! Common test setup functions.

use lake_core::QueueAllowList;
use riot_api::{RetryPolicy, RetryingClient};
use s3_sink::{Codec, RecordWriter};
use std::sync::Arc;
use std::time::Duration;
use worker::{BatchConfig, BatchDriver, DriverConfig, Sources};

use crate::mocks::{MockDocumentStore, MockObjectStore, MockTimelineApi, RecordingSleeper};

/// Test context wiring the real driver to in-memory collaborators.
///
/// - `MockDocumentStore` stands in for the match/timeline collections
/// - `MockObjectStore` captures every object written
/// - `MockTimelineApi` answers upstream calls from scripts
/// - `RecordingSleeper` makes backoff instantaneous
pub struct TestContext {
    pub store: Arc<MockDocumentStore>,
    pub objects: Arc<MockObjectStore>,
    pub api: Arc<MockTimelineApi>,
    pub sleeper: Arc<RecordingSleeper>,
    pub config: DriverConfig,
    pub policy: RetryPolicy,
    pub allow_list: QueueAllowList,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MockDocumentStore::new()),
            objects: Arc::new(MockObjectStore::new()),
            api: Arc::new(MockTimelineApi::new()),
            sleeper: Arc::new(RecordingSleeper::new()),
            config: DriverConfig {
                batch: BatchConfig {
                    max_size: 2,
                    max_age: Duration::from_secs(5),
                },
                match_concurrency: 4,
                timeline_concurrency: 2,
                progress_interval: Duration::from_secs(3600),
                ..Default::default()
            },
            policy: RetryPolicy::new(Duration::from_millis(100), Duration::from_secs(1), 5),
            allow_list: QueueAllowList::default(),
        }
    }

    /// Upstream client backed by the mock API and recording sleeper.
    pub fn upstream(&self, gate_size: usize) -> RetryingClient {
        RetryingClient::new(self.api.clone(), self.policy, gate_size)
            .with_sleeper(self.sleeper.clone())
    }

    /// Build a driver over the current mocks and config.
    pub fn driver(&self) -> BatchDriver {
        let sources = Sources {
            ids: self.store.clone(),
            matches: self.store.clone(),
            timelines: self.store.clone(),
        };
        let writer = RecordWriter::new(self.objects.clone(), Codec::Zstd);

        BatchDriver::new(
            self.config.clone(),
            sources,
            self.upstream(4),
            writer,
            self.allow_list.clone(),
        )
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `condition` until it holds, panicking after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached within 5s");
}
