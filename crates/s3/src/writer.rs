//! Object store writers.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use lake_core::{Error, PartitionKey, Result};
use telemetry::metrics;
use tracing::{debug, info};

use crate::compression::Codec;
use crate::config::S3Config;

/// Content type of every exported object.
pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// A key-addressed object store.
///
/// A put to an existing key overwrites it, which is what makes re-running an
/// export over the same range idempotent.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_encoding: Option<&str>) -> Result<()>;
}

/// S3 (or S3-compatible) object store.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Builds a client from the default AWS credential chain.
    pub async fn new(config: &S3Config) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(Error::config("object store bucket is not set"));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();

        info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
            "Created object store client"
        );

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    /// Checks that the bucket exists and is reachable.
    pub async fn head_bucket(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| Error::object_store(&self.bucket, DisplayErrorContext(&e).to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_encoding: Option<&str>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(CONTENT_TYPE)
            .set_content_encoding(content_encoding.map(str::to_string))
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| Error::object_store(key, DisplayErrorContext(&e).to_string()))
    }
}

/// Logs what would be written instead of uploading.
#[derive(Debug, Default, Clone)]
pub struct DryRunStore;

#[async_trait]
impl ObjectStore for DryRunStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_encoding: Option<&str>) -> Result<()> {
        info!(
            key = %key,
            bytes = body.len(),
            encoding = content_encoding.unwrap_or("identity"),
            "Dry run: skipping upload"
        );
        Ok(())
    }
}

/// Compresses NDJSON payloads and writes them under partition keys.
#[derive(Clone)]
pub struct RecordWriter {
    store: Arc<dyn ObjectStore>,
    codec: Codec,
}

impl RecordWriter {
    pub fn new(store: Arc<dyn ObjectStore>, codec: Codec) -> Self {
        Self { store, codec }
    }

    /// Compresses `payload` and performs a single put.
    ///
    /// Returns the object key written. Failures are returned to the caller
    /// unchanged; there is no retry at this level.
    pub async fn write(&self, key: &PartitionKey, payload: Vec<u8>) -> Result<String> {
        let object_key = key.object_key(self.codec.extension());
        let raw_len = payload.len();
        let body = self.codec.compress(payload)?;
        let body_len = body.len() as u64;

        let start = Instant::now();
        let result = self
            .store
            .put(&object_key, body, self.codec.content_encoding())
            .await;
        metrics()
            .object_put_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match result {
            Ok(()) => {
                metrics().objects_written.inc();
                metrics().object_bytes_written.inc_by(body_len);
                debug!(
                    key = %object_key,
                    raw_bytes = raw_len,
                    stored_bytes = body_len,
                    "Wrote object"
                );
                Ok(object_key)
            }
            Err(e) => {
                metrics().object_write_errors.inc();
                Err(e)
            }
        }
    }
}
