//! Exporter configuration.
//!
//! Layered as: struct defaults, then the optional config file, then
//! `EXPORTER__SECTION__KEY` environment variables, then the conventional flat
//! variables (`MONGODB_URI`, `S3_BUCKET`, ...).

use std::time::Duration;

use anyhow::{Context, Result};
use lake_core::limits::{
    DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_MATCH_CONCURRENCY,
    DEFAULT_PROGRESS_INTERVAL_SECS, DEFAULT_TIMELINE_CONCURRENCY,
    DEFAULT_TIMELINE_HIGH_WATERMARK, MAX_ERROR_SAMPLES,
};
use lake_core::{QueueAllowList, DEFAULT_ALLOWED_QUEUES};
use mongo_source::MongoConfig;
use riot_api::RiotConfig;
use s3_sink::S3Config;
use serde::{Deserialize, Serialize};
use worker::{BatchConfig, DriverConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mongo: MongoConfig,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub riot: RiotConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// Batching and concurrency of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_match_concurrency")]
    pub match_concurrency: usize,
    #[serde(default = "default_timeline_concurrency")]
    pub timeline_concurrency: usize,
    /// 0 disables the pause
    #[serde(default = "default_timeline_high_watermark")]
    pub timeline_high_watermark: usize,
    #[serde(default = "default_progress_interval_secs")]
    pub progress_interval_secs: u64,
    #[serde(default = "default_allowed_queues")]
    pub allowed_queues: Vec<i32>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}

fn default_match_concurrency() -> usize {
    DEFAULT_MATCH_CONCURRENCY
}

fn default_timeline_concurrency() -> usize {
    DEFAULT_TIMELINE_CONCURRENCY
}

fn default_timeline_high_watermark() -> usize {
    DEFAULT_TIMELINE_HIGH_WATERMARK
}

fn default_progress_interval_secs() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_SECS
}

fn default_allowed_queues() -> Vec<i32> {
    DEFAULT_ALLOWED_QUEUES.to_vec()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            match_concurrency: default_match_concurrency(),
            timeline_concurrency: default_timeline_concurrency(),
            timeline_high_watermark: default_timeline_high_watermark(),
            progress_interval_secs: default_progress_interval_secs(),
            allowed_queues: default_allowed_queues(),
        }
    }
}

impl ExportConfig {
    pub fn driver_config(&self, limit: Option<usize>) -> DriverConfig {
        DriverConfig {
            batch: BatchConfig {
                max_size: self.batch_size,
                max_age: Duration::from_millis(self.flush_interval_ms),
            },
            match_concurrency: self.match_concurrency,
            timeline_concurrency: self.timeline_concurrency,
            timeline_high_watermark: self.timeline_high_watermark,
            limit,
            progress_interval: Duration::from_secs(self.progress_interval_secs.max(1)),
            error_sample_size: MAX_ERROR_SAMPLES,
        }
    }

    pub fn allow_list(&self) -> QueueAllowList {
        QueueAllowList::new(self.allowed_queues.iter().copied())
    }
}

impl Config {
    /// Reports every missing required value at once.
    ///
    /// The bucket is not needed for a dry run.
    pub fn validate(&self, dry_run: bool) -> lake_core::Result<()> {
        let mut missing = Vec::new();
        if self.mongo.uri.is_empty() {
            missing.push("MONGODB_URI");
        }
        if self.s3.bucket.is_empty() && !dry_run {
            missing.push("S3_BUCKET");
        }
        if self.riot.api_key.is_empty() {
            missing.push("RIOT_API_KEY");
        }
        if self.export.allowed_queues.is_empty() {
            missing.push("export.allowed_queues");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(lake_core::Error::config(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Load configuration from files and environment.
pub fn load_config(path: &str) -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name(path)
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("EXPORTER")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Conventional flat variables win over everything else.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(uri) = var("MONGODB_URI") {
        config.mongo.uri = uri;
    }
    if let Some(database) = var("MONGODB_DATABASE") {
        config.mongo.database = database;
    }
    if let Some(bucket) = var("S3_BUCKET") {
        config.s3.bucket = bucket;
    }
    if let Some(endpoint) = var("S3_ENDPOINT_URL") {
        config.s3.endpoint_url = Some(endpoint);
        // S3-compatible stores generally need path-style addressing.
        config.s3.force_path_style = true;
    }
    if let Some(region) = var("AWS_REGION") {
        config.s3.region = region;
    }
    if let Some(key) = var("RIOT_API_KEY") {
        config.riot.api_key = key;
    }
    if let Some(region) = var("RIOT_REGION") {
        config.riot.region = region;
    }
}
