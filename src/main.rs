//! Match Lake Exporter
//!
//! Batch export of match and timeline records into the data lake:
//! - Streams match ids from MongoDB in fixed-size batches
//! - Writes normalized, partitioned match objects to S3
//! - Resolves timelines locally or from the rate-limited upstream API

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use tracing::{error, info, warn};

use lake_core::ExportFilter;
use mongo_source::MongoClient;
use riot_api::{HttpTimelineApi, RetryPolicy, RetryingClient};
use s3_sink::{DryRunStore, ObjectStore, RecordWriter, S3ObjectStore};
use telemetry::{health, init_tracing_from_env, metrics};
use worker::{BatchDriver, Sources};

use crate::config::{load_config, Config};

/// Export matches and timelines into partitioned lake objects.
#[derive(Debug, Parser)]
#[command(name = "match-exporter", version, about)]
struct Cli {
    /// Config file (TOML, extension optional)
    #[arg(long, env = "EXPORTER_CONFIG", default_value = "config/default")]
    config: String,

    /// Season (calendar year of match creation)
    #[arg(long)]
    season: Option<i32>,

    /// Patch bucket, e.g. 14.3
    #[arg(long)]
    patch: Option<String>,

    /// Comma-separated queue ids; defaults to the allow-list
    #[arg(long, value_delimiter = ',')]
    queues: Vec<i32>,

    /// Only matches updated since (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_since)]
    since: Option<DateTime<Utc>>,

    /// Stop after this many match ids
    #[arg(long)]
    limit: Option<usize>,

    /// Log what would be written instead of uploading
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn filter(&self) -> ExportFilter {
        ExportFilter {
            season: self.season,
            patch: self.patch.clone(),
            queue_ids: (!self.queues.is_empty()).then(|| self.queues.clone()),
            updated_since: self.since,
        }
    }
}

fn parse_since(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid date '{}': expected RFC 3339 or YYYY-MM-DD", value))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let cli = Cli::parse();
    info!("Starting Match Lake Exporter v{}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Export failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    config.validate(cli.dry_run)?;

    info!(
        database = %config.mongo.database,
        bucket = %config.s3.bucket,
        region = %config.s3.region,
        upstream_region = %config.riot.region,
        compression = ?config.s3.compression,
        dry_run = cli.dry_run,
        "Loaded configuration"
    );

    let mongo = Arc::new(
        MongoClient::connect(config.mongo.clone())
            .await
            .context("Failed to create document store client")?,
    );
    let upstream_api =
        Arc::new(HttpTimelineApi::new(&config.riot).context("Failed to create upstream client")?);
    let s3 = if cli.dry_run {
        None
    } else {
        Some(
            S3ObjectStore::new(&config.s3)
                .await
                .context("Failed to create object store client")?,
        )
    };

    check_health(&mongo, s3.as_ref(), &upstream_api).await;

    let store: Arc<dyn ObjectStore> = match s3 {
        Some(s3) => Arc::new(s3),
        None => {
            warn!("Dry run: no objects will be written");
            Arc::new(DryRunStore)
        }
    };
    let writer = RecordWriter::new(store, config.s3.compression);
    let upstream = RetryingClient::new(
        upstream_api,
        RetryPolicy::from_config(&config.riot),
        config.riot.gate_size,
    );

    let driver = build_driver(&config, &cli, mongo, upstream, writer);
    let summary = driver
        .run(&cli.filter())
        .await
        .context("Export aborted")?;

    summary.log();
    let snapshot = metrics().snapshot();
    info!(
        objects_written = snapshot.objects_written,
        bytes_written = snapshot.object_bytes_written,
        upstream_requests = snapshot.upstream_requests,
        upstream_retries = snapshot.upstream_retries,
        upstream_latency_mean_ms = format!("{:.1}", snapshot.upstream_latency_mean_ms),
        "Export metrics"
    );
    Ok(())
}

fn build_driver(
    config: &Config,
    cli: &Cli,
    mongo: Arc<MongoClient>,
    upstream: RetryingClient,
    writer: RecordWriter,
) -> BatchDriver {
    let sources = Sources {
        ids: mongo.clone(),
        matches: mongo.clone(),
        timelines: mongo,
    };

    BatchDriver::new(
        config.export.driver_config(cli.limit),
        sources,
        upstream,
        writer,
        config.export.allow_list(),
    )
}

/// Check component health on startup. Failures are logged, not fatal.
async fn check_health(
    mongo: &MongoClient,
    s3: Option<&S3ObjectStore>,
    upstream: &HttpTimelineApi,
) {
    match mongo_source::health::check_connection(mongo).await {
        Ok(()) => {
            health().document_store.set_healthy();
            info!("Document store connection: healthy");
        }
        Err(e) => {
            health().document_store.set_unhealthy(e);
            error!("Document store connection: unhealthy");
        }
    }

    if let Some(s3) = s3 {
        match s3_sink::health::check_connection(s3).await {
            Ok(()) => {
                health().object_store.set_healthy();
                info!("Object store connection: healthy");
            }
            Err(e) => {
                health().object_store.set_unhealthy(e);
                error!("Object store connection: unhealthy");
            }
        }
    }

    match riot_api::health::check_connection(upstream).await {
        Ok(()) => {
            health().upstream_api.set_healthy();
            info!("Upstream API connection: healthy");
        }
        Err(e) => {
            health().upstream_api.set_unhealthy(e);
            error!("Upstream API connection: unhealthy");
        }
    }

    let report = health().report();
    info!(status = ?report.status, "Startup health check complete");
}
