//! MongoDB client wrapper.

use crate::config::MongoConfig;
use lake_core::{Error, Result};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::info;

/// Shared handle to the match and timeline collections.
#[derive(Clone)]
pub struct MongoClient {
    inner: Client,
    config: MongoConfig,
}

impl MongoClient {
    /// Connects to the configured deployment.
    ///
    /// The driver connects lazily; this only validates the connection string.
    pub async fn connect(config: MongoConfig) -> Result<Self> {
        if config.uri.is_empty() {
            return Err(Error::config("document store URI is not set"));
        }

        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| Error::config(format!("invalid document store URI: {}", e)))?;
        options.app_name = Some(config.app_name.clone());

        let inner = Client::with_options(options)
            .map_err(|e| Error::config(format!("failed to create document store client: {}", e)))?;

        info!(
            database = %config.database,
            matches = %config.matches_collection,
            timelines = %config.timelines_collection,
            "Created document store client"
        );

        Ok(Self { inner, config })
    }

    pub fn matches(&self) -> Collection<Document> {
        self.inner
            .database(&self.config.database)
            .collection(&self.config.matches_collection)
    }

    pub fn timelines(&self) -> Collection<Document> {
        self.inner
            .database(&self.config.database)
            .collection(&self.config.timelines_collection)
    }

    /// Round-trips a `ping` command.
    pub async fn ping(&self) -> Result<()> {
        self.inner
            .database(&self.config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| Error::source(e.to_string()))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MongoConfig {
        &self.config
    }
}

/// Converts a BSON document into relaxed extended JSON.
pub fn to_json(document: Document) -> serde_json::Value {
    Bson::Document(document).into_relaxed_extjson()
}
