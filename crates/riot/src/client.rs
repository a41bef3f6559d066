//! HTTP client for the match-v5 timeline endpoint.

use async_trait::async_trait;
use lake_core::{Error, Provenance, Result, TimelineRecord};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::RiotConfig;
use crate::error::ApiError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Riot-Token";

/// The one upstream operation the exporter needs.
#[async_trait]
pub trait TimelineApi: Send + Sync {
    /// Fetches the timeline of a single match.
    ///
    /// Implementations report every non-2xx status as `ApiError::Status` and
    /// leave retry decisions to the caller.
    async fn get_timeline(&self, match_id: &str) -> std::result::Result<TimelineRecord, ApiError>;
}

/// `reqwest`-backed timeline client.
#[derive(Clone)]
pub struct HttpTimelineApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpTimelineApi {
    pub fn new(config: &RiotConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(Error::config("upstream API key is not set"));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("match-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        let base_url = config.base_url();
        info!(base_url = %base_url, "Created upstream API client");

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn timeline_url(&self, match_id: &str) -> String {
        format!("{}/lol/match/v5/matches/{}/timeline", self.base_url, match_id)
    }

    /// Sends one authenticated request to the API root.
    ///
    /// Any status other than 401/403 proves the host is reachable and the key
    /// is accepted.
    pub async fn probe(&self) -> std::result::Result<(), ApiError> {
        let response = self
            .http
            .get(format!("{}/lol/status/v4/platform-data", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            status @ (401 | 403) => Err(ApiError::Status(status)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl TimelineApi for HttpTimelineApi {
    async fn get_timeline(&self, match_id: &str) -> std::result::Result<TimelineRecord, ApiError> {
        let response = self
            .http
            .get(self.timeline_url(match_id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(match_id = %match_id, status = status.as_u16(), "Upstream returned error status");
            return Err(ApiError::Status(status.as_u16()));
        }

        // A body cut short is a transport failure; only a complete body that
        // fails to parse is a decode error.
        let bytes = response.bytes().await.map_err(ApiError::from_body)?;
        let body: Value =
            serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(TimelineRecord::from_document(
            match_id,
            body,
            Provenance::UpstreamApi,
        ))
    }
}
