//! Upstream API configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upstream timeline API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiotConfig {
    /// API key sent as `X-Riot-Token` (required)
    #[serde(default)]
    pub api_key: String,
    /// Regional routing value (americas, europe, asia, sea)
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the regional host, mainly for tests and proxies
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Max simultaneous upstream calls across the whole process
    #[serde(default = "default_gate_size")]
    pub gate_size: usize,
    /// Total attempts per fetch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_region() -> String {
    "europe".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_gate_size() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RiotConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            region: default_region(),
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            gate_size: default_gate_size(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RiotConfig {
    /// Host all requests are sent to, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.api.riotgames.com", self.region),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
