//! MongoDB configuration.

use serde::{Deserialize, Serialize};

/// Document store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string (required)
    #[serde(default)]
    pub uri: String,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Collection holding match documents
    #[serde(default = "default_matches_collection")]
    pub matches_collection: String,
    /// Collection holding locally stored timelines
    #[serde(default = "default_timelines_collection")]
    pub timelines_collection: String,
    /// Field compared against `--since`
    #[serde(default = "default_updated_at_field")]
    pub updated_at_field: String,
    /// Documents per cursor round trip
    #[serde(default = "default_cursor_batch_size")]
    pub cursor_batch_size: u32,
    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

fn default_database() -> String {
    "lol".to_string()
}

fn default_matches_collection() -> String {
    "matches".to_string()
}

fn default_timelines_collection() -> String {
    "timelines".to_string()
}

fn default_updated_at_field() -> String {
    "updatedAt".to_string()
}

fn default_cursor_batch_size() -> u32 {
    1000
}

fn default_app_name() -> String {
    "match-exporter".to_string()
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: default_database(),
            matches_collection: default_matches_collection(),
            timelines_collection: default_timelines_collection(),
            updated_at_field: default_updated_at_field(),
            cursor_batch_size: default_cursor_batch_size(),
            app_name: default_app_name(),
        }
    }
}
