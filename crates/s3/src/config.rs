//! Object store configuration.

use serde::{Deserialize, Serialize};

use crate::compression::Codec;

/// S3 writer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Destination bucket (required)
    #[serde(default)]
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Path-style addressing, required by most S3-compatible stores
    #[serde(default)]
    pub force_path_style: bool,
    /// Compression applied to every object
    #[serde(default)]
    pub compression: Codec,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            compression: Codec::default(),
        }
    }
}
