//! Payload compression for exported objects.

use serde::{Deserialize, Serialize};

/// Zstd level for lake objects. Favours throughput over ratio.
const ZSTD_LEVEL: i32 = 3;

/// Compression codec applied before upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    None,
    #[default]
    Zstd,
}

impl Codec {
    /// File extension for an NDJSON object in this codec.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => ".jsonl",
            Self::Zstd => ".jsonl.zst",
        }
    }

    /// `Content-Encoding` header value, if any.
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Zstd => Some("zstd"),
        }
    }

    pub fn compress(&self, data: Vec<u8>) -> std::io::Result<Vec<u8>> {
        match self {
            Self::None => Ok(data),
            Self::Zstd => zstd::bulk::compress(&data, ZSTD_LEVEL),
        }
    }

    pub fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Zstd => zstd::decode_all(data),
        }
    }
}

impl std::str::FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "zstd" | "zst" => Ok(Self::Zstd),
            other => Err(format!("unsupported compression codec: {}", other)),
        }
    }
}
