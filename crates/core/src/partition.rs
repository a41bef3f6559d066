//! Deterministic object-store paths for exported records.
//!
//! Keys are Hive-style so downstream engines can prune by season, patch and
//! queue without listing every object:
//!
//! `{prefix}/season={season}/patch={patch}/queue={queue}/matchId={id}`

use chrono::{Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Patch bucket used when the game version cannot be parsed.
pub const UNKNOWN_PATCH: &str = "unknown";

/// Dataset prefix for match objects.
pub const MATCHES_PREFIX: &str = "bronze/matches";

/// Dataset prefix for timeline objects.
pub const TIMELINES_PREFIX: &str = "bronze/timelines";

/// Derives the season from a creation timestamp in epoch millis.
///
/// The season is the UTC calendar year of the match. Out-of-range or
/// non-positive timestamps yield `None`.
pub fn season_from_millis(created_at_ms: i64) -> Option<i32> {
    if created_at_ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(created_at_ms)
        .single()
        .map(|ts| ts.year())
}

/// Epoch-millis range `[start, end)` covered by a season.
pub fn season_bounds_ms(season: i32) -> Option<(i64, i64)> {
    let start = Utc.with_ymd_and_hms(season, 1, 1, 0, 0, 0).single()?;
    let end = Utc.with_ymd_and_hms(season.checked_add(1)?, 1, 1, 0, 0, 0).single()?;
    Some((start.timestamp_millis(), end.timestamp_millis()))
}

/// Coarsens a game version string to `major.minor`.
///
/// `"14.3.558.1234"` becomes `"14.3"`. Returns `None` when the first two
/// components are not both numeric.
pub fn patch_bucket(game_version: &str) -> Option<String> {
    let mut parts = game_version.trim().split('.');
    let major = parts.next()?;
    let minor = parts.next()?;

    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !numeric(major) || !numeric(minor) {
        return None;
    }

    // Strip leading zeros so "14.03" and "14.3" share a bucket.
    let major: u32 = major.parse().ok()?;
    let minor: u32 = minor.parse().ok()?;
    Some(format!("{}.{}", major, minor))
}

/// The partition dimensions of one exported match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub season: Option<i32>,
    pub patch: Option<String>,
    pub queue_id: Option<i32>,
}

impl Partition {
    pub fn new(season: Option<i32>, patch: Option<String>, queue_id: Option<i32>) -> Self {
        Self {
            season,
            patch,
            queue_id,
        }
    }

    /// Season as written into paths and records.
    pub fn season_or_default(&self) -> i32 {
        self.season.unwrap_or(0)
    }

    /// Queue id as written into paths and records.
    pub fn queue_or_default(&self) -> i32 {
        self.queue_id.unwrap_or(0)
    }

    pub fn patch_or_default(&self) -> &str {
        self.patch.as_deref().unwrap_or(UNKNOWN_PATCH)
    }
}

/// A fully resolved partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Builds the key for one match under a dataset prefix.
    ///
    /// Pure: the same inputs always produce the same key.
    pub fn build(prefix: &str, partition: &Partition, match_id: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self(format!(
            "{}/season={}/patch={}/queue={}/matchId={}",
            prefix,
            partition.season_or_default(),
            partition.patch_or_default(),
            partition.queue_or_default(),
            match_id
        ))
    }

    /// The object key with a file extension appended.
    pub fn object_key(&self, extension: &str) -> String {
        format!("{}{}", self.0, extension)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
