//! Match and timeline records, and their normalized export form.
//!
//! Source documents follow the match-v5 shape:
//! `{ "metadata": { "matchId": .. }, "info": { .. } }`. Only the fields needed
//! for partitioning are read; the rest of `info` is carried through as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::partition::{patch_bucket, season_from_millis, Partition};

/// Version of the exported record layout.
pub const SCHEMA_VERSION: u32 = 1;

fn json_i64(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

fn document_match_id(doc: &Value) -> Option<&str> {
    doc.get("metadata")
        .and_then(|m| m.get("matchId"))
        .or_else(|| doc.get("matchId"))
        .and_then(Value::as_str)
}

/// A raw match document.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub match_id: String,
    /// Game creation time in epoch millis.
    pub created_at_ms: Option<i64>,
    pub game_version: Option<String>,
    pub queue_id: Option<i32>,
    /// Full game-info payload, opaque to the exporter.
    pub info: Value,
}

impl MatchRecord {
    /// Reads a match-v5 document.
    pub fn from_document(mut doc: Value) -> Result<Self> {
        let match_id = document_match_id(&doc)
            .ok_or_else(|| Error::malformed("<unknown>", "missing metadata.matchId"))?
            .to_string();

        let info = match doc.get_mut("info") {
            Some(info) if info.is_object() => info.take(),
            _ => return Err(Error::malformed(match_id, "missing info object")),
        };

        let created_at_ms = json_i64(info.get("gameCreation"));
        let game_version = info
            .get("gameVersion")
            .and_then(Value::as_str)
            .map(str::to_string);
        let queue_id = json_i64(info.get("queueId")).and_then(|q| i32::try_from(q).ok());

        Ok(Self {
            match_id,
            created_at_ms,
            game_version,
            queue_id,
            info,
        })
    }

    /// Derives the partition dimensions of this match.
    pub fn partition(&self) -> Partition {
        Partition::new(
            self.created_at_ms.and_then(season_from_millis),
            self.game_version.as_deref().and_then(patch_bucket),
            self.queue_id,
        )
    }
}

/// Where a timeline was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "local-store")]
    LocalStore,
    #[serde(rename = "upstream-api")]
    UpstreamApi,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalStore => "local-store",
            Self::UpstreamApi => "upstream-api",
        }
    }
}

/// Per-minute frames of one match.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRecord {
    pub match_id: String,
    pub frames: Vec<Value>,
    pub provenance: Provenance,
}

impl TimelineRecord {
    /// Reads a match-v5 timeline document.
    ///
    /// A document without `info.frames` yields an empty frame sequence; the
    /// caller treats that as "not available".
    pub fn from_document(match_id: &str, mut doc: Value, provenance: Provenance) -> Self {
        let frames = match doc.get_mut("info").and_then(|i| i.get_mut("frames")) {
            Some(Value::Array(frames)) => std::mem::take(frames),
            _ => Vec::new(),
        };

        Self {
            match_id: document_match_id(&doc).unwrap_or(match_id).to_string(),
            frames,
            provenance,
        }
    }

    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }
}

/// Handoff from the match stage to the timeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTask {
    pub match_id: String,
    pub partition: Partition,
}

impl ExportTask {
    pub fn new(match_id: impl Into<String>, partition: Partition) -> Self {
        Self {
            match_id: match_id.into(),
            partition,
        }
    }
}

/// Exported match record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchExport<'a> {
    pub match_id: &'a str,
    pub season: i32,
    pub patch: &'a str,
    pub queue_id: i32,
    pub schema_version: u32,
    pub exported_at: DateTime<Utc>,
    pub info: &'a Value,
}

impl<'a> MatchExport<'a> {
    pub fn new(record: &'a MatchRecord, partition: &'a Partition, exported_at: DateTime<Utc>) -> Self {
        Self {
            match_id: &record.match_id,
            season: partition.season_or_default(),
            patch: partition.patch_or_default(),
            queue_id: partition.queue_or_default(),
            schema_version: SCHEMA_VERSION,
            exported_at,
            info: &record.info,
        }
    }
}

/// Exported timeline record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineExport<'a> {
    pub match_id: &'a str,
    pub season: i32,
    pub patch: &'a str,
    pub queue_id: i32,
    pub schema_version: u32,
    pub exported_at: DateTime<Utc>,
    pub provenance: Provenance,
    pub frames: &'a [Value],
}

impl<'a> TimelineExport<'a> {
    pub fn new(
        timeline: &'a TimelineRecord,
        task: &'a ExportTask,
        exported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            match_id: &task.match_id,
            season: task.partition.season_or_default(),
            patch: task.partition.patch_or_default(),
            queue_id: task.partition.queue_or_default(),
            schema_version: SCHEMA_VERSION,
            exported_at,
            provenance: timeline.provenance,
            frames: &timeline.frames,
        }
    }
}

/// Serializes one record as a newline-terminated JSON line.
pub fn to_ndjson<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}
