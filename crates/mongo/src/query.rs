//! Translation of an export filter into a MongoDB query.

use lake_core::{patch_bucket, season_bounds_ms, ExportFilter, QueueAllowList};
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};

pub const MATCH_ID_FIELD: &str = "metadata.matchId";
pub const CREATION_FIELD: &str = "info.gameCreation";
pub const VERSION_FIELD: &str = "info.gameVersion";
pub const QUEUE_FIELD: &str = "info.queueId";

/// Escapes regex metacharacters in a literal.
fn regex_escape(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len() + 4);
    for c in literal.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Version regex selecting every game version that lands in `patch`'s bucket.
///
/// Numeric patches tolerate leading zeros and a bare `major.minor`, the same
/// normalization the partition bucket applies. "14.3" matches "14.3.558.1",
/// "14.03.1" and "14.3" but not "14.30.1".
fn patch_pattern(patch: &str) -> String {
    match patch_bucket(patch).as_deref().and_then(|b| b.split_once('.')) {
        Some((major, minor)) => format!("^0*{}\\.0*{}(\\.|$)", major, minor),
        None => format!("^{}(\\.|$)", regex_escape(patch.trim())),
    }
}

/// Builds the store-side query for a run.
///
/// This is a pre-filter only. The queue allow-list is enforced again on every
/// fetched document.
pub fn build_match_query(
    filter: &ExportFilter,
    allow_list: &QueueAllowList,
    updated_at_field: &str,
) -> Document {
    let mut query = doc! {
        QUEUE_FIELD: { "$in": filter.effective_queues(allow_list) },
    };

    if let Some(season) = filter.season {
        match season_bounds_ms(season) {
            Some((start, end)) => {
                query.insert(CREATION_FIELD, doc! { "$gte": start, "$lt": end });
            }
            // No representable calendar year: nothing can match.
            None => {
                query.insert(CREATION_FIELD, doc! { "$in": [] });
            }
        }
    }

    if let Some(patch) = filter.patch.as_deref().filter(|p| !p.trim().is_empty()) {
        query.insert(VERSION_FIELD, doc! { "$regex": patch_pattern(patch) });
    }

    if let Some(since) = filter.updated_since {
        query.insert(
            updated_at_field,
            doc! { "$gte": BsonDateTime::from_millis(since.timestamp_millis()) },
        );
    }

    query
}

/// Newest matches first.
pub fn match_sort() -> Document {
    doc! { CREATION_FIELD: -1 }
}

/// Only the match id is read from the cursor.
pub fn id_projection() -> Document {
    doc! { MATCH_ID_FIELD: 1, "_id": 0 }
}
