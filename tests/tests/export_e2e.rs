//! End-to-end export runs against in-memory collaborators.

use chrono::DateTime;
use integration_tests::{fixtures, setup::TestContext};
use lake_core::ExportFilter;
use riot_api::ApiError;
use std::time::Duration;

/// Three allowed matches, no local timelines; upstream has A and C, not B.
#[tokio::test]
async fn test_upstream_timelines_written_only_when_found() {
    let ctx = TestContext::new();
    for id in ["EUW1_A", "EUW1_B", "EUW1_C"] {
        ctx.store.insert_match(id, fixtures::ranked_match(id));
    }
    ctx.api.respond("EUW1_A", Ok(fixtures::timeline_doc("EUW1_A", 30)));
    ctx.api.respond("EUW1_C", Ok(fixtures::timeline_doc("EUW1_C", 25)));

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.progress.matches_exported, 3);
    assert_eq!(summary.progress.timelines_upstream, 2);
    assert_eq!(summary.progress.timelines_skipped, 1);
    assert_eq!(summary.progress.failed(), 0);
    assert!(summary.error_sample.is_empty());

    assert_eq!(
        ctx.objects.keys_with_prefix("bronze/matches/"),
        vec![
            fixtures::match_key("EUW1_A"),
            fixtures::match_key("EUW1_B"),
            fixtures::match_key("EUW1_C"),
        ]
    );
    assert_eq!(
        ctx.objects.keys_with_prefix("bronze/timelines/"),
        vec![
            fixtures::timeline_key("EUW1_A"),
            fixtures::timeline_key("EUW1_C"),
        ]
    );
    assert_eq!(ctx.api.calls("EUW1_B"), 1);
}

#[tokio::test]
async fn test_exported_records_carry_partition_fields() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.api.respond("EUW1_A", Ok(fixtures::timeline_doc("EUW1_A", 3)));

    ctx.driver().run(&ExportFilter::default()).await.unwrap();

    let record = ctx.objects.record(&fixtures::match_key("EUW1_A")).unwrap();
    assert_eq!(record["matchId"], "EUW1_A");
    assert_eq!(record["season"], 2024);
    assert_eq!(record["patch"], "14.3");
    assert_eq!(record["queueId"], 420);
    assert_eq!(record["schemaVersion"], 1);
    assert_eq!(record["info"]["participants"][0]["championName"], "Ahri");
    let exported_at = record["exportedAt"].as_str().unwrap();
    assert!(DateTime::parse_from_rfc3339(exported_at).is_ok());

    let timeline = ctx.objects.record(&fixtures::timeline_key("EUW1_A")).unwrap();
    assert_eq!(timeline["provenance"], "upstream-api");
    assert_eq!(timeline["frames"].as_array().unwrap().len(), 3);
    assert_eq!(timeline["season"], 2024);
}

#[tokio::test]
async fn test_local_timeline_is_preferred() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.store.insert_timeline("EUW1_A", fixtures::timeline_doc("EUW1_A", 12));

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.progress.timelines_local, 1);
    assert_eq!(ctx.api.total_calls(), 0);
    let timeline = ctx.objects.record(&fixtures::timeline_key("EUW1_A")).unwrap();
    assert_eq!(timeline["provenance"], "local-store");
}

#[tokio::test]
async fn test_empty_local_timeline_falls_back_to_upstream() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.store.insert_timeline("EUW1_A", fixtures::timeline_doc("EUW1_A", 0));
    ctx.api.respond("EUW1_A", Ok(fixtures::timeline_doc("EUW1_A", 4)));

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.progress.timelines_local, 0);
    assert_eq!(summary.progress.timelines_upstream, 1);
    assert_eq!(ctx.api.calls("EUW1_A"), 1);
}

#[tokio::test]
async fn test_local_lookup_error_falls_back_to_upstream() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.store.fail_timeline_lookup("EUW1_A");
    ctx.api.respond("EUW1_A", Ok(fixtures::timeline_doc("EUW1_A", 4)));

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.progress.timelines_upstream, 1);
    assert_eq!(summary.progress.timelines_failed, 0);
}

#[tokio::test]
async fn test_upstream_without_frames_is_skipped() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.api.respond("EUW1_A", Ok(fixtures::timeline_doc("EUW1_A", 0)));

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.progress.timelines_skipped, 1);
    assert!(ctx.objects.keys_with_prefix("bronze/timelines/").is_empty());
}

#[tokio::test]
async fn test_retryable_upstream_errors_then_success() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.api.respond("EUW1_A", Err(ApiError::Status(503)));
    ctx.api.respond("EUW1_A", Err(ApiError::Timeout));
    ctx.api.respond("EUW1_A", Err(ApiError::Status(429)));
    ctx.api.respond("EUW1_A", Ok(fixtures::timeline_doc("EUW1_A", 8)));

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.progress.timelines_upstream, 1);
    assert_eq!(ctx.api.calls("EUW1_A"), 4);
    assert_eq!(
        ctx.sleeper.delays(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
        ]
    );
}

#[tokio::test]
async fn test_disallowed_queue_is_never_written() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.store.insert_match(
        "EUW1_X",
        fixtures::match_doc("EUW1_X", fixtures::CUSTOM_GAME, fixtures::FEB_2024_MS, "14.3.1"),
    );
    ctx.api.respond("EUW1_X", Ok(fixtures::timeline_doc("EUW1_X", 5)));

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.progress.matches_exported, 1);
    assert_eq!(summary.progress.matches_filtered, 1);
    assert!(ctx.objects.keys().iter().all(|k| !k.contains("EUW1_X")));
    assert_eq!(ctx.api.calls("EUW1_X"), 0);
}

#[tokio::test]
async fn test_explicit_queue_filter_does_not_bypass_allow_list() {
    let ctx = TestContext::new();
    ctx.store.insert_match(
        "EUW1_X",
        fixtures::match_doc("EUW1_X", fixtures::CUSTOM_GAME, fixtures::FEB_2024_MS, "14.3.1"),
    );

    let filter = ExportFilter {
        queue_ids: Some(vec![fixtures::CUSTOM_GAME]),
        ..Default::default()
    };
    let summary = ctx.driver().run(&filter).await.unwrap();

    assert_eq!(summary.progress.matches_filtered, 1);
    assert_eq!(ctx.objects.object_count(), 0);
    assert_eq!(ctx.store.filters_seen(), vec![filter]);
}

#[tokio::test]
async fn test_rerun_overwrites_same_keys() {
    let ctx = TestContext::new();
    for id in ["EUW1_A", "EUW1_B", "EUW1_C"] {
        ctx.store.insert_match(id, fixtures::ranked_match(id));
        ctx.store.insert_timeline(id, fixtures::timeline_doc(id, 2));
    }

    ctx.driver().run(&ExportFilter::default()).await.unwrap();
    let first_keys = ctx.objects.keys();
    let first_puts = ctx.objects.put_count();

    ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(first_keys.len(), 6);
    assert_eq!(ctx.objects.keys(), first_keys);
    assert_eq!(ctx.objects.put_count(), first_puts * 2);
}

#[tokio::test]
async fn test_missing_document_is_counted() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.store.push_cursor_id("EUW1_GONE");

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.progress.matches_missing, 1);
    assert_eq!(summary.progress.matches_exported, 1);
    assert_eq!(summary.progress.failed(), 0);
}

#[tokio::test]
async fn test_batches_and_duplicates() {
    let ctx = TestContext::new();
    ctx.store.insert_match("EUW1_A", fixtures::ranked_match("EUW1_A"));
    ctx.store.push_cursor_id("EUW1_A");
    ctx.store.insert_match("EUW1_B", fixtures::ranked_match("EUW1_B"));
    ctx.store.insert_match("EUW1_C", fixtures::ranked_match("EUW1_C"));

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.ids_read, 3);
    assert_eq!(summary.duplicate_ids, 1);
    // [A, B] then the partial [C] at cursor end.
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.progress.matches_exported, 3);
}

/// A repeat that arrives in a later batch is still exported only once.
#[tokio::test]
async fn test_duplicate_across_batches_exported_once() {
    let ctx = TestContext::new();
    for id in ["EUW1_A", "EUW1_B"] {
        ctx.store.insert_match(id, fixtures::ranked_match(id));
        ctx.api.respond(id, Ok(fixtures::timeline_doc(id, 2)));
    }
    // [A, B] fills the first batch; A comes back in the second.
    ctx.store.push_cursor_id("EUW1_A");

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.ids_read, 2);
    assert_eq!(summary.duplicate_ids, 1);
    assert_eq!(summary.batches, 1);
    assert_eq!(summary.progress.matches_exported, 2);
    assert_eq!(summary.progress.timelines_upstream, 2);
    assert_eq!(ctx.api.calls("EUW1_A"), 1);
    assert_eq!(ctx.objects.put_count(), 4);
}

#[tokio::test]
async fn test_limit_stops_reading() {
    let mut ctx = TestContext::new();
    for i in 0..5 {
        let id = format!("EUW1_{}", i);
        ctx.store.insert_match(&id, fixtures::ranked_match(&id));
    }
    ctx.config.limit = Some(3);

    let summary = ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(summary.ids_read, 3);
    assert_eq!(summary.progress.matches_exported, 3);
    assert_eq!(ctx.objects.keys_with_prefix("bronze/matches/").len(), 3);
}

#[tokio::test]
async fn test_unknown_partition_values_use_defaults() {
    let ctx = TestContext::new();
    ctx.store.insert_match(
        "EUW1_A",
        fixtures::match_doc("EUW1_A", fixtures::RANKED_SOLO, 0, "not-a-version"),
    );

    ctx.driver().run(&ExportFilter::default()).await.unwrap();

    assert_eq!(
        ctx.objects.keys_with_prefix("bronze/matches/"),
        vec!["bronze/matches/season=0/patch=unknown/queue=420/matchId=EUW1_A.jsonl.zst"]
    );
}
