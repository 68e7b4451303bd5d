//! Contract Test: Watermark Semantics
//!
//! Constraints verified:
//! - Only posts strictly newer than the watermark are delivered
//! - The new watermark is the maximum creation time over the whole page,
//!   independent of page order
//! - A post created exactly at the watermark counts as already delivered
//! - Watermarks never move backwards
//! - A never-polled source starts at "now" and skips its backlog
//! - A failed save keeps the previous watermark, so the page is redelivered
//!
//! If this test fails, posts are being lost or duplicated.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use feedcast_core::traits::Source;
use feedcast_core::{MemorySourceRegistry, PollEvent, SourceOutcome};
use std::sync::Arc;

#[tokio::test]
async fn unordered_page_delivers_only_newer_posts_and_stores_page_max() {
    let registry = Arc::new(MemorySourceRegistry::with_sources([Source::new("rust")
        .with_channel("chan-1")
        .with_last_seen_at(ts(4))]));
    let backend = Arc::new(ScriptedFeedBackend::new());
    backend.set_page(
        "rust",
        vec![
            post("rust", "p5", 5),
            post("rust", "p3", 3),
            post("rust", "p8", 8),
            post("rust", "p1", 1),
        ],
    );
    let sink = Arc::new(RecordingSink::new());

    let (poller, _rx) = build_poller(registry.clone(), backend, sink.clone());
    let report = poller.poll_cycle().await.unwrap();

    let urls: Vec<String> = sink.sent().into_iter().map(|m| m.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://reddit.com/r/rust/comments/p5/".to_string(),
            "https://reddit.com/r/rust/comments/p8/".to_string(),
        ],
        "Posts are delivered in page order, older-than-watermark posts skipped"
    );
    assert_eq!(
        report.outcome("rust"),
        Some(&SourceOutcome::Polled {
            delivered_posts: 2,
            watermark: ts(8),
        })
    );
    assert_eq!(registry.get("rust").await.unwrap().last_seen_at, Some(ts(8)));
}

#[tokio::test]
async fn post_at_exact_watermark_is_not_redelivered() {
    let registry = Arc::new(MemorySourceRegistry::with_sources([Source::new("rust")
        .with_channel("chan-1")
        .with_last_seen_at(ts(10))]));
    let backend = Arc::new(ScriptedFeedBackend::new());
    backend.set_page("rust", vec![post("rust", "tie", 10), post("rust", "old", 9)]);
    let sink = Arc::new(RecordingSink::new());

    let (poller, _rx) = build_poller(registry.clone(), backend, sink.clone());
    poller.poll_cycle().await.unwrap();

    assert!(sink.sent().is_empty(), "A tie with the watermark is treated as seen");
    assert_eq!(registry.get("rust").await.unwrap().last_seen_at, Some(ts(10)));
}

#[tokio::test]
async fn watermark_never_moves_backwards() {
    let registry = Arc::new(MemorySourceRegistry::with_sources([Source::new("rust")
        .with_channel("chan-1")
        .with_last_seen_at(ts(20))]));
    let backend = Arc::new(ScriptedFeedBackend::new());
    // Older page, e.g. after a newer post was deleted upstream
    backend.set_page("rust", vec![post("rust", "a", 5), post("rust", "b", 15)]);
    let sink = Arc::new(RecordingSink::new());

    let (poller, _rx) = build_poller(registry.clone(), backend, sink.clone());
    poller.poll_cycle().await.unwrap();

    assert!(sink.sent().is_empty());
    assert_eq!(registry.get("rust").await.unwrap().last_seen_at, Some(ts(20)));
}

#[tokio::test]
async fn same_page_twice_is_delivered_once() {
    let registry = Arc::new(MemorySourceRegistry::with_sources([Source::new("rust")
        .with_channel("chan-1")
        .with_last_seen_at(ts(0))]));
    let backend = Arc::new(ScriptedFeedBackend::new());
    backend.set_page("rust", vec![post("rust", "a", 1), post("rust", "b", 2)]);
    let sink = Arc::new(RecordingSink::new());

    let (poller, _rx) = build_poller(registry, backend, sink.clone());
    poller.poll_cycle().await.unwrap();
    let second = poller.poll_cycle().await.unwrap();

    assert_eq!(sink.sent().len(), 2);
    assert_eq!(second.delivered_posts(), 0);
}

#[tokio::test]
async fn first_poll_uses_now_as_baseline() {
    let registry = Arc::new(MemorySourceRegistry::with_sources([
        Source::new("rust").with_channel("chan-1")
    ]));
    let backend = Arc::new(ScriptedFeedBackend::new());
    let mut future_post = post("rust", "future", 0);
    future_post.created_at = Utc::now() + ChronoDuration::hours(1);
    backend.set_page(
        "rust",
        vec![post("rust", "backlog", 1), future_post.clone()],
    );
    let sink = Arc::new(RecordingSink::new());

    let before = Utc::now();
    let (poller, _rx) = build_poller(registry.clone(), backend, sink.clone());
    poller.poll_cycle().await.unwrap();

    let sent = sink.sent();
    assert_eq!(sent.len(), 1, "Backlog from before the first poll is skipped");
    assert!(sent[0].url.ends_with("/comments/future/"));

    let stored = registry.get("rust").await.unwrap().last_seen_at.unwrap();
    assert!(stored >= before);
    assert_eq!(stored, future_post.created_at);
}

#[tokio::test]
async fn first_poll_of_old_page_stores_now() {
    let registry = Arc::new(MemorySourceRegistry::with_sources([
        Source::new("rust").with_channel("chan-1")
    ]));
    let backend = Arc::new(ScriptedFeedBackend::new());
    backend.set_page(
        "rust",
        vec![post("rust", "old", 1), post("rust", "older", 0)],
    );
    let sink = Arc::new(RecordingSink::new());
    let (poller, _rx) = build_poller(registry.clone(), backend, sink.clone());

    let before = Utc::now();
    let report = poller.poll_cycle().await.unwrap();
    let after = Utc::now();

    assert_eq!(sink.send_calls(), 0);
    assert_eq!(report.delivered_posts(), 0);
    let stored = registry.get("rust").await.unwrap().last_seen_at.unwrap();
    assert!(before <= stored && stored <= after, "Watermark is the cycle's now");
}

#[tokio::test]
async fn failed_save_keeps_watermark_and_redelivers() {
    let registry = Arc::new(FailingRegistry::new(MemorySourceRegistry::with_sources([
        Source::new("rust")
            .with_channel("chan-1")
            .with_last_seen_at(ts(0)),
    ])));
    let backend = Arc::new(ScriptedFeedBackend::new());
    backend.set_page("rust", vec![post("rust", "a", 1)]);
    let sink = Arc::new(RecordingSink::new());

    let (poller, _rx) = build_poller(registry.clone(), backend, sink.clone());

    registry.set_fail_writes(true);
    let report = poller.poll_cycle().await.unwrap();
    assert!(matches!(
        report.outcome("rust"),
        Some(SourceOutcome::Failed { .. })
    ));
    assert_eq!(sink.sent().len(), 1, "Delivery happens before the save");
    assert_eq!(registry.get("rust").await.unwrap().last_seen_at, Some(ts(0)));

    registry.set_fail_writes(false);
    poller.poll_cycle().await.unwrap();
    assert_eq!(sink.sent().len(), 2, "Unsaved page is delivered again");
    assert_eq!(registry.get("rust").await.unwrap().last_seen_at, Some(ts(1)));
}

#[tokio::test]
async fn watermark_advance_is_reported_as_event() {
    let registry = Arc::new(MemorySourceRegistry::with_sources([Source::new("rust")
        .with_channel("chan-1")
        .with_last_seen_at(ts(0))]));
    let backend = Arc::new(ScriptedFeedBackend::new());
    backend.set_page("rust", vec![post("rust", "a", 3)]);
    let sink = Arc::new(RecordingSink::new());

    let (poller, mut rx) = build_poller(registry, backend, sink);
    poller.poll_cycle().await.unwrap();

    let events = drain_events(&mut rx);
    assert!(events.contains(&PollEvent::WatermarkAdvanced {
        source: "rust".to_string(),
        watermark: ts(3),
    }));
    assert!(matches!(events.first(), Some(PollEvent::CycleStarted { sources_count: 1 })));
    assert!(matches!(events.last(), Some(PollEvent::CycleFinished { polled: 1, .. })));
}
