//! Contract Test: Cycle Re-entrancy and Scheduler Shutdown
//!
//! Constraints verified:
//! - Two cycles never run concurrently on one poller
//! - The scheduler fires once per interval
//! - Shutdown stops the scheduler, but only after an in-flight cycle
//!   has persisted its watermarks
//!
//! If this test fails, someone has introduced overlapping cycles or
//! detached work that outlives shutdown.

mod common;

use common::*;
use feedcast_core::traits::Source;
use feedcast_core::{Error, MemorySourceRegistry, PollScheduler};
use std::sync::Arc;
use std::time::Duration;

fn single_source_registry() -> Arc<MemorySourceRegistry> {
    Arc::new(MemorySourceRegistry::with_sources([Source::new("rust")
        .with_channel("chan-1")
        .with_last_seen_at(ts(0))]))
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycle_is_rejected() {
    let backend = Arc::new(ScriptedFeedBackend::new());
    backend.set_fetch_delay(Duration::from_secs(5));
    backend.set_page("rust", vec![post("rust", "x", 1)]);
    let sink = Arc::new(RecordingSink::new());

    let (poller, _rx) = build_poller(single_source_registry(), backend.clone(), sink.clone());

    let (first, second) = tokio::join!(poller.poll_cycle(), poller.poll_cycle());

    assert_eq!(first.unwrap().polled(), 1);
    assert!(matches!(second, Err(Error::CycleInProgress)));
    assert_eq!(backend.fetch_calls(), 1);
    assert_eq!(sink.sent().len(), 1, "Post is delivered exactly once");

    // Lock is released once the first cycle is done
    tokio_test::assert_ok!(poller.poll_cycle().await);
}

#[tokio::test(start_paused = true)]
async fn scheduler_fires_once_per_interval() {
    let backend = Arc::new(ScriptedFeedBackend::new());
    let sink = Arc::new(RecordingSink::new());
    let (poller, _rx) = build_poller(single_source_registry(), backend.clone(), sink);

    let scheduler = PollScheduler::new(Arc::new(poller), Duration::from_secs(60)).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { scheduler.run_with_shutdown(shutdown_rx).await });

    // Ticks at 0s, 60s and 120s
    tokio::time::sleep(Duration::from_secs(150)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "Scheduler stops on shutdown");
    assert!(result.unwrap().unwrap().is_ok());
    assert_eq!(backend.fetch_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_cycle() {
    let registry = single_source_registry();
    let backend = Arc::new(ScriptedFeedBackend::new());
    backend.set_fetch_delay(Duration::from_secs(10));
    backend.set_page("rust", vec![post("rust", "x", 1)]);
    let sink = Arc::new(RecordingSink::new());
    let (poller, _rx) = build_poller(registry.clone(), backend, sink.clone());

    let scheduler = PollScheduler::new(Arc::new(poller), Duration::from_secs(60)).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { scheduler.run_with_shutdown(shutdown_rx).await });

    // Signal arrives while the first cycle is still fetching
    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(sink.sent().len(), 1);
    assert_eq!(registry.get("rust").await.unwrap().last_seen_at, Some(ts(1)));
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_scheduler() {
    let backend = Arc::new(ScriptedFeedBackend::new());
    let sink = Arc::new(RecordingSink::new());
    let (poller, _rx) = build_poller(single_source_registry(), backend, sink);

    let scheduler = PollScheduler::new(Arc::new(poller), Duration::from_secs(60)).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    drop(shutdown_tx);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run_with_shutdown(shutdown_rx),
    )
    .await;
    assert!(result.is_ok());
}

#[test]
fn zero_interval_is_rejected() {
    let backend = Arc::new(ScriptedFeedBackend::new());
    let sink = Arc::new(RecordingSink::new());
    let (poller, _rx) = build_poller(single_source_registry(), backend, sink);

    assert!(PollScheduler::new(Arc::new(poller), Duration::ZERO).is_err());
}
