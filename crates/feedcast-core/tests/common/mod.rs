//! Test doubles and common utilities for poll contract tests
//!
//! This module provides scripted collaborators that let contract tests
//! observe what the poller does without touching the network.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use feedcast_core::config::PollerConfig;
use feedcast_core::error::{Error, Result};
use feedcast_core::format::Payload;
use feedcast_core::traits::{
    ChannelId, Destination, FeedBackend, FeedHandle, MessageSink, Post, PostBody,
    RegistryChanges, Source, SourceRegistry,
};
use feedcast_core::{FeedPoller, MemorySourceRegistry, PollEvent};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Fixed timestamp `secs` seconds after a common epoch
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .expect("valid timestamp")
}

/// A self-post in `source` created at `ts(secs)`
pub fn post(source: &str, id: &str, secs: i64) -> Post {
    Post {
        permalink: format!("/r/{}/comments/{}/", source, id),
        title: format!("Post {}", id),
        author: "ferris".to_string(),
        created_at: ts(secs),
        body: PostBody::SelfText(format!("body of {}", id)),
    }
}

/// A FeedBackend that serves pre-scripted pages per source
#[derive(Default)]
pub struct ScriptedFeedBackend {
    pages: Mutex<HashMap<String, Vec<Post>>>,
    failing_fetch: Mutex<HashSet<String>>,
    missing: Mutex<HashSet<String>>,
    resolve_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetch_delay: Mutex<Option<Duration>>,
}

impl ScriptedFeedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page returned for `source`
    pub fn set_page(&self, source: &str, posts: Vec<Post>) {
        self.pages
            .lock()
            .unwrap()
            .insert(source.to_string(), posts);
    }

    /// Make fetches for `source` fail with a transient error
    pub fn fail_fetch(&self, source: &str) {
        self.failing_fetch.lock().unwrap().insert(source.to_string());
    }

    /// Make `source` unresolvable
    pub fn mark_missing(&self, source: &str) {
        self.missing.lock().unwrap().insert(source.to_string());
    }

    /// Delay every fetch by `delay`
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedBackend for ScriptedFeedBackend {
    async fn resolve(&self, name: &str) -> Result<FeedHandle> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing.lock().unwrap().contains(name) {
            return Err(Error::not_found(format!("source {}", name)));
        }
        Ok(FeedHandle::new(name, format!("/r/{}/", name), name))
    }

    async fn fetch_recent(&self, handle: &FeedHandle, limit: usize) -> Result<Vec<Post>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_fetch.lock().unwrap().contains(&handle.name) {
            return Err(Error::http(format!("fetch failed for {}", handle.name)));
        }

        let pages = self.pages.lock().unwrap();
        let mut page = pages.get(&handle.name).cloned().unwrap_or_default();
        page.truncate(limit);
        Ok(page)
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

/// One recorded send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: ChannelId,
    pub title: String,
    pub url: String,
}

/// A MessageSink that records every send
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SentMessage>>,
    send_calls: AtomicUsize,
    failing: Mutex<HashSet<ChannelId>>,
    hung: Mutex<HashSet<ChannelId>>,
    unreachable: Mutex<HashSet<ChannelId>>,
    resolve_calls: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `channel` fails
    pub fn fail_channel(&self, channel: &str) {
        self.failing.lock().unwrap().insert(ChannelId::new(channel));
    }

    /// Every send to `channel` never completes
    pub fn hang_channel(&self, channel: &str) {
        self.hung.lock().unwrap().insert(ChannelId::new(channel));
    }

    /// `channel` is dropped during destination resolution
    pub fn unreachable_channel(&self, channel: &str) {
        self.unreachable.lock().unwrap().insert(ChannelId::new(channel));
    }

    /// Successful sends, in completion order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Successful sends to one channel
    pub fn sent_to(&self, channel: &str) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.channel.as_str() == channel)
            .collect()
    }

    /// All send attempts, successful or not
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn resolve_destinations(&self, channels: &[ChannelId]) -> Result<Vec<Destination>> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let unreachable = self.unreachable.lock().unwrap();
        Ok(channels
            .iter()
            .filter(|c| !unreachable.contains(*c))
            .map(|c| Destination::new(c.clone(), format!("#{}", c)))
            .collect())
    }

    async fn send(&self, destination: &Destination, title: &str, payload: &Payload) -> Result<()> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);

        let hung = self.hung.lock().unwrap().contains(&destination.channel);
        if hung {
            std::future::pending::<()>().await;
        }

        if self.failing.lock().unwrap().contains(&destination.channel) {
            return Err(Error::message_sink(format!(
                "channel {} rejected the message",
                destination.channel
            )));
        }

        self.sent.lock().unwrap().push(SentMessage {
            channel: destination.channel.clone(),
            title: title.to_string(),
            url: payload.url.clone(),
        });
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "recording"
    }
}

/// A SourceRegistry wrapper whose writes can be made to fail
pub struct FailingRegistry {
    inner: MemorySourceRegistry,
    fail_writes: AtomicBool,
    apply_calls: AtomicUsize,
}

impl FailingRegistry {
    pub fn new(inner: MemorySourceRegistry) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            apply_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub async fn get(&self, name: &str) -> Option<Source> {
        self.inner.get(name).await
    }
}

#[async_trait]
impl SourceRegistry for FailingRegistry {
    async fn list_sources(&self) -> Result<Vec<Source>> {
        self.inner.list_sources().await
    }

    async fn apply(&self, changes: RegistryChanges) -> Result<()> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::registry("disk full"));
        }
        self.inner.apply(changes).await
    }

    async fn subscribe(&self, name: &str, channel: ChannelId) -> Result<()> {
        self.inner.subscribe(name, channel).await
    }

    async fn unsubscribe(&self, name: &str, channel: &ChannelId) -> Result<()> {
        self.inner.unsubscribe(name, channel).await
    }
}

/// Poller settings for tests: short send timeout, roomy event channel
pub fn test_poller_config() -> PollerConfig {
    PollerConfig {
        send_timeout_secs: 1,
        ..PollerConfig::default()
    }
}

/// Build a poller over the given collaborators
pub fn build_poller(
    registry: Arc<dyn SourceRegistry>,
    backend: Arc<ScriptedFeedBackend>,
    sink: Arc<RecordingSink>,
) -> (FeedPoller, mpsc::Receiver<PollEvent>) {
    FeedPoller::new(registry, backend, sink, test_poller_config())
        .expect("poller construction succeeds")
}

/// Drain every event currently buffered
pub fn drain_events(rx: &mut mpsc::Receiver<PollEvent>) -> Vec<PollEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
