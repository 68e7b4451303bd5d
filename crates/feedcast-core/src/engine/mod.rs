//! Core poll engine
//!
//! The FeedPoller is responsible for:
//! - Walking the registered sources once per cycle
//! - Pruning sources that have no channels left
//! - Fetching each source's most recent page of posts
//! - Delivering posts newer than the source's watermark
//! - Advancing the watermark after the whole page was handled
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐
//!   scheduler ──────▶│  FeedPoller  │──── PollEvent ───▶ monitoring
//!                    └──────────────┘
//!                            │
//!     ┌──────────────┬───────┴───────┬────────────────┐
//!     ▼              ▼               ▼                ▼
//! ┌─────────┐  ┌────────────┐  ┌─────────────┐  ┌────────────┐
//! │ Handle  │  │   Post     │  │  Delivery   │  │ Watermark  │
//! │ Cache   │  │ Formatter  │  │  Fanout     │  │ Store      │
//! └─────────┘  └────────────┘  └─────────────┘  └────────────┘
//!      │                              │                │
//!      ▼                              ▼                ▼
//! FeedBackend                    MessageSink     SourceRegistry
//! ```
//!
//! ## Cycle Flow (per source, in listing order)
//!
//! 1. No channels → queue prune, evict cached handle, next source
//! 2. Resolve destinations; none reachable → skip, watermark untouched
//! 3. Resolve the feed handle (cached)
//! 4. Fetch one page of recent posts
//! 5. Deliver every post strictly newer than the watermark
//! 6. Persist `max(created_at)` over the page as the new watermark
//!
//! A failure in any step affects only the source it occurred on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::cache::SourceHandleCache;
use crate::config::PollerConfig;
use crate::error::{Error, Result};
use crate::fanout::DeliveryFanout;
use crate::format::PostFormatter;
use crate::traits::{FeedBackend, FeedHandle, MessageSink, Post, Source, SourceRegistry};
use crate::watermark::WatermarkStore;

/// Events emitted by the FeedPoller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// A cycle started
    CycleStarted {
        sources_count: usize,
    },

    /// A source without channels was removed
    SourcePruned {
        source: String,
    },

    /// A source was skipped for this cycle
    SourceSkipped {
        source: String,
        reason: String,
    },

    /// A post was handed to the fan-out
    PostDelivered {
        source: String,
        permalink: String,
        delivered: usize,
        failed: usize,
    },

    /// A source's watermark was persisted
    WatermarkAdvanced {
        source: String,
        watermark: DateTime<Utc>,
    },

    /// A source failed for this cycle
    SourceFailed {
        source: String,
        error: String,
    },

    /// A cycle finished
    CycleFinished {
        polled: usize,
        pruned: usize,
        skipped: usize,
        failed: usize,
    },
}

/// What happened to one source during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Removed because it had no channels
    Pruned,
    /// Left untouched because no destination was reachable
    Skipped,
    /// Page processed and watermark persisted
    Polled {
        /// Posts handed to the fan-out
        delivered_posts: usize,
        /// Watermark now stored for the source
        watermark: DateTime<Utc>,
    },
    /// Aborted; the watermark keeps its previous value
    Failed {
        /// Error description
        error: String,
    },
}

/// Summary of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Outcome per source, in visiting order
    pub sources: Vec<(String, SourceOutcome)>,
}

impl CycleReport {
    /// Outcome for a source, if it was visited
    pub fn outcome(&self, name: &str) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|(source, _)| source == name)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.sources.iter().filter(|(_, o)| pred(o)).count()
    }

    /// Number of sources whose page was processed
    pub fn polled(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Polled { .. }))
    }

    /// Number of pruned sources
    pub fn pruned(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Pruned))
    }

    /// Number of skipped sources
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Skipped))
    }

    /// Number of failed sources
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Failed { .. }))
    }

    /// Total posts handed to the fan-out
    pub fn delivered_posts(&self) -> usize {
        self.sources
            .iter()
            .map(|(_, o)| match o {
                SourceOutcome::Polled { delivered_posts, .. } => *delivered_posts,
                _ => 0,
            })
            .sum()
    }
}

/// Feed poller
///
/// Owns its collaborators and per-process state (handle cache, pending
/// prunes). The scheduler calls [`FeedPoller::poll_cycle`] once per tick.
///
/// ## Re-entrancy
///
/// At most one cycle runs at a time. A call made while another cycle is in
/// flight returns [`Error::CycleInProgress`] immediately.
pub struct FeedPoller {
    /// Subscriptions and watermarks
    registry: Arc<dyn SourceRegistry>,

    /// Resolves channels into destinations
    sink: Arc<dyn MessageSink>,

    /// Memoized feed handles
    handles: SourceHandleCache,

    /// Post → payload
    formatter: PostFormatter,

    /// Concurrent delivery
    fanout: DeliveryFanout,

    /// Watermark persistence
    watermarks: WatermarkStore,

    /// Posts fetched per source per cycle
    page_size: usize,

    /// Held for the duration of a cycle
    cycle_lock: Mutex<()>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<PollEvent>,
}

impl FeedPoller {
    /// Create a new poller
    ///
    /// # Returns
    ///
    /// A tuple of (poller, event_receiver) where event_receiver yields poll events
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        backend: Arc<dyn FeedBackend>,
        sink: Arc<dyn MessageSink>,
        config: PollerConfig,
    ) -> Result<(Self, mpsc::Receiver<PollEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let poller = Self {
            handles: SourceHandleCache::new(backend, config.handle_cache_capacity),
            formatter: PostFormatter::new(config.site_url.clone()),
            fanout: DeliveryFanout::new(Arc::clone(&sink), config.send_timeout()),
            watermarks: WatermarkStore::new(Arc::clone(&registry)),
            registry,
            sink,
            page_size: config.page_size,
            cycle_lock: Mutex::new(()),
            event_tx: tx,
        };

        Ok((poller, rx))
    }

    /// Run one poll cycle over every registered source
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The cycle ran; individual sources may have failed
    /// - `Err(Error::CycleInProgress)`: Another cycle is still running
    /// - `Err(Error)`: The sources could not be listed
    pub async fn poll_cycle(&self) -> Result<CycleReport> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return Err(Error::CycleInProgress);
        };

        info!("Scanning feeds...");
        let sources = self.registry.list_sources().await?;
        self.emit_event(PollEvent::CycleStarted {
            sources_count: sources.len(),
        });

        let mut report = CycleReport::default();
        for source in sources {
            let outcome = match self.poll_source(&source).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Failed to poll source {}: {}", source.name, e);
                    self.emit_event(PollEvent::SourceFailed {
                        source: source.name.clone(),
                        error: e.to_string(),
                    });
                    SourceOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.sources.push((source.name, outcome));
        }

        // Prunes not carried by a watermark save
        if let Err(e) = self.watermarks.flush_prunes().await {
            error!("Failed to commit pruned sources: {}", e);
        }

        info!(
            "Cycle finished: {} polled, {} pruned, {} skipped, {} failed, {} post(s) delivered",
            report.polled(),
            report.pruned(),
            report.skipped(),
            report.failed(),
            report.delivered_posts()
        );
        self.emit_event(PollEvent::CycleFinished {
            polled: report.polled(),
            pruned: report.pruned(),
            skipped: report.skipped(),
            failed: report.failed(),
        });

        Ok(report)
    }

    /// Process a single source
    async fn poll_source(&self, source: &Source) -> Result<SourceOutcome> {
        let channels = self.registry.load_destinations(source).await?;
        if channels.is_empty() {
            info!("Feed without channels: {}, pruning", source.name);
            self.watermarks.queue_prune(&source.name).await;
            self.handles.evict(&source.name).await;
            self.emit_event(PollEvent::SourcePruned {
                source: source.name.clone(),
            });
            return Ok(SourceOutcome::Pruned);
        }

        let destinations = self.sink.resolve_destinations(&channels).await?;
        if destinations.is_empty() {
            warn!(
                "No reachable destinations for {} ({} channel(s) configured), skipping",
                source.name,
                channels.len()
            );
            self.emit_event(PollEvent::SourceSkipped {
                source: source.name.clone(),
                reason: "no reachable destinations".to_string(),
            });
            return Ok(SourceOutcome::Skipped);
        }

        let handle = self.handles.resolve(&source.name).await?;
        let page = self.fetch_page(&handle, source).await?;

        let watermark = WatermarkStore::current(source, Utc::now());
        let title = self.formatter.notification_title(&source.name);
        let mut max_seen = watermark;
        let mut delivered_posts = 0;

        for post in &page {
            if post.created_at <= watermark {
                continue;
            }

            info!("New post in /r/{}: {}", source.name, post.title);
            let payload = self.formatter.format(post);
            let fanout = self
                .fanout
                .deliver(&title, &payload, &destinations, &post.permalink)
                .await;
            if fanout.failed() > 0 {
                warn!(
                    "Post {} reached {}/{} destination(s)",
                    post.permalink,
                    fanout.delivered(),
                    fanout.attempted()
                );
            }
            self.emit_event(PollEvent::PostDelivered {
                source: source.name.clone(),
                permalink: post.permalink.clone(),
                delivered: fanout.delivered(),
                failed: fanout.failed(),
            });

            delivered_posts += 1;
            if post.created_at > max_seen {
                max_seen = post.created_at;
            }
        }

        let stored = self.watermarks.advance(source, max_seen).await?;
        debug!(
            "Source {}: {} post(s) in page, {} new, watermark {}",
            source.name,
            page.len(),
            delivered_posts,
            stored
        );
        self.emit_event(PollEvent::WatermarkAdvanced {
            source: source.name.clone(),
            watermark: stored,
        });

        Ok(SourceOutcome::Polled {
            delivered_posts,
            watermark: stored,
        })
    }

    /// Fetch one page, dropping a handle that the backend no longer accepts
    async fn fetch_page(&self, handle: &FeedHandle, source: &Source) -> Result<Vec<Post>> {
        match self.handles.backend().fetch_recent(handle, self.page_size).await {
            Ok(page) => Ok(page),
            Err(e @ Error::NotFound(_)) => {
                self.handles.evict(&source.name).await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Number of cached feed handles
    pub async fn cached_handles(&self) -> usize {
        self.handles.len().await
    }

    /// Emit a poll event
    fn emit_event(&self, event: PollEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Poll event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report_counts() {
        let report = CycleReport {
            sources: vec![
                ("a".to_string(), SourceOutcome::Pruned),
                ("b".to_string(), SourceOutcome::Skipped),
                (
                    "c".to_string(),
                    SourceOutcome::Polled {
                        delivered_posts: 3,
                        watermark: Utc::now(),
                    },
                ),
                (
                    "d".to_string(),
                    SourceOutcome::Failed {
                        error: "boom".to_string(),
                    },
                ),
            ],
        };

        assert_eq!(report.pruned(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.polled(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.delivered_posts(), 3);
        assert_eq!(report.outcome("b"), Some(&SourceOutcome::Skipped));
        assert_eq!(report.outcome("z"), None);
    }
}
