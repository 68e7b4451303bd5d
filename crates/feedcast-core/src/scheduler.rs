//! Recurring poll trigger
//!
//! Invokes [`FeedPoller::poll_cycle`] once per interval until shutdown.
//!
//! Each cycle is awaited inline, so two cycles never overlap. Ticks missed
//! while a long cycle was running are skipped rather than fired in a burst.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::engine::FeedPoller;
use crate::error::{Error, Result};

/// Drives a [`FeedPoller`] on a fixed interval
pub struct PollScheduler {
    poller: Arc<FeedPoller>,
    interval: Duration,
}

impl PollScheduler {
    /// Create a scheduler firing every `interval`
    ///
    /// The first cycle runs immediately.
    pub fn new(poller: Arc<FeedPoller>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::config("Poll interval must be > 0"));
        }
        Ok(Self { poller, interval })
    }

    /// Run until SIGINT (ctrl-c)
    pub async fn run(&self) -> Result<()> {
        self.run_internal(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves
    ///
    /// A cycle already in progress when the signal arrives is finished
    /// first, so its watermark saves are not interrupted.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        self.run_internal(shutdown).await
    }

    /// Run until the oneshot fires (or its sender is dropped)
    pub async fn run_with_shutdown(&self, shutdown_rx: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        self.run_internal(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    async fn run_internal<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        info!("Poll scheduler started (interval={:?})", self.interval);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                // Shutdown wins over a tick that is ready at the same time
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping poll scheduler");
                    break;
                }

                Some(_) = ticks.next() => {
                    self.tick().await;
                }
            }
        }

        Ok(())
    }

    async fn tick(&self) {
        match self.poller.poll_cycle().await {
            Ok(report) => debug!(
                "Poll cycle complete: {} source(s) visited",
                report.sources.len()
            ),
            Err(Error::CycleInProgress) => {
                warn!("Previous poll cycle still running, dropping this tick");
            }
            Err(e) => error!("Poll cycle failed: {}", e),
        }
    }
}
