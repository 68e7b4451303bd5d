//! Concurrent delivery of one payload to many destinations
//!
//! Every destination gets its own task in a [`JoinSet`] and its own
//! deadline. `deliver()` returns once every destination has either
//! succeeded, failed or timed out, with one [`DeliveryOutcome`] per
//! destination. It never returns an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::format::Payload;
use crate::traits::{ChannelId, Destination, MessageSink};

/// Default per-send deadline
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a single delivery did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The sink returned an error
    Failed(String),
    /// The send did not complete within the deadline
    TimedOut(Duration),
    /// The delivery task panicked or was aborted
    Aborted(String),
}

impl std::fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "{}", msg),
            Self::TimedOut(after) => write!(f, "timed out after {:?}", after),
            Self::Aborted(msg) => write!(f, "delivery task aborted: {}", msg),
        }
    }
}

/// Result of delivering to one destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Channel of the destination; `None` only if an aborted task could not be attributed
    pub channel: Option<ChannelId>,
    /// `Ok(())` if delivered
    pub result: Result<(), DeliveryFailure>,
}

/// Outcomes of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// One outcome per attempted destination
    pub outcomes: Vec<DeliveryOutcome>,
}

impl FanoutReport {
    /// Number of attempted destinations
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of successful deliveries
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of failed deliveries
    pub fn failed(&self) -> usize {
        self.attempted() - self.delivered()
    }
}

/// Delivers payloads to all destinations of a source at once
pub struct DeliveryFanout {
    sink: Arc<dyn MessageSink>,
    send_timeout: Duration,
}

impl DeliveryFanout {
    /// Create a fan-out over `sink` with a per-send deadline
    pub fn new(sink: Arc<dyn MessageSink>, send_timeout: Duration) -> Self {
        Self { sink, send_timeout }
    }

    /// Send `payload` to every destination concurrently
    ///
    /// `context` identifies the post in log lines (its permalink).
    pub async fn deliver(
        &self,
        title: &str,
        payload: &Payload,
        destinations: &[Destination],
        context: &str,
    ) -> FanoutReport {
        let title: Arc<str> = Arc::from(title);
        let payload = Arc::new(payload.clone());
        let mut tasks = JoinSet::new();

        for destination in destinations.iter().cloned() {
            let sink = Arc::clone(&self.sink);
            let title = Arc::clone(&title);
            let payload = Arc::clone(&payload);
            let deadline = self.send_timeout;

            tasks.spawn(async move {
                let result =
                    match tokio::time::timeout(deadline, sink.send(&destination, &title, &payload))
                        .await
                    {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(DeliveryFailure::Failed(e.to_string())),
                        Err(_) => Err(DeliveryFailure::TimedOut(deadline)),
                    };
                (destination, result)
            });
        }

        let mut report = FanoutReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((destination, result)) => {
                    match &result {
                        Ok(()) => debug!(
                            "Delivered {} to {} ({})",
                            context, destination.channel, destination.label
                        ),
                        Err(failure) => warn!(
                            "Failed to deliver {} to {} ({}): {}",
                            context, destination.channel, destination.label, failure
                        ),
                    }
                    report.outcomes.push(DeliveryOutcome {
                        channel: Some(destination.channel),
                        result,
                    });
                }
                Err(join_error) => {
                    error!("Delivery task for {} aborted: {}", context, join_error);
                    report.outcomes.push(DeliveryOutcome {
                        channel: None,
                        result: Err(DeliveryFailure::Aborted(join_error.to_string())),
                    });
                }
            }
        }

        report
    }
}
