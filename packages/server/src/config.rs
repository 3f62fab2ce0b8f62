//! Runtime configuration of the fan-out core.

use std::time::Duration;

/// Default relay channel shared by every instance
pub const DEFAULT_RELAY_CHANNEL: &str = "messages";

/// Default upper bound on one membership lookup
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables of the fan-out pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Logical pub/sub channel every instance publishes to and subscribes on
    pub relay_channel: String,
    /// Capacity of the bounded persistence queue
    pub persistence_queue_capacity: usize,
    /// Capacity of the bounded relay-publish queue
    pub publish_queue_capacity: usize,
    /// Frames buffered per connection before writes report backpressure
    pub outbound_buffer: usize,
    /// Inbound frames read ahead of ingestion per connection
    pub inbound_buffer: usize,
    /// Interval between keepalive pings on an idle writer
    pub keepalive_interval: Duration,
    /// Upper bound on one membership lookup during dispatch
    pub resolve_timeout: Duration,
    /// Backoff applied to relay resubscription
    pub resubscribe: BackoffPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            relay_channel: DEFAULT_RELAY_CHANNEL.to_string(),
            persistence_queue_capacity: 100,
            publish_queue_capacity: 100,
            outbound_buffer: 64,
            inbound_buffer: 16,
            keepalive_interval: Duration::from_secs(15),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            resubscribe: BackoffPolicy::default(),
        }
    }
}

/// Exponential backoff: `initial`, doubling per consecutive failure, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(250),
            max: Duration::from_secs(5),
        }
    }
}
