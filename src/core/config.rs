//! # Notification center configuration.
//!
//! Provides [`Config`], the settings shared by every component of one
//! [`NotificationCenter`](crate::NotificationCenter).
//!
//! ## Sentinel values
//! - `staging_ttl = 0s` → staged envelopes never expire
//! - capacities of `0` are clamped to `1`

use std::time::Duration;

use crate::payload::PayloadCodec;

/// Configuration of one notification center.
///
/// ## Field semantics
/// - `queue_capacity`: bound of every delivery queue the center creates
/// - `bus_capacity`: diagnostic bus ring buffer size
/// - `staging_ttl`: how long a posted envelope stays in the staging area (`0s` = forever)
/// - `seen_capacity`: how many consumed staging keys are remembered
/// - `max_payload_bytes`, `max_depth`: payload codec limits
///
/// All fields are public; prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Deliveries a queue holds before further deliveries to it are dropped.
    pub queue_capacity: usize,

    /// Capacity of the diagnostic event bus.
    ///
    /// Event receivers lagging by more than this observe `Lagged` and skip events.
    pub bus_capacity: usize,

    /// Retention of staged envelopes.
    ///
    /// The posting center deletes its record after this delay; receivers ignore
    /// records older than this. `Duration::ZERO` disables expiry.
    pub staging_ttl: Duration,

    /// Number of consumed staging keys remembered to suppress duplicate signals.
    pub seen_capacity: usize,

    /// Largest encoded payload accepted on either side.
    pub max_payload_bytes: usize,

    /// Deepest container nesting accepted on either side.
    pub max_depth: usize,
}

impl Config {
    /// Returns the staging TTL as an `Option`.
    ///
    /// - `None` → records never expire
    /// - `Some(d)` → records expire `d` after posting
    #[inline]
    pub fn staging_ttl(&self) -> Option<Duration> {
        if self.staging_ttl.is_zero() {
            None
        } else {
            Some(self.staging_ttl)
        }
    }

    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    #[inline]
    pub fn seen_capacity_clamped(&self) -> usize {
        self.seen_capacity.max(1)
    }

    /// Codec enforcing the configured payload limits.
    pub fn codec(&self) -> PayloadCodec {
        PayloadCodec::new(self.max_payload_bytes, self.max_depth)
    }

    /// Upper bound for one serialized staged record: the payload plus headroom for
    /// the name, object and metadata.
    pub(crate) fn record_limit(&self) -> u64 {
        (self.max_payload_bytes as u64).saturating_add(64 * 1024)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `queue_capacity = 1024`
    /// - `bus_capacity = 1024`
    /// - `staging_ttl = 30s`
    /// - `seen_capacity = 4096`
    /// - `max_payload_bytes = 1 MiB`
    /// - `max_depth = 64`
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            bus_capacity: 1024,
            staging_ttl: Duration::from_secs(30),
            seen_capacity: 4096,
            max_payload_bytes: 1 << 20,
            max_depth: 64,
        }
    }
}
