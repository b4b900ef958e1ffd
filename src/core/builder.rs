use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{center::NotificationCenter, Config};
use crate::{
    delivery::DeliveryPipeline,
    dispatch::DispatchTable,
    error::{ConstructionError, TransportError},
    events::Bus,
    transport::{ChannelParts, GroupChannel, Signal, StagingStore},
};

const MAX_GROUP_LEN: usize = 255;

/// Builder for a [`NotificationCenter`] attached to one group.
pub struct CenterBuilder {
    group: String,
    cfg: Config,
    signal: Option<Arc<dyn Signal>>,
    store: Option<Arc<dyn StagingStore>>,
}

impl CenterBuilder {
    /// Creates a builder for `group` with the default configuration.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            cfg: Config::default(),
            signal: None,
            store: None,
        }
    }

    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets the group signal (required).
    pub fn with_signal(mut self, signal: Arc<dyn Signal>) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Sets the shared staging store (required).
    pub fn with_store(mut self, store: Arc<dyn StagingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Establishes the group boundary and starts the center.
    ///
    /// Must be called from within a tokio runtime: the runtime handle is captured
    /// here and hosts the group listener and every delivery queue.
    pub fn build(self) -> Result<NotificationCenter, ConstructionError> {
        validate_group(&self.group)?;
        let runtime = Handle::try_current().map_err(|_| ConstructionError::NoRuntime)?;
        let signal = self
            .signal
            .ok_or(ConstructionError::MissingTransport("signal"))?;
        let store = self
            .store
            .ok_or(ConstructionError::MissingTransport("staging store"))?;

        let stream = signal.subscribe(&self.group).map_err(|e| match e {
            TransportError::NotEntitled(_) => ConstructionError::NotEntitled {
                group: self.group.clone(),
            },
            other => ConstructionError::Subscribe(other),
        })?;

        let group: Arc<str> = Arc::from(self.group);
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let table = Arc::new(DispatchTable::new());
        let pipeline = Arc::new(DeliveryPipeline::new(self.cfg.codec(), bus.clone()));
        let channel = Arc::new(GroupChannel::new(ChannelParts {
            group: Arc::clone(&group),
            signal,
            store,
            ttl: self.cfg.staging_ttl(),
            record_limit: self.cfg.record_limit(),
            seen_capacity: self.cfg.seen_capacity_clamped(),
            bus: bus.clone(),
            runtime: runtime.clone(),
        }));

        // leftovers from posters that exited before their expiry ran
        channel.sweep_expired();

        let cancel = CancellationToken::new();
        channel.spawn_listener(stream, Arc::clone(&table), pipeline, cancel.clone());
        tracing::debug!(group = %group, origin = %channel.origin(), "notification center attached");

        Ok(NotificationCenter::from_parts(
            group, self.cfg, bus, table, channel, runtime, cancel,
        ))
    }
}

/// Group identifiers are 1..=255 characters of `[A-Za-z0-9._-]`.
fn validate_group(group: &str) -> Result<(), ConstructionError> {
    let valid = !group.is_empty()
        && group.len() <= MAX_GROUP_LEN
        && group
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(ConstructionError::InvalidGroup {
            group: group.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_identifiers() {
        for ok in ["group.com.example.app", "A-b_c.9"] {
            assert!(validate_group(ok).is_ok(), "{ok:?}");
        }
        let long = "a".repeat(MAX_GROUP_LEN + 1);
        for bad in ["", "has space", "slash/es", long.as_str()] {
            assert!(
                matches!(validate_group(bad), Err(ConstructionError::InvalidGroup { .. })),
                "{bad:?}"
            );
        }
    }
}
