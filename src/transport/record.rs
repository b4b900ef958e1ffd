//! # Staged record.
//!
//! The bytes written to the staging area for one post: the envelope plus the
//! metadata receivers need to apply the retention policy. Serialized with `bincode`
//! under a size limit so a corrupt or hostile record cannot force a large allocation.

use std::time::{SystemTime, UNIX_EPOCH};

use bincode::Options;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransportError;
use crate::notification::Envelope;

/// Current staged record format.
pub const RECORD_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StagedRecord {
    pub version: u8,
    pub name: String,
    pub object: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub posted_at_ms: u64,
    pub origin: Uuid,
}

impl StagedRecord {
    pub fn from_envelope(env: &Envelope, origin: Uuid) -> Self {
        Self {
            version: RECORD_VERSION,
            name: env.name().to_string(),
            object: env.object().map(str::to_owned),
            payload: env.payload().map(|b| b.to_vec()),
            posted_at_ms: now_ms(),
            origin,
        }
    }

    pub fn to_bytes(&self, limit: u64) -> Result<Vec<u8>, TransportError> {
        options(limit)
            .serialize(self)
            .map_err(|e| TransportError::Record(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8], limit: u64) -> Result<Self, TransportError> {
        let record: Self = options(limit)
            .deserialize(bytes)
            .map_err(|e| TransportError::Record(e.to_string()))?;
        if record.version != RECORD_VERSION {
            return Err(TransportError::Record(format!(
                "unsupported version {}",
                record.version
            )));
        }
        Ok(record)
    }

    pub fn into_envelope(self) -> Result<Envelope, TransportError> {
        Envelope::new(self.name, self.object.as_deref(), self.payload.map(Bytes::from))
            .map_err(|e| TransportError::Record(e.to_string()))
    }

    /// Milliseconds since the record was written, zero if the clock went backwards.
    pub fn age_ms(&self) -> u64 {
        now_ms().saturating_sub(self.posted_at_ms)
    }
}

fn options(limit: u64) -> impl Options {
    bincode::DefaultOptions::new().with_limit(limit)
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
