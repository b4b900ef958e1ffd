//! # Envelope
//!
//! The canonical transport form of one notification: name, optional string object and
//! the already-encoded payload bytes. Envelopes are immutable; every matching observer
//! entry reads the same envelope and decodes its own copy of the payload.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::PostError;
use crate::notification::Notification;
use crate::payload::PayloadCodec;

/// Immutable `(name, object, payload)` tuple. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    name: Arc<str>,
    object: Option<Arc<str>>,
    payload: Option<Bytes>,
}

impl Envelope {
    /// Creates an envelope. The name must not be empty.
    pub fn new(
        name: impl Into<Arc<str>>,
        object: Option<&str>,
        payload: Option<Bytes>,
    ) -> Result<Self, PostError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PostError::EmptyName);
        }
        Ok(Self {
            name,
            object: object.map(Arc::from),
            payload,
        })
    }

    /// Encodes a notification's payload and wraps it.
    ///
    /// Encoding happens here, synchronously, so a non coding-safe payload is reported
    /// to the poster before anything is staged.
    pub fn seal(note: &Notification, codec: &PayloadCodec) -> Result<Self, PostError> {
        let payload = match note.user_info() {
            Some(info) => Some(codec.encode(info)?),
            None => None,
        };
        Self::new(note.name(), note.object(), payload)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object(&self) -> Option<&str> {
        self.object.as_deref()
    }

    /// Encoded payload bytes, if any.
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }
}
