//! Error types used by the notification center.
//!
//! This module defines the error enums surfaced by each layer:
//!
//! - [`ConstructionError`]: the group boundary could not be established.
//! - [`EncodeError`]: a payload contains a value that cannot cross a process boundary.
//! - [`DecodeError`]: received payload bytes violate the receiver's whitelist or are malformed.
//! - [`TransportError`]: staging or signalling failed.
//! - [`PostError`]: everything that can prevent a post.
//!
//! Every enum provides `as_label` for logs and diagnostic events.
//! Decode errors are never returned to observers: the pipeline logs them and
//! delivers the notification without a payload.

use thiserror::Error;

use crate::payload::TypeTag;

/// # Errors produced while constructing a [`NotificationCenter`](crate::NotificationCenter).
///
/// Construction failure is the only error fatal to a center instance.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConstructionError {
    /// The group identifier is empty or contains characters outside `[A-Za-z0-9._-]`.
    #[error("invalid group identifier {group:?}")]
    InvalidGroup {
        /// The rejected identifier.
        group: String,
    },

    /// The process is not a member of the requested group.
    #[error("not entitled to group {group:?}")]
    NotEntitled {
        /// The requested group identifier.
        group: String,
    },

    /// No tokio runtime is available to host the delivery workers.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// The group signal could not be subscribed to.
    #[error("signal subscription failed: {0}")]
    Subscribe(#[source] TransportError),

    /// The builder was not given a signal or a staging store.
    #[error("no {0} configured")]
    MissingTransport(&'static str),
}

impl ConstructionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use groupcast::ConstructionError;
    ///
    /// let err = ConstructionError::NoRuntime;
    /// assert_eq!(err.as_label(), "construction_no_runtime");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConstructionError::InvalidGroup { .. } => "construction_invalid_group",
            ConstructionError::NotEntitled { .. } => "construction_not_entitled",
            ConstructionError::NoRuntime => "construction_no_runtime",
            ConstructionError::Subscribe(_) => "construction_subscribe_failed",
            ConstructionError::MissingTransport(_) => "construction_missing_transport",
        }
    }
}

/// # Errors produced while encoding a payload.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The payload graph contains a value that is not coding-safe.
    #[error("value at {path} of type {type_name} cannot be encoded")]
    Unsupported {
        /// Dotted path from the payload root to the offending value.
        path: String,
        /// Rust type name of the offending value.
        type_name: &'static str,
    },

    /// Containers are nested deeper than the configured limit.
    #[error("payload nesting exceeds depth {max}")]
    TooDeep {
        /// The configured maximum depth.
        max: usize,
    },

    /// The encoded payload exceeds the configured size limit.
    #[error("encoded payload is {size} bytes; limit is {limit}")]
    TooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
}

impl EncodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EncodeError::Unsupported { .. } => "encode_unsupported_type",
            EncodeError::TooDeep { .. } => "encode_too_deep",
            EncodeError::TooLarge { .. } => "encode_too_large",
        }
    }
}

/// # Errors produced while decoding a payload.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte stream references a type outside the receiver's whitelist.
    #[error("type {0} is not in the allowed set")]
    Disallowed(TypeTag),

    /// The byte stream contains a type tag this codec does not know.
    #[error("unknown type tag {0:#04x}")]
    UnknownTag(u8),

    /// The input ended in the middle of a value.
    #[error("payload truncated")]
    Truncated,

    /// A string or key is not valid UTF-8.
    #[error("invalid utf-8 in payload")]
    InvalidUtf8,

    /// The leading version byte is not supported.
    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u8),

    /// Containers are nested deeper than the configured limit.
    #[error("payload nesting exceeds depth {max}")]
    TooDeep {
        /// The configured maximum depth.
        max: usize,
    },

    /// Bytes remain after the root dictionary.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// A date value is out of the representable range.
    #[error("date out of range")]
    InvalidDate,

    /// A value body is not in canonical form.
    #[error("malformed {0}")]
    Malformed(&'static str),

    /// The input exceeds the configured size limit.
    #[error("payload is {size} bytes; limit is {limit}")]
    TooLarge {
        /// Input size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },
}

impl DecodeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DecodeError::Disallowed(_) => "decode_disallowed_type",
            DecodeError::UnknownTag(_) => "decode_unknown_tag",
            DecodeError::Truncated => "decode_truncated",
            DecodeError::InvalidUtf8 => "decode_invalid_utf8",
            DecodeError::UnsupportedVersion(_) => "decode_unsupported_version",
            DecodeError::TooDeep { .. } => "decode_too_deep",
            DecodeError::TrailingBytes(_) => "decode_trailing_bytes",
            DecodeError::InvalidDate => "decode_invalid_date",
            DecodeError::Malformed(_) => "decode_malformed",
            DecodeError::TooLarge { .. } => "decode_too_large",
        }
    }
}

/// # Errors produced by the group transport.
///
/// Transport failures are never retried: delivery is at-most-once and best-effort.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The caller is not a member of the group.
    #[error("not entitled to group {0:?}")]
    NotEntitled(String),

    /// The staging area could not be read or written.
    #[error("staging i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The signal channel has been closed.
    #[error("signal channel closed")]
    Closed,

    /// The signal receiver fell behind and skipped `n` keys.
    #[error("signal receiver lagged by {0}")]
    Lagged(u64),

    /// A staged record could not be (de)serialized.
    #[error("malformed staged record: {0}")]
    Record(String),

    /// A staging key could not be parsed.
    #[error("malformed staging key {0:?}")]
    Key(String),
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::NotEntitled(_) => "transport_not_entitled",
            TransportError::Io(_) => "transport_io",
            TransportError::Closed => "transport_closed",
            TransportError::Lagged(_) => "transport_lagged",
            TransportError::Record(_) => "transport_bad_record",
            TransportError::Key(_) => "transport_bad_key",
        }
    }
}

/// # Errors that prevent a notification from being posted.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PostError {
    /// Notification names must not be empty.
    #[error("notification name is empty")]
    EmptyName,

    /// The payload could not be encoded; nothing was staged.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Staging or signalling failed; the post was not retried.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl PostError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use groupcast::PostError;
    ///
    /// assert_eq!(PostError::EmptyName.as_label(), "post_empty_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PostError::EmptyName => "post_empty_name",
            PostError::Encode(e) => e.as_label(),
            PostError::Transport(e) => e.as_label(),
        }
    }
}
