//! Structured payloads: value model, type whitelist and wire codec.
//!
//! ## Contents
//! - [`Value`], [`UserInfo`] the payload tree attached to a notification
//! - [`TypeTag`], [`AllowedTypes`] the closed set of types a receiver accepts
//! - [`PayloadCodec`] encoder/decoder enforcing the whitelist at decode time
//!
//! ## Flow
//! ```text
//! poster:   UserInfo ──► PayloadCodec::encode ──► Bytes (staged with the envelope)
//! receiver: Bytes ──► PayloadCodec::decode(bytes, entry.allowed) ──► UserInfo | DecodeError
//!                                                                     (per observer entry)
//! ```

mod codec;
mod types;
mod value;

pub use codec::{PayloadCodec, PAYLOAD_VERSION};
pub use types::{AllowedTypes, TypeTag};
pub use value::{LocalRef, UserInfo, Value};
