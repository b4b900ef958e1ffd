//! # Notification
//!
//! The value observers receive. `object`, when present, is always a plain string:
//! notifications cross process boundaries, so object references cannot be carried.
//!
//! ## Example
//! ```rust
//! use groupcast::{Notification, Value};
//!
//! let note = Notification::new("sync")
//!     .with_object("doc1")
//!     .with_entry("rev", Value::from(3));
//!
//! assert_eq!(note.name(), "sync");
//! assert_eq!(note.object(), Some("doc1"));
//! assert_eq!(note.user_info().and_then(|u| u["rev"].as_i64()), Some(3));
//! ```

use crate::payload::{UserInfo, Value};

/// A named event with an optional string object and optional payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    name: String,
    object: Option<String>,
    user_info: Option<UserInfo>,
}

impl Notification {
    /// Creates a notification without object or payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object: None,
            user_info: None,
        }
    }

    /// Attaches an object string.
    #[inline]
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Replaces the payload.
    #[inline]
    pub fn with_user_info(mut self, user_info: UserInfo) -> Self {
        self.user_info = Some(user_info);
        self
    }

    /// Inserts one payload entry, creating the payload if needed.
    #[inline]
    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.user_info
            .get_or_insert_with(UserInfo::new)
            .insert(key.into(), value);
        self
    }

    pub(crate) fn from_parts(
        name: impl Into<String>,
        object: Option<String>,
        user_info: Option<UserInfo>,
    ) -> Self {
        Self {
            name: name.into(),
            object,
            user_info,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object(&self) -> Option<&str> {
        self.object.as_deref()
    }

    /// The decoded payload. `None` when nothing was posted or when the receiving
    /// entry's whitelist rejected it.
    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    pub fn into_user_info(self) -> Option<UserInfo> {
        self.user_info
    }
}
