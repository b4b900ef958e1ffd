//! # Staging keys.
//!
//! A [`StageKey`] addresses one staged envelope. Its `topic` is derived
//! deterministically from the group identifier and notification name; its `post`
//! part is unique per post so back-to-back posts of one name never overwrite each
//! other in the staging area.
//!
//! Textual form (also used as the file name by `DirStore`):
//! ```text
//! <32 hex chars: sha256(group ‖ 0x00 ‖ name)[..16]>.<uuid, simple form>
//! ```

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::TransportError;

const TOPIC_LEN: usize = 32;

/// Address of one staged envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageKey {
    topic: String,
    post: Uuid,
}

impl StageKey {
    /// Creates a fresh key for one post of `name` in `group`.
    pub fn new(group: &str, name: &str) -> Self {
        Self {
            topic: topic_for(group, name),
            post: Uuid::new_v4(),
        }
    }

    /// Deterministic `(group, name)` part.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Per-post part.
    pub fn post(&self) -> Uuid {
        self.post
    }
}

/// Hex topic shared by every post of `name` in `group`.
pub fn topic_for(group: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(group.as_bytes());
    hasher.update([0u8]);
    hasher.update(name.as_bytes());
    hex::encode(&hasher.finalize()[..TOPIC_LEN / 2])
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.topic, self.post.simple())
    }
}

impl FromStr for StageKey {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TransportError::Key(s.to_string());
        let (topic, post) = s.split_once('.').ok_or_else(bad)?;
        if topic.len() != TOPIC_LEN || !topic.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let post = Uuid::parse_str(post).map_err(|_| bad())?;
        Ok(Self {
            topic: topic.to_ascii_lowercase(),
            post,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_deterministic_per_group_and_name() {
        assert_eq!(topic_for("g", "sync"), topic_for("g", "sync"));
        assert_ne!(topic_for("g", "sync"), topic_for("h", "sync"));
        assert_ne!(topic_for("g", "sync"), topic_for("g", "other"));
        // the separator keeps ("ab", "c") and ("a", "bc") apart
        assert_ne!(topic_for("ab", "c"), topic_for("a", "bc"));
        assert_eq!(topic_for("g", "sync").len(), TOPIC_LEN);
    }

    #[test]
    fn posts_of_one_name_get_distinct_keys() {
        let a = StageKey::new("g", "sync");
        let b = StageKey::new("g", "sync");
        assert_eq!(a.topic(), b.topic());
        assert_ne!(a, b);
    }

    #[test]
    fn textual_form_parses_back() {
        let key = StageKey::new("group.example", "sync");
        let parsed: StageKey = key.to_string().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for bad in ["", "nodot", "zz.00000000000000000000000000000000", "0123456789abcdef0123456789abcdef.nope"] {
            assert!(bad.parse::<StageKey>().is_err(), "{bad:?} should not parse");
        }
    }
}
