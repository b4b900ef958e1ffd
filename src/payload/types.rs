//! # Structural type whitelist.
//!
//! A [`TypeTag`] names one structural type that may appear in an encoded payload.
//! An [`AllowedTypes`] set is attached to every observer entry and consulted by the
//! decoder before the body of each value is read.
//!
//! ## Baseline
//! An empty set means the property-list family:
//! `Bool`, `Integer`, `Real`, `String`, `Data`, `Date`, `Array`, `Dictionary`.
//! `Uuid` and named records must always be listed explicitly.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// One structural type that may appear inside a payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    Bool,
    Integer,
    Real,
    String,
    Data,
    Date,
    Uuid,
    Array,
    Dictionary,
    /// A named record type, e.g. `Record("com.example.Point")`.
    Record(Arc<str>),
}

impl TypeTag {
    /// Shorthand for [`TypeTag::Record`].
    pub fn record(type_name: impl Into<Arc<str>>) -> Self {
        TypeTag::Record(type_name.into())
    }

    /// True for the property-list family.
    pub fn is_property_list(&self) -> bool {
        matches!(
            self,
            TypeTag::Bool
                | TypeTag::Integer
                | TypeTag::Real
                | TypeTag::String
                | TypeTag::Data
                | TypeTag::Date
                | TypeTag::Array
                | TypeTag::Dictionary
        )
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Bool => f.write_str("bool"),
            TypeTag::Integer => f.write_str("integer"),
            TypeTag::Real => f.write_str("real"),
            TypeTag::String => f.write_str("string"),
            TypeTag::Data => f.write_str("data"),
            TypeTag::Date => f.write_str("date"),
            TypeTag::Uuid => f.write_str("uuid"),
            TypeTag::Array => f.write_str("array"),
            TypeTag::Dictionary => f.write_str("dictionary"),
            TypeTag::Record(name) => write!(f, "record<{name}>"),
        }
    }
}

/// Closed set of types permitted when decoding a received payload.
///
/// An empty set behaves as [`AllowedTypes::property_list`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AllowedTypes {
    tags: BTreeSet<TypeTag>,
}

impl AllowedTypes {
    /// Creates a whitelist from the given tags. An empty iterator yields the baseline.
    pub fn new(tags: impl IntoIterator<Item = TypeTag>) -> Self {
        Self {
            tags: tags.into_iter().collect(),
        }
    }

    /// The property-list baseline.
    pub fn property_list() -> Self {
        Self::new([
            TypeTag::Bool,
            TypeTag::Integer,
            TypeTag::Real,
            TypeTag::String,
            TypeTag::Data,
            TypeTag::Date,
            TypeTag::Array,
            TypeTag::Dictionary,
        ])
    }

    /// Adds a tag, returning the extended set.
    #[must_use]
    pub fn with(mut self, tag: TypeTag) -> Self {
        self.tags.insert(tag);
        self
    }

    /// True if no tags were given (the baseline applies).
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Checks a tag against the effective set.
    pub fn permits(&self, tag: &TypeTag) -> bool {
        if self.tags.is_empty() {
            tag.is_property_list()
        } else {
            self.tags.contains(tag)
        }
    }

    /// Iterates over the explicitly listed tags.
    pub fn iter(&self) -> impl Iterator<Item = &TypeTag> {
        self.tags.iter()
    }
}

impl FromIterator<TypeTag> for AllowedTypes {
    fn from_iter<I: IntoIterator<Item = TypeTag>>(iter: I) -> Self {
        Self::new(iter)
    }
}
