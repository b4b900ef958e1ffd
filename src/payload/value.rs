//! # Payload values.
//!
//! [`Value`] is the tree carried in a notification's `user_info`. Every variant except
//! [`Value::Local`] is coding-safe and can cross a process boundary. `Local` exists so
//! that an in-process caller can attach an object reference the way it would on an
//! in-process bus; the codec refuses it with `EncodeError::Unsupported`.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use uuid::Uuid;

use super::TypeTag;

/// Payload root: string keys to values.
pub type UserInfo = BTreeMap<String, Value>;

/// In-process object reference. Never encodable.
#[derive(Clone)]
pub struct LocalRef {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl LocalRef {
    /// Wraps an object.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Rust type name of the wrapped object.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrows the wrapped object if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalRef<{}>", self.type_name)
    }
}

impl PartialEq for LocalRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A node of a structured payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Data(Vec<u8>),
    Date(SystemTime),
    Uuid(Uuid),
    Array(Vec<Value>),
    Dictionary(BTreeMap<String, Value>),
    /// A named secure-coded type; decoders must list `TypeTag::Record(type_name)`.
    Record {
        type_name: String,
        fields: BTreeMap<String, Value>,
    },
    /// In-process only.
    Local(LocalRef),
}

impl Value {
    /// Builds a [`Value::Record`].
    pub fn record(
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        Value::Record {
            type_name: type_name.into(),
            fields: fields.into_iter().collect(),
        }
    }

    /// Wraps an in-process object.
    pub fn local<T: Any + Send + Sync>(value: T) -> Self {
        Value::Local(LocalRef::new(value))
    }

    /// Structural tag of this value, `None` for [`Value::Local`].
    pub fn type_tag(&self) -> Option<TypeTag> {
        Some(match self {
            Value::Bool(_) => TypeTag::Bool,
            Value::Integer(_) => TypeTag::Integer,
            Value::Real(_) => TypeTag::Real,
            Value::String(_) => TypeTag::String,
            Value::Data(_) => TypeTag::Data,
            Value::Date(_) => TypeTag::Date,
            Value::Uuid(_) => TypeTag::Uuid,
            Value::Array(_) => TypeTag::Array,
            Value::Dictionary(_) => TypeTag::Dictionary,
            Value::Record { type_name, .. } => TypeTag::record(type_name.as_str()),
            Value::Local(_) => return None,
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Data(v)
    }
}

impl From<SystemTime> for Value {
    fn from(v: SystemTime) -> Self {
        Value::Date(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Dictionary(v)
    }
}
