//! # Payload codec.
//!
//! Encodes a [`UserInfo`] tree into a compact tagged byte stream and back.
//!
//! ## Wire layout
//! ```text
//! payload    := version:u8 entries
//! entries    := count:u32 (key:string value)*
//! value      := tag:u8 body
//!   0x01 bool        u8 (0 | 1)
//!   0x02 integer     i64
//!   0x03 real        f64
//!   0x04 string      len:u32 utf8
//!   0x05 data        len:u32 bytes
//!   0x06 date        secs:i64 nanos:u32   (relative to the unix epoch)
//!   0x07 uuid        16 bytes
//!   0x10 array       count:u32 value*
//!   0x11 dictionary  entries
//!   0x12 record      type_name:string entries
//! ```
//! All integers are big-endian.
//!
//! ## Rules
//! - The decoder checks every tag against the receiver's [`AllowedTypes`] **before**
//!   reading its body; one violation aborts the whole decode.
//! - Nothing partial is ever returned: the caller gets the full tree or an error.
//! - Unknown tags and non-canonical bodies are rejected, never coerced.
//! - The root dictionary is implicit and always allowed.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use super::{AllowedTypes, TypeTag, UserInfo, Value};
use crate::error::{DecodeError, EncodeError};

/// Current payload format version.
pub const PAYLOAD_VERSION: u8 = 1;

const TAG_BOOL: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_REAL: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_DATA: u8 = 0x05;
const TAG_DATE: u8 = 0x06;
const TAG_UUID: u8 = 0x07;
const TAG_ARRAY: u8 = 0x10;
const TAG_DICTIONARY: u8 = 0x11;
const TAG_RECORD: u8 = 0x12;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Stateless encoder/decoder bounded by size and nesting limits.
#[derive(Debug, Clone, Copy)]
pub struct PayloadCodec {
    max_bytes: usize,
    max_depth: usize,
}

impl Default for PayloadCodec {
    /// 1 MiB, 64 levels.
    fn default() -> Self {
        Self::new(1 << 20, 64)
    }
}

impl PayloadCodec {
    /// Creates a codec with the given limits (each clamped to a minimum of 1).
    pub fn new(max_bytes: usize, max_depth: usize) -> Self {
        Self {
            max_bytes: max_bytes.max(1),
            max_depth: max_depth.max(1),
        }
    }

    /// Encodes a payload.
    ///
    /// Fails if any value is not coding-safe, if containers nest deeper than the
    /// configured depth, or if the output exceeds the configured size.
    pub fn encode(&self, info: &UserInfo) -> Result<Bytes, EncodeError> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(PAYLOAD_VERSION);
        self.put_entries(&mut buf, info, 0)?;

        if buf.len() > self.max_bytes {
            return Err(EncodeError::TooLarge {
                size: buf.len(),
                limit: self.max_bytes,
            });
        }
        Ok(buf.freeze())
    }

    /// Decodes a payload, admitting only the types in `allowed`.
    pub fn decode(&self, bytes: &[u8], allowed: &AllowedTypes) -> Result<UserInfo, DecodeError> {
        if bytes.len() > self.max_bytes {
            return Err(DecodeError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }

        let mut buf = bytes;
        let version = get_u8(&mut buf)?;
        if version != PAYLOAD_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let info = self.read_entries(&mut buf, allowed, 0)?;
        if buf.has_remaining() {
            return Err(DecodeError::TrailingBytes(buf.remaining()));
        }
        Ok(info)
    }

    // ---------------------------
    // Encoding
    // ---------------------------

    fn put_entries(
        &self,
        buf: &mut BytesMut,
        entries: &BTreeMap<String, Value>,
        depth: usize,
    ) -> Result<(), EncodeError> {
        self.put_len(buf, entries.len())?;
        for (key, value) in entries {
            self.put_str(buf, key)?;
            self.put_value(buf, value, depth + 1)
                .map_err(|e| within(e, key))?;
        }
        Ok(())
    }

    fn put_value(&self, buf: &mut BytesMut, value: &Value, depth: usize) -> Result<(), EncodeError> {
        if buf.len() > self.max_bytes {
            return Err(EncodeError::TooLarge {
                size: buf.len(),
                limit: self.max_bytes,
            });
        }

        match value {
            Value::Bool(b) => {
                buf.put_u8(TAG_BOOL);
                buf.put_u8(u8::from(*b));
            }
            Value::Integer(n) => {
                buf.put_u8(TAG_INTEGER);
                buf.put_i64(*n);
            }
            Value::Real(r) => {
                buf.put_u8(TAG_REAL);
                buf.put_f64(*r);
            }
            Value::String(s) => {
                buf.put_u8(TAG_STRING);
                self.put_str(buf, s)?;
            }
            Value::Data(d) => {
                buf.put_u8(TAG_DATA);
                self.put_len(buf, d.len())?;
                buf.put_slice(d);
            }
            Value::Date(t) => {
                let (secs, nanos) = split_date(*t);
                buf.put_u8(TAG_DATE);
                buf.put_i64(secs);
                buf.put_u32(nanos);
            }
            Value::Uuid(u) => {
                buf.put_u8(TAG_UUID);
                buf.put_slice(u.as_bytes());
            }
            Value::Array(items) => {
                self.enter(depth)?;
                buf.put_u8(TAG_ARRAY);
                self.put_len(buf, items.len())?;
                for (i, item) in items.iter().enumerate() {
                    self.put_value(buf, item, depth + 1)
                        .map_err(|e| within(e, &i.to_string()))?;
                }
            }
            Value::Dictionary(entries) => {
                self.enter(depth)?;
                buf.put_u8(TAG_DICTIONARY);
                self.put_entries(buf, entries, depth)?;
            }
            Value::Record { type_name, fields } => {
                self.enter(depth)?;
                buf.put_u8(TAG_RECORD);
                self.put_str(buf, type_name)?;
                self.put_entries(buf, fields, depth)?;
            }
            Value::Local(local) => {
                return Err(EncodeError::Unsupported {
                    path: String::new(),
                    type_name: local.type_name(),
                });
            }
        }
        Ok(())
    }

    fn put_str(&self, buf: &mut BytesMut, s: &str) -> Result<(), EncodeError> {
        self.put_len(buf, s.len())?;
        buf.put_slice(s.as_bytes());
        Ok(())
    }

    fn put_len(&self, buf: &mut BytesMut, len: usize) -> Result<(), EncodeError> {
        let n = u32::try_from(len).map_err(|_| EncodeError::TooLarge {
            size: len,
            limit: self.max_bytes,
        })?;
        buf.put_u32(n);
        Ok(())
    }

    fn enter(&self, depth: usize) -> Result<(), EncodeError> {
        if depth > self.max_depth {
            return Err(EncodeError::TooDeep {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    // ---------------------------
    // Decoding
    // ---------------------------

    fn read_entries(
        &self,
        buf: &mut &[u8],
        allowed: &AllowedTypes,
        depth: usize,
    ) -> Result<BTreeMap<String, Value>, DecodeError> {
        let count = get_count(buf)?;
        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let key = get_string(buf)?;
            let value = self.read_value(buf, allowed, depth + 1)?;
            if entries.insert(key, value).is_some() {
                return Err(DecodeError::Malformed("duplicate key"));
            }
        }
        Ok(entries)
    }

    fn read_value(
        &self,
        buf: &mut &[u8],
        allowed: &AllowedTypes,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        let tag = get_u8(buf)?;

        let (kind, record_name) = match tag {
            TAG_BOOL => (TypeTag::Bool, None),
            TAG_INTEGER => (TypeTag::Integer, None),
            TAG_REAL => (TypeTag::Real, None),
            TAG_STRING => (TypeTag::String, None),
            TAG_DATA => (TypeTag::Data, None),
            TAG_DATE => (TypeTag::Date, None),
            TAG_UUID => (TypeTag::Uuid, None),
            TAG_ARRAY => (TypeTag::Array, None),
            TAG_DICTIONARY => (TypeTag::Dictionary, None),
            TAG_RECORD => {
                let name = get_string(buf)?;
                (TypeTag::record(name.as_str()), Some(name))
            }
            other => return Err(DecodeError::UnknownTag(other)),
        };
        if !allowed.permits(&kind) {
            return Err(DecodeError::Disallowed(kind));
        }

        let value = match tag {
            TAG_BOOL => match get_u8(buf)? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                _ => return Err(DecodeError::Malformed("bool")),
            },
            TAG_INTEGER => {
                need(buf, 8)?;
                Value::Integer(buf.get_i64())
            }
            TAG_REAL => {
                need(buf, 8)?;
                Value::Real(buf.get_f64())
            }
            TAG_STRING => Value::String(get_string(buf)?),
            TAG_DATA => {
                let len = get_count(buf)?;
                need(buf, len)?;
                let data = buf[..len].to_vec();
                buf.advance(len);
                Value::Data(data)
            }
            TAG_DATE => {
                need(buf, 12)?;
                let secs = buf.get_i64();
                let nanos = buf.get_u32();
                Value::Date(join_date(secs, nanos)?)
            }
            TAG_UUID => {
                need(buf, 16)?;
                let mut raw = [0u8; 16];
                buf.copy_to_slice(&mut raw);
                Value::Uuid(Uuid::from_bytes(raw))
            }
            TAG_ARRAY => {
                self.descend(depth)?;
                let count = get_count(buf)?;
                let mut items = Vec::with_capacity(count.min(buf.remaining()));
                for _ in 0..count {
                    items.push(self.read_value(buf, allowed, depth + 1)?);
                }
                Value::Array(items)
            }
            TAG_DICTIONARY => {
                self.descend(depth)?;
                Value::Dictionary(self.read_entries(buf, allowed, depth)?)
            }
            _ => {
                self.descend(depth)?;
                let fields = self.read_entries(buf, allowed, depth)?;
                Value::Record {
                    type_name: record_name.unwrap_or_default(),
                    fields,
                }
            }
        };
        Ok(value)
    }

    fn descend(&self, depth: usize) -> Result<(), DecodeError> {
        if depth > self.max_depth {
            return Err(DecodeError::TooDeep {
                max: self.max_depth,
            });
        }
        Ok(())
    }
}

/// Prefixes the error path of an `Unsupported` error with `segment`.
fn within(err: EncodeError, segment: &str) -> EncodeError {
    match err {
        EncodeError::Unsupported { path, type_name } => EncodeError::Unsupported {
            path: if path.is_empty() {
                segment.to_string()
            } else {
                format!("{segment}.{path}")
            },
            type_name,
        },
        other => other,
    }
}

fn split_date(t: SystemTime) -> (i64, u32) {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => (
            i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            d.subsec_nanos(),
        ),
        Err(e) => {
            let d = e.duration();
            let secs = i64::try_from(d.as_secs()).unwrap_or(i64::MAX);
            match d.subsec_nanos() {
                0 => (-secs, 0),
                n => (-secs - 1, NANOS_PER_SEC - n),
            }
        }
    }
}

fn join_date(secs: i64, nanos: u32) -> Result<SystemTime, DecodeError> {
    if nanos >= NANOS_PER_SEC {
        return Err(DecodeError::InvalidDate);
    }
    let t = if secs >= 0 {
        UNIX_EPOCH.checked_add(Duration::new(secs.unsigned_abs(), nanos))
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::from_secs(secs.unsigned_abs()))
            .and_then(|t| t.checked_add(Duration::from_nanos(u64::from(nanos))))
    };
    t.ok_or(DecodeError::InvalidDate)
}

fn need(buf: &&[u8], n: usize) -> Result<(), DecodeError> {
    if buf.remaining() < n {
        return Err(DecodeError::Truncated);
    }
    Ok(())
}

fn get_u8(buf: &mut &[u8]) -> Result<u8, DecodeError> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

/// Reads a u32 length/count. Every element takes at least one byte, so a count
/// larger than the remaining input is rejected before anything is allocated.
fn get_count(buf: &mut &[u8]) -> Result<usize, DecodeError> {
    need(buf, 4)?;
    let n = buf.get_u32() as usize;
    if n > buf.remaining() {
        return Err(DecodeError::Truncated);
    }
    Ok(n)
}

fn get_string(buf: &mut &[u8]) -> Result<String, DecodeError> {
    let len = get_count(buf)?;
    let s = std::str::from_utf8(&buf[..len])
        .map_err(|_| DecodeError::InvalidUtf8)?
        .to_string();
    buf.advance(len);
    Ok(s)
}
