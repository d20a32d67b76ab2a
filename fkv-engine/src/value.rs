//! # Value Model
//!
//! The closed set of value kinds a key can hold, plus the per-key metadata
//! (`Item`) the store tracks alongside it. Keeping this as a sum type (never
//! an open trait) matches the single `Item` field in the original design:
//! one key, one type, for its whole lifetime.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use ahash::RandomState;
use bytes::Bytes;
use hashbrown::HashSet;

/// Discriminant for [`Value`], used in `WRONGTYPE` diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    List,
    Set,
    Hash,
}

/// The stored payload for a key.
///
/// `List` is backed by a `VecDeque` — a growable ring buffer — which gives
/// O(1) head push/pop and O(1) indexed access from either end, satisfying
/// the "doubly-linked sequence" contract without an intrusive linked list.
#[derive(Debug, Clone)]
pub enum Value {
    String(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes, RandomState>),
    Hash(HashMap<Bytes, Bytes, RandomState>),
}

impl Value {
    pub fn type_tag(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Set(_) => ValueType::Set,
            Value::Hash(_) => ValueType::Hash,
        }
    }
}

/// A stored value plus its expiration metadata.
///
/// `expires_at` is `None` for "no expiration", mirroring the sentinel-free
/// `Option` idiom rather than the zero-means-infinite convention the
/// original store used.
#[derive(Debug, Clone)]
pub struct Item {
    pub value: Value,
    pub expires_at: Option<Instant>,
}

impl Item {
    pub fn new(value: Value, expires_at: Option<Instant>) -> Self {
        Item { value, expires_at }
    }

    /// True once `now` has passed the expiration instant.
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now >= deadline)
    }
}
