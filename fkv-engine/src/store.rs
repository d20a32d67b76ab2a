//! # Sharded Store
//!
//! Thread-safe typed key-space with per-key TTL metadata.
//!
//! ## Design Principles
//!
//! 1. **Sharded Locks**: one `RwLock` per shard reduces contention under
//!    concurrency; a single operation never touches more than one shard, so
//!    there is no cross-shard deadlock graph.
//! 2. **Pure-Function Sharding**: the shard for a key is `FNV1a32(key) mod
//!    ShardCount`. No key ever migrates shards.
//! 3. **Lazy Expiration**: every operation takes the shard's exclusive lock
//!    so an expired Item observed mid-read can be removed in the same
//!    critical section, rather than juggling a read-then-upgrade dance.
//! 4. **Closed Value Type**: `Value` is a fixed four-way enum; operations
//!    that would straddle types reject with `WRONGTYPE` instead of coercing.
//!
//! ## Structure Overview
//!
//! ```text
//! Store
//!   └── shards: Vec<Shard>
//!         └── Shard
//!               └── inner: RwLock<ShardInner>
//!                     └── map: HashMap<Bytes, Item, RandomState>
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ahash::RandomState;
use bytes::Bytes;
use hashbrown::HashSet;
use parking_lot::RwLock;

use fkv_common::{FkvError, FkvResult};

use crate::value::{Item, Value};

/// Shard count. A power of two so shard selection is a mask, not a modulo.
pub const SHARD_COUNT: usize = 256;

struct ShardInner {
    map: HashMap<Bytes, Item, RandomState>,
}

impl ShardInner {
    fn new(hash_state: RandomState) -> Self {
        ShardInner {
            map: HashMap::with_hasher(hash_state),
        }
    }
}

struct Shard {
    inner: RwLock<ShardInner>,
}

/// Sharded, TTL-aware, typed in-memory key-value store.
///
/// Safe for concurrent invocation from arbitrary callers; every method
/// acquires exactly one shard's lock for the duration of the call.
pub struct Store {
    shards: Vec<Shard>,
    shard_mask: usize,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates a store with the default shard count ([`SHARD_COUNT`]).
    pub fn new() -> Self {
        Self::with_shard_count(SHARD_COUNT)
    }

    /// Creates a store with a caller-provided shard count, normalized to the
    /// next power of two. Exposed mainly so tests can exercise collisions
    /// with a small shard count.
    pub fn with_shard_count(shards: usize) -> Self {
        let shard_count = shards.max(1).next_power_of_two();
        let hash_state = RandomState::new();
        let shard_vec = (0..shard_count)
            .map(|_| Shard {
                inner: RwLock::new(ShardInner::new(hash_state.clone())),
            })
            .collect();

        Store {
            shards: shard_vec,
            shard_mask: shard_count - 1,
        }
    }

    fn shard_for(&self, key: &[u8]) -> &Shard {
        &self.shards[fnv1a32(key) as usize & self.shard_mask]
    }

    /// Number of shards backing this store.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn ttl_to_deadline(ttl: Duration) -> Option<Instant> {
        if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        }
    }

    // -- String ------------------------------------------------------------

    /// Replaces any existing Item with a fresh String Item. Never fails.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Duration) {
        let shard = self.shard_for(&key);
        let mut inner = shard.inner.write();
        inner
            .map
            .insert(key, Item::new(Value::String(value), Self::ttl_to_deadline(ttl)));
    }

    /// Returns the string value for `key`.
    ///
    /// `Err(WrongType)` if the key holds a non-string Item; `Ok(None)` if
    /// absent or expired (the expired Item is removed as a side effect).
    pub fn get(&self, key: &[u8]) -> FkvResult<Option<Bytes>> {
        let shard = self.shard_for(key);
        let now = Instant::now();
        let mut inner = shard.inner.write();

        let item = match inner.map.get(key) {
            Some(item) => item,
            None => return Ok(None),
        };

        if item.is_expired(now) {
            inner.map.remove(key);
            return Ok(None);
        }

        match &item.value {
            Value::String(value) => Ok(Some(value.clone())),
            _ => Err(FkvError::WrongType),
        }
    }

    /// Removes `key` regardless of its type. Returns `true` if it existed.
    pub fn delete(&self, key: &[u8]) -> bool {
        let shard = self.shard_for(key);
        let mut inner = shard.inner.write();

        let existed = match inner.map.get(key) {
            Some(item) => !item.is_expired(Instant::now()),
            None => false,
        };

        inner.map.remove(key);
        existed
    }

    // -- Hash ----------------------------------------------------------------

    /// Sets `field` within the hash at `key`, creating the hash (and
    /// applying `ttl`) if `key` is absent or expired.
    ///
    /// Returns `true` if `field` was newly created. TTL is only applied
    /// when the Item itself is created; it is ignored on an existing hash.
    pub fn hset(&self, key: Bytes, field: Bytes, value: Bytes, ttl: Duration) -> FkvResult<bool> {
        let shard = self.shard_for(&key);
        let mut inner = shard.inner.write();
        let now = Instant::now();

        if matches!(inner.map.get(&key), Some(item) if item.is_expired(now)) {
            inner.map.remove(&key);
        }

        match inner.map.get_mut(&key) {
            Some(item) => match &mut item.value {
                Value::Hash(fields) => Ok(fields.insert(field, value).is_none()),
                _ => Err(FkvError::WrongType),
            },
            None => {
                let mut fields = HashMap::with_hasher(RandomState::new());
                fields.insert(field, value);
                inner.map.insert(
                    key,
                    Item::new(Value::Hash(fields), Self::ttl_to_deadline(ttl)),
                );
                Ok(true)
            }
        }
    }

    /// Returns the value of `field` within the hash at `key`.
    ///
    /// `None` if the key is absent, expired, or not a hash (or the field is
    /// missing) — hash reads never WRONGTYPE-error.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<Bytes> {
        let shard = self.shard_for(key);
        let now = Instant::now();
        let mut inner = shard.inner.write();

        let item = inner.map.get(key)?;
        if item.is_expired(now) {
            inner.map.remove(key);
            return None;
        }

        match &item.value {
            Value::Hash(fields) => fields.get(field).cloned(),
            _ => None,
        }
    }

    // -- List ------------------------------------------------------------

    /// Pushes `value` onto the head of the list at `key`, creating it (and
    /// applying `ttl`) if absent or expired. Returns the new list length.
    pub fn lpush(&self, key: Bytes, value: Bytes, ttl: Duration) -> FkvResult<i64> {
        let shard = self.shard_for(&key);
        let mut inner = shard.inner.write();
        let now = Instant::now();

        if matches!(inner.map.get(&key), Some(item) if item.is_expired(now)) {
            inner.map.remove(&key);
        }

        match inner.map.get_mut(&key) {
            Some(item) => match &mut item.value {
                Value::List(list) => {
                    list.push_front(value);
                    Ok(list.len() as i64)
                }
                _ => Err(FkvError::WrongType),
            },
            None => {
                let mut list = VecDeque::with_capacity(1);
                list.push_front(value);
                let len = list.len() as i64;
                inner
                    .map
                    .insert(key, Item::new(Value::List(list), Self::ttl_to_deadline(ttl)));
                Ok(len)
            }
        }
    }

    /// Pops a value off the head of the list at `key`.
    ///
    /// Deletes the key once the list becomes empty. `None` if absent,
    /// expired, empty, or not a list.
    pub fn lpop(&self, key: &[u8]) -> Option<Bytes> {
        let shard = self.shard_for(key);
        let mut inner = shard.inner.write();
        let now = Instant::now();

        let item = inner.map.get_mut(key)?;
        if item.is_expired(now) {
            inner.map.remove(key);
            return None;
        }

        let (popped, now_empty) = match &mut item.value {
            Value::List(list) => {
                let popped = list.pop_front();
                (popped, list.is_empty())
            }
            _ => (None, false),
        };

        if now_empty {
            inner.map.remove(key);
        }
        popped
    }

    /// Returns the inclusive `[start, stop]` slice of the list at `key`,
    /// with Python-style negative indices counting from the tail.
    ///
    /// Empty if the key is absent, expired, not a list, or the range is
    /// out of bounds.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Vec<Bytes> {
        let shard = self.shard_for(key);
        let mut inner = shard.inner.write();
        let now = Instant::now();

        let item = match inner.map.get(key) {
            Some(item) => item,
            None => return Vec::new(),
        };

        if item.is_expired(now) {
            inner.map.remove(key);
            return Vec::new();
        }

        let list = match &item.value {
            Value::List(list) => list,
            _ => return Vec::new(),
        };

        let len = list.len() as i64;
        if len == 0 {
            return Vec::new();
        }

        let start = normalize_index(start, len).max(0);
        let stop = normalize_index(stop, len).min(len - 1);

        if start > stop || start >= len {
            return Vec::new();
        }

        list.iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect()
    }

    // -- Set -----------------------------------------------------------------

    /// Adds `members` to the set at `key`, creating it if absent or
    /// expired. Input duplicates are deduplicated even on fresh creation.
    /// Returns the count of newly added distinct members.
    pub fn sadd(&self, key: Bytes, members: Vec<Bytes>) -> FkvResult<i64> {
        let shard = self.shard_for(&key);
        let mut inner = shard.inner.write();
        let now = Instant::now();

        if matches!(inner.map.get(&key), Some(item) if item.is_expired(now)) {
            inner.map.remove(&key);
        }

        match inner.map.get_mut(&key) {
            Some(item) => match &mut item.value {
                Value::Set(set) => {
                    let mut added = 0i64;
                    for member in members {
                        if set.insert(member) {
                            added += 1;
                        }
                    }
                    Ok(added)
                }
                _ => Err(FkvError::WrongType),
            },
            None => {
                let mut set = HashSet::with_hasher(RandomState::new());
                for member in members {
                    set.insert(member);
                }
                let added = set.len() as i64;
                inner.map.insert(key, Item::new(Value::Set(set), None));
                Ok(added)
            }
        }
    }

    /// Returns all members of the set at `key`.
    ///
    /// Empty if the key is absent, expired, or not a set.
    pub fn smembers(&self, key: &[u8]) -> Vec<Bytes> {
        let shard = self.shard_for(key);
        let now = Instant::now();
        let mut inner = shard.inner.write();

        let item = match inner.map.get(key) {
            Some(item) => item,
            None => return Vec::new(),
        };

        if item.is_expired(now) {
            inner.map.remove(key);
            return Vec::new();
        }

        match &item.value {
            Value::Set(set) => set.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns whether `member` belongs to the set at `key`.
    ///
    /// `false` if the key is absent, expired, or not a set.
    pub fn sismember(&self, key: &[u8], member: &[u8]) -> bool {
        let shard = self.shard_for(key);
        let now = Instant::now();
        let mut inner = shard.inner.write();

        let item = match inner.map.get(key) {
            Some(item) => item,
            None => return false,
        };

        if item.is_expired(now) {
            inner.map.remove(key);
            return false;
        }

        match &item.value {
            Value::Set(set) => set.contains(member),
            _ => false,
        }
    }

    // -- Janitor support -----------------------------------------------------

    /// Removes expired entries from every shard. Intended for periodic use
    /// by the Janitor; not required for correctness (lazy expiration
    /// already hides expired keys from reads).
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut inner = shard.inner.write();
            let expired_keys: Vec<Bytes> = inner
                .map
                .iter()
                .filter(|(_, item)| item.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in expired_keys {
                inner.map.remove(&key);
                removed += 1;
            }
        }
        removed
    }
}

/// `idx < 0` counts from the tail (`-1` is the last element).
fn normalize_index(idx: i64, len: i64) -> i64 {
    if idx < 0 {
        len + idx
    } else {
        idx
    }
}

/// Hashes a key to a 32-bit digest for shard selection.
///
/// FNV-1a; deterministic and dependency-free, matching the "pure function
/// of the key bytes" sharding invariant.
fn fnv1a32(key: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    for &byte in key {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(data: &str) -> Bytes {
        Bytes::copy_from_slice(data.as_bytes())
    }

    #[test]
    fn set_get_roundtrip() {
        let store = Store::with_shard_count(4);
        store.set(b("alpha"), b("value"), Duration::ZERO);
        assert_eq!(store.get(b"alpha").unwrap(), Some(b("value")));
    }

    #[test]
    fn delete_removes_key() {
        let store = Store::with_shard_count(2);
        store.set(b("alpha"), b("value"), Duration::ZERO);
        assert!(store.delete(b"alpha"));
        assert_eq!(store.get(b"alpha").unwrap(), None);
        assert!(!store.delete(b"alpha"));
    }

    #[test]
    fn expire_hides_value() {
        let store = Store::with_shard_count(2);
        store.set(b("alpha"), b("value"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(store.get(b"alpha").unwrap(), None);
    }

    #[test]
    fn set_never_errors_on_type_mismatch() {
        let store = Store::with_shard_count(2);
        store.lpush(b("k"), b("v"), Duration::ZERO).unwrap();
        store.set(b("k"), b("str"), Duration::ZERO);
        assert_eq!(store.get(b"k").unwrap(), Some(b("str")));
    }

    #[test]
    fn get_wrong_type_errors() {
        let store = Store::with_shard_count(2);
        store.lpush(b("k"), b("v"), Duration::ZERO).unwrap();
        assert_eq!(store.get(b"k"), Err(FkvError::WrongType));
    }

    #[test]
    fn hset_tracks_creation() {
        let store = Store::with_shard_count(2);
        assert!(store.hset(b("h"), b("f"), b("1"), Duration::ZERO).unwrap());
        assert!(!store.hset(b("h"), b("f"), b("2"), Duration::ZERO).unwrap());
        assert_eq!(store.hget(b"h", b"f"), Some(b("2")));
    }

    #[test]
    fn hset_rejects_wrong_type() {
        let store = Store::with_shard_count(2);
        store.set(b("k"), b("v"), Duration::ZERO);
        assert_eq!(
            store.hset(b("k"), b("f"), b("v"), Duration::ZERO),
            Err(FkvError::WrongType)
        );
    }

    #[test]
    fn lpush_lpop_order() {
        let store = Store::with_shard_count(2);
        assert_eq!(store.lpush(b("l"), b("a"), Duration::ZERO).unwrap(), 1);
        assert_eq!(store.lpush(b("l"), b("b"), Duration::ZERO).unwrap(), 2);
        assert_eq!(store.lpop(b"l"), Some(b("b")));
        assert_eq!(store.lpop(b"l"), Some(b("a")));
        assert_eq!(store.lpop(b"l"), None);
    }

    #[test]
    fn lpop_deletes_key_when_empty() {
        let store = Store::with_shard_count(2);
        store.lpush(b("l"), b("a"), Duration::ZERO).unwrap();
        store.lpop(b"l");
        assert_eq!(store.lrange(b"l", 0, -1), Vec::<Bytes>::new());
    }

    #[test]
    fn lrange_negative_indices() {
        let store = Store::with_shard_count(2);
        store.lpush(b("l"), b("a"), Duration::ZERO).unwrap();
        store.lpush(b("l"), b("b"), Duration::ZERO).unwrap();
        store.lpush(b("l"), b("c"), Duration::ZERO).unwrap();
        // list head-to-tail is [c, b, a]
        assert_eq!(store.lrange(b"l", 0, -1), vec![b("c"), b("b"), b("a")]);
        assert_eq!(store.lrange(b"l", -2, -1), vec![b("b"), b("a")]);
        assert_eq!(store.lrange(b"l", 5, 10), Vec::<Bytes>::new());
    }

    #[test]
    fn sadd_dedupes_on_fresh_create() {
        let store = Store::with_shard_count(2);
        let added = store.sadd(b("s"), vec![b("a"), b("a"), b("b")]).unwrap();
        assert_eq!(added, 2);
        let mut members = store.smembers(b"s");
        members.sort();
        assert_eq!(members, vec![b("a"), b("b")]);
    }

    #[test]
    fn sadd_rejects_wrong_type() {
        let store = Store::with_shard_count(2);
        store.set(b("k"), b("v"), Duration::ZERO);
        assert_eq!(store.sadd(b("k"), vec![b("x")]), Err(FkvError::WrongType));
    }

    #[test]
    fn sismember_reports_membership() {
        let store = Store::with_shard_count(2);
        store.sadd(b("s"), vec![b("a")]).unwrap();
        assert!(store.sismember(b"s", b"a"));
        assert!(!store.sismember(b"s", b"b"));
        assert!(!store.sismember(b"missing", b"a"));
    }

    #[test]
    fn purge_expired_removes_entries() {
        let store = Store::with_shard_count(2);
        store.set(b("alpha"), b("value"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));

        let removed = store.purge_expired(Instant::now());
        assert_eq!(removed, 1);
    }

    #[test]
    fn concurrent_mixed_workload_does_not_corrupt_state() {
        use std::sync::Arc;

        const TASKS: usize = 100;
        const OPS_PER_TASK: usize = 200;
        const KEY_SPACE: usize = 8;

        let store = Arc::new(Store::with_shard_count(16));
        let handles: Vec<_> = (0..TASKS)
            .map(|task_id| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..OPS_PER_TASK {
                        let key = b(&format!("key-{}", (task_id + i) % KEY_SPACE));
                        match i % 3 {
                            0 => store.set(key, b("value"), Duration::ZERO),
                            1 => {
                                let _ = store.get(&key);
                            }
                            _ => {
                                store.delete(&key);
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread panicked");
        }

        // Every key is either gone or holds the only value this workload
        // ever writes; no operation should have observed anything else.
        for i in 0..KEY_SPACE {
            let key = b(&format!("key-{i}"));
            match store.get(&key) {
                Ok(Some(value)) => assert_eq!(value, b("value")),
                Ok(None) => {}
                Err(err) => panic!("unexpected error for {key:?}: {err:?}"),
            }
        }
    }

    #[test]
    fn hset_ttl_only_applies_on_creation() {
        let store = Store::with_shard_count(2);
        store
            .hset(b("h"), b("f1"), b("1"), Duration::from_millis(5))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        // The hash itself should have expired, not just refreshed.
        assert_eq!(store.hget(b"h", b"f1"), None);
    }
}
