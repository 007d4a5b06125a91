//! Bounded, expiry-aware result caches
//!
//! Two layers live here. [`LruCache`] is a plain bounded map with
//! least-recently-used eviction, shared by the key-format detector and the
//! token caches. [`ResultCache`] wraps it with the token-cache semantics:
//! each entry stores a full outcome (success or error) together with the
//! wall-clock window in which that outcome remains correct, and entries
//! whose window has been crossed are discarded lazily on the next lookup.
//! There is no background sweep.

use std::{
    borrow::Borrow,
    collections::{HashMap, VecDeque},
    hash::Hash,
};

use parking_lot::Mutex;

use crate::error::{Error, ErrorKind};

/// A bounded map with least-recently-used eviction
///
/// Lookups promote the key; inserts over capacity evict the stalest key.
/// Last write wins on concurrent inserts for the same key.
#[derive(Debug)]
pub(crate) struct LruCache<K, V> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn promote<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        if let Some(pos) = self.order.iter().position(|k| k.borrow() == key) {
            let key = self.order.remove(pos).expect("position is in bounds");
            self.order.push_back(key);
        }
    }

    pub(crate) fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        if self.map.contains_key(key) {
            self.promote(key);
        }
        self.map.get(key)
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        if self.map.insert(key.clone(), value).is_some() {
            self.promote(&key);
            return;
        }
        self.order.push_back(key);
        if self.map.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            }
        }
    }

    pub(crate) fn remove<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        if self.map.remove(key).is_some() {
            if let Some(pos) = self.order.iter().position(|k| k.borrow() == key) {
                self.order.remove(pos);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }
}

/// A cached outcome plus the wall-clock window it stays correct in
///
/// `valid_from_ms`/`expires_at_ms` are epoch milliseconds; 0 means "not
/// applicable". For a success they are the token's own validity bounds; for
/// a not-yet-valid error, `valid_from_ms` records the moment the token
/// becomes active (and the error stale).
#[derive(Clone, Debug)]
pub(crate) struct CachedOutcome<T> {
    pub(crate) outcome: Result<T, Error>,
    pub(crate) valid_from_ms: u64,
    pub(crate) expires_at_ms: u64,
}

impl<T> CachedOutcome<T> {
    /// An outcome with no time window; it never self-invalidates.
    pub(crate) fn stable(outcome: Result<T, Error>) -> Self {
        Self {
            outcome,
            valid_from_ms: 0,
            expires_at_ms: 0,
        }
    }

    fn is_stale(&self, now_ms: u64) -> bool {
        match &self.outcome {
            Ok(_) => {
                (self.valid_from_ms > 0 && now_ms < self.valid_from_ms)
                    || (self.expires_at_ms > 0 && now_ms >= self.expires_at_ms)
            }
            // "Not yet valid" stops being true once the boundary passes;
            // every other failure is permanent for a given token
            Err(err) if err.kind() == ErrorKind::Inactive => {
                self.valid_from_ms > 0 && now_ms >= self.valid_from_ms
            }
            Err(_) => false,
        }
    }
}

/// Token-keyed cache of decode/verify outcomes
#[derive(Debug)]
pub(crate) struct ResultCache<T> {
    inner: Mutex<LruCache<String, CachedOutcome<T>>>,
}

impl<T: Clone> ResultCache<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the cached outcome for `token`, discarding it first if its
    /// recorded window has been crossed.
    pub(crate) fn lookup(&self, token: &str, now_ms: u64) -> Option<Result<T, Error>> {
        let mut cache = self.inner.lock();
        let stale = match cache.get(token) {
            Some(entry) => entry.is_stale(now_ms),
            None => return None,
        };
        if stale {
            cache.remove(token);
            return None;
        }
        cache.get(token).map(|entry| entry.outcome.clone())
    }

    pub(crate) fn store(&self, token: &str, entry: CachedOutcome<T>) {
        self.inner.lock().insert(token.to_owned(), entry);
    }
}
