//! In-memory cache backend.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::debug;

use super::{CacheClient, CacheStats, MAX_VALUE_SIZE};
use crate::error::CacheError;

/// In-process cache backed by a `Mutex<HashMap>`.
///
/// Follows memcached's rules for keys and value size. With a byte capacity
/// set, inserting past the limit evicts the oldest entries first and bumps
/// the eviction counter, the same signal a real memcached gives under memory
/// pressure.
///
/// The fault-injection helpers ([`set_available`](Self::set_available),
/// [`inject_evictions`](Self::inject_evictions), [`remove`](Self::remove))
/// exist so tests can exercise the store's failure paths.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
    evictions: AtomicU64,
    available: AtomicBool,
    capacity: Option<u64>,
    max_value_size: usize,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Bytes>,
    order: VecDeque<String>,
    used: u64,
}

impl Inner {
    fn insert(&mut self, key: &str, value: Bytes) {
        self.used += value.len() as u64;
        match self.entries.insert(key.to_string(), value) {
            Some(old) => self.used -= old.len() as u64,
            None => self.order.push_back(key.to_string()),
        }
    }

    fn remove(&mut self, key: &str) -> Option<Bytes> {
        let old = self.entries.remove(key)?;
        self.used -= old.len() as u64;
        self.order.retain(|k| k != key);
        Some(old)
    }

    /// Evicts oldest entries until `incoming` more bytes fit. Returns how many went.
    fn make_room(&mut self, incoming: u64, capacity: u64) -> u64 {
        let mut evicted = 0;
        while self.used + incoming > capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(old) = self.entries.remove(&oldest) {
                self.used -= old.len() as u64;
                evicted += 1;
            }
        }
        evicted
    }
}

impl MemoryCache {
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            evictions: AtomicU64::new(0),
            available: AtomicBool::new(true),
            capacity: None,
            max_value_size: MAX_VALUE_SIZE,
        }
    }

    /// Creates a cache that evicts once `capacity` bytes of values are held.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes one entry, bypassing the store.
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.lock().remove(key)
    }

    /// Adds `count` to the eviction counter without evicting anything.
    pub fn inject_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Takes the cache offline (`false`) or back online (`true`).
    ///
    /// While offline every operation fails with a transport error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(CacheError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "memory cache is offline",
            )))
        }
    }

    fn check_request(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.ensure_available()?;
        self.check_key(key)
            .map_err(|e| CacheError::Client(e.to_string()))?;
        if value.len() > self.max_value_size {
            return Err(CacheError::Server("object too large for cache".into()));
        }
        Ok(())
    }

    fn store(&self, inner: &mut Inner, key: &str, value: &[u8]) {
        if let Some(capacity) = self.capacity {
            let existing = inner.entries.get(key).map_or(0, |v| v.len() as u64);
            let incoming = (value.len() as u64).saturating_sub(existing);
            let evicted = inner.make_room(incoming, capacity);
            if evicted > 0 {
                debug!(evicted, "memory cache evicted entries");
                self.evictions.fetch_add(evicted, Ordering::Relaxed);
            }
        }
        inner.insert(key, Bytes::copy_from_slice(value));
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheClient for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.ensure_available()?;
        Ok(self.lock().entries.get(key).cloned())
    }

    fn add(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        self.check_request(key, value)?;
        let mut inner = self.lock();
        if inner.entries.contains_key(key) {
            return Ok(false);
        }
        self.store(&mut inner, key, value);
        Ok(true)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.check_request(key, value)?;
        let mut inner = self.lock();
        self.store(&mut inner, key, value);
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        self.ensure_available()?;
        let inner = self.lock();
        Ok(CacheStats {
            evictions: self.evictions.load(Ordering::Relaxed),
            curr_items: inner.entries.len() as u64,
            bytes: inner.used,
            limit_maxbytes: self.capacity.unwrap_or(u64::MAX),
        })
    }

    fn flush_all(&self) -> Result<(), CacheError> {
        self.ensure_available()?;
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.used = 0;
        Ok(())
    }
}
