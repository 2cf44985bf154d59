//! The key-value cache the blob store is layered on.
//!
//! - [`CacheClient`] - operations the store needs from a cache
//! - [`MemoryCache`] - in-process implementation, for tests and embedding
//! - [`MemcachedClient`] - memcached text-protocol client
//!
//! Storage, TTL and eviction all belong to the cache. The store only reads
//! the eviction counter through [`CacheClient::stats`].

mod memcached;
mod memory;

use std::sync::Arc;

use bytes::Bytes;

use crate::error::{CacheError, KeyError};

pub use memcached::MemcachedClient;
pub use memory::MemoryCache;

/// Longest key memcached accepts, in bytes.
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest value memcached stores with its default settings.
pub const MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Checks `key` against memcached's key syntax.
///
/// A key must be non-empty, at most [`MAX_KEY_LENGTH`] bytes, and contain
/// no whitespace or control characters.
pub fn check_key(key: &str) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(KeyError::TooLong {
            len: key.len(),
            max: MAX_KEY_LENGTH,
        });
    }
    if let Some((position, ch)) = key
        .char_indices()
        .find(|(_, c)| c.is_whitespace() || c.is_control())
    {
        return Err(KeyError::IllegalCharacter { ch, position });
    }
    Ok(())
}

/// Counters reported by the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries evicted to free memory since the cache started.
    pub evictions: u64,
    /// Entries currently stored.
    pub curr_items: u64,
    /// Bytes currently used.
    pub bytes: u64,
    /// Memory limit in bytes.
    pub limit_maxbytes: u64,
}

/// A size-limited key-value cache with insert-if-absent.
///
/// Implementations must be `Send + Sync`; the store makes one blocking call
/// per operation and never holds locks across calls.
pub trait CacheClient: Send + Sync {
    /// Checks whether the cache accepts `key` as a key.
    fn check_key(&self, key: &str) -> Result<(), KeyError> {
        check_key(key)
    }

    /// Fetches a value. A miss is `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Stores `value` only if `key` is absent. Returns whether it was stored.
    fn add(&self, key: &str, value: &[u8]) -> Result<bool, CacheError>;

    /// Stores `value`, replacing any existing entry.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;

    /// Reads the cache's counters.
    fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Drops every entry.
    fn flush_all(&self) -> Result<(), CacheError>;
}

impl<T: CacheClient + ?Sized> CacheClient for &T {
    fn check_key(&self, key: &str) -> Result<(), KeyError> {
        (**self).check_key(key)
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        (**self).get(key)
    }

    fn add(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        (**self).add(key, value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        (**self).set(key, value)
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        (**self).stats()
    }

    fn flush_all(&self) -> Result<(), CacheError> {
        (**self).flush_all()
    }
}

impl<T: CacheClient + ?Sized> CacheClient for Arc<T> {
    fn check_key(&self, key: &str) -> Result<(), KeyError> {
        (**self).check_key(key)
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        (**self).get(key)
    }

    fn add(&self, key: &str, value: &[u8]) -> Result<bool, CacheError> {
        (**self).add(key, value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        (**self).set(key, value)
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        (**self).stats()
    }

    fn flush_all(&self) -> Result<(), CacheError> {
        (**self).flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key_accepts() {
        assert!(check_key("doc").is_ok());
        assert!(check_key("report-2024_final.pdf").is_ok());
        assert!(check_key("ünïcode").is_ok());
        assert!(check_key(&"k".repeat(MAX_KEY_LENGTH)).is_ok());
    }

    #[test]
    fn test_check_key_empty() {
        assert_eq!(check_key(""), Err(KeyError::Empty));
    }

    #[test]
    fn test_check_key_too_long() {
        assert_eq!(
            check_key(&"k".repeat(MAX_KEY_LENGTH + 1)),
            Err(KeyError::TooLong { len: 251, max: 250 })
        );
    }

    #[test]
    fn test_check_key_illegal_characters() {
        assert_eq!(
            check_key("my file"),
            Err(KeyError::IllegalCharacter { ch: ' ', position: 2 })
        );
        assert!(check_key("tab\there").is_err());
        assert!(check_key("line\r\n").is_err());
        assert!(check_key("nul\0").is_err());
        assert!(check_key("del\x7f").is_err());
        assert!(check_key("nbsp\u{a0}").is_err());
    }

    #[test]
    fn test_check_key_deterministic() {
        for key in ["ok", "", "a b", "x\n"] {
            assert_eq!(check_key(key), check_key(key));
        }
    }
}
