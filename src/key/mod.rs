//! Blob keys and the cache keys derived from them.
//!
//! A blob stored under `key` occupies:
//!
//! - `key` - the manifest (chunk count)
//! - `key0`, `key1`, ... - the chunks, ordinal appended in decimal
//! - `key` + `"md5"` - the integrity checksum
//!
//! plus a dedup record keyed by the content checksum itself.

use crate::cache::CacheClient;
use crate::error::BlobError;

/// Suffix of the integrity record's key.
pub const INTEGRITY_SUFFIX: &str = "md5";

/// Cache key of chunk `index` of `key`.
pub fn chunk_key(key: &str, index: u64) -> String {
    format!("{key}{index}")
}

/// Cache key of the integrity record of `key`.
pub fn integrity_key(key: &str) -> String {
    format!("{key}{INTEGRITY_SUFFIX}")
}

/// Accepts or rejects blob keys before any cache interaction.
///
/// A key is valid exactly when the cache's key syntax accepts it and the
/// integrity key derived from it. Validation is pure: the cache's key rule
/// is consulted, never its contents.
#[derive(Debug, Clone, Copy)]
pub struct KeyValidator<'a, C: ?Sized> {
    cache: &'a C,
}

impl<'a, C: CacheClient + ?Sized> KeyValidator<'a, C> {
    /// Creates a validator using `cache`'s key rule.
    pub fn new(cache: &'a C) -> Self {
        Self { cache }
    }

    /// Validates a blob key.
    pub fn validate(&self, key: &str) -> Result<(), BlobError> {
        self.check(key, key)?;
        self.check(key, &integrity_key(key))
    }

    /// Validates the key of the highest chunk a blob of `chunk_count` chunks uses.
    pub fn validate_chunks(&self, key: &str, chunk_count: u64) -> Result<(), BlobError> {
        match chunk_count.checked_sub(1) {
            Some(last) => self.check(key, &chunk_key(key, last)),
            None => Ok(()),
        }
    }

    fn check(&self, key: &str, cache_key: &str) -> Result<(), BlobError> {
        self.cache
            .check_key(cache_key)
            .map_err(|reason| BlobError::InvalidKey {
                key: key.to_string(),
                reason,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MAX_KEY_LENGTH, MemoryCache};
    use crate::error::KeyError;

    #[test]
    fn test_derived_keys() {
        assert_eq!(chunk_key("doc", 0), "doc0");
        assert_eq!(chunk_key("doc", 12), "doc12");
        assert_eq!(integrity_key("doc"), "docmd5");
    }

    #[test]
    fn test_validate_ok() {
        let cache = MemoryCache::new();
        let validator = KeyValidator::new(&cache);
        assert!(validator.validate("doc").is_ok());
        assert!(validator.validate("hello.txt").is_ok());
    }

    #[test]
    fn test_validate_rejects_syntax() {
        let cache = MemoryCache::new();
        let validator = KeyValidator::new(&cache);

        for key in ["", "has space", "new\nline", "ctl\x07"] {
            match validator.validate(key) {
                Err(BlobError::InvalidKey { key: k, .. }) => assert_eq!(k, key),
                other => panic!("expected InvalidKey for {key:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_validate_rejects_when_integrity_key_too_long() {
        let cache = MemoryCache::new();
        let validator = KeyValidator::new(&cache);

        let max_blob_key = "k".repeat(MAX_KEY_LENGTH - INTEGRITY_SUFFIX.len());
        assert!(validator.validate(&max_blob_key).is_ok());

        let key = "k".repeat(MAX_KEY_LENGTH - 1);
        assert!(matches!(
            validator.validate(&key),
            Err(BlobError::InvalidKey {
                reason: KeyError::TooLong { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_validate_chunks() {
        let cache = MemoryCache::new();
        let validator = KeyValidator::new(&cache);
        let key = "k".repeat(MAX_KEY_LENGTH - 2);

        assert!(validator.validate_chunks(&key, 0).is_ok());
        assert!(validator.validate_chunks(&key, 100).is_ok());
        assert!(validator.validate_chunks(&key, 101).is_err());
    }

    #[test]
    fn test_validate_is_deterministic() {
        let cache = MemoryCache::new();
        let validator = KeyValidator::new(&cache);
        cache.set("doc", b"1").unwrap();

        for key in ["doc", "bad key", "doc"] {
            assert_eq!(
                validator.validate(key).is_ok(),
                validator.validate(key).is_ok()
            );
        }
        assert!(validator.validate("doc").is_ok());
    }
}
