//! Checksum records: the dedup guard and the integrity guard.
//!
//! Two linked entries are written per blob:
//!
//! - `checksum -> key`: the first key to store this content. Inserted only
//!   if absent, so a second copy of the same content is refused.
//! - `key + "md5" -> checksum`: what the blob under `key` must hash to when
//!   it is read back.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::CacheClient;
use crate::chunk::Checksum;
use crate::error::{BlobError, CorruptionKind};
use crate::key::integrity_key;

/// Dedup and integrity records kept in the cache.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumIndex<'a, C: ?Sized> {
    cache: &'a C,
}

impl<'a, C: CacheClient + ?Sized> ChecksumIndex<'a, C> {
    /// Creates an index over `cache`.
    pub fn new(cache: &'a C) -> Self {
        Self { cache }
    }

    /// Claims `checksum` for `key`.
    ///
    /// Fails with [`BlobError::FileCollision`] naming `key` if the checksum
    /// is already claimed, by this key or any other. On success the
    /// integrity record for `key` is written, replacing any stale one.
    pub fn register(&self, checksum: Checksum, key: &str) -> Result<Checksum, BlobError> {
        let hex = checksum.to_hex();
        if !self.cache.add(&hex, key.as_bytes())? {
            warn!(key, %checksum, "content already stored under another key");
            return Err(BlobError::FileCollision {
                key: key.to_string(),
            });
        }
        self.cache.set(&integrity_key(key), hex.as_bytes())?;
        debug!(key, %checksum, "registered checksum");
        Ok(checksum)
    }

    /// Returns true if the integrity slot of `key` holds something other than
    /// a checksum.
    ///
    /// The slot `key + "md5"` is also a valid blob key or chunk key, so it may
    /// already belong to another blob. A stale checksum from an earlier
    /// failed put of `key` does not count as taken.
    pub fn integrity_slot_taken(&self, key: &str) -> Result<bool, BlobError> {
        let taken = match self.cache.get(&integrity_key(key))? {
            None => false,
            Some(raw) => std::str::from_utf8(&raw)
                .ok()
                .and_then(Checksum::from_hex)
                .is_none(),
        };
        if taken {
            warn!(key, "integrity slot is used by another entry");
        }
        Ok(taken)
    }

    /// Checks `recomputed` against the integrity record for `key`.
    ///
    /// A missing record fails too, since there is nothing to compare against.
    pub fn verify(&self, key: &str, recomputed: Checksum) -> Result<(), BlobError> {
        let Some(stored) = self.cache.get(&integrity_key(key))? else {
            warn!(key, "no integrity record");
            return Err(BlobError::corrupt(key, CorruptionKind::MissingChecksum));
        };
        if stored[..] != *recomputed.to_hex().as_bytes() {
            let expected = String::from_utf8_lossy(&stored).into_owned();
            warn!(key, %expected, actual = %recomputed, "checksum mismatch");
            return Err(BlobError::corrupt(
                key,
                CorruptionKind::ChecksumMismatch {
                    expected,
                    actual: recomputed,
                },
            ));
        }
        Ok(())
    }

    /// Returns the key that first stored content with this checksum.
    pub fn owner(&self, checksum: Checksum) -> Result<Option<String>, BlobError> {
        Ok(self
            .cache
            .get(&checksum.to_hex())?
            .map(|owner| lossy(&owner)))
    }

    /// Returns the checksum recorded for `key`, if any.
    ///
    /// A record that is not a checksum reads as `None`.
    pub fn stored_checksum(&self, key: &str) -> Result<Option<Checksum>, BlobError> {
        Ok(self
            .cache
            .get(&integrity_key(key))?
            .and_then(|raw| Checksum::from_hex(&lossy(&raw))))
    }
}

fn lossy(raw: &Bytes) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[test]
    fn test_register_and_verify() {
        let cache = MemoryCache::new();
        let index = ChecksumIndex::new(&cache);
        let checksum = Checksum::of(b"contents");

        assert_eq!(index.register(checksum, "validsum").unwrap(), checksum);
        assert!(index.verify("validsum", checksum).is_ok());
        assert_eq!(index.owner(checksum).unwrap().as_deref(), Some("validsum"));
        assert_eq!(index.stored_checksum("validsum").unwrap(), Some(checksum));
    }

    #[test]
    fn test_register_collision_names_new_key() {
        let cache = MemoryCache::new();
        let index = ChecksumIndex::new(&cache);
        let checksum = Checksum::of(b"justright");

        index.register(checksum, "goodstuff").unwrap();
        match index.register(checksum, "oops") {
            Err(BlobError::FileCollision { key }) => assert_eq!(key, "oops"),
            other => panic!("expected FileCollision, got {other:?}"),
        }
        assert_eq!(index.owner(checksum).unwrap().as_deref(), Some("goodstuff"));
        assert!(index.stored_checksum("oops").unwrap().is_none());
    }

    #[test]
    fn test_register_same_key_twice_collides() {
        let cache = MemoryCache::new();
        let index = ChecksumIndex::new(&cache);
        let checksum = Checksum::of(b"again");

        index.register(checksum, "k").unwrap();
        assert!(matches!(
            index.register(checksum, "k"),
            Err(BlobError::FileCollision { .. })
        ));
    }

    #[test]
    fn test_register_overwrites_stale_integrity_record() {
        let cache = MemoryCache::new();
        cache.set("kmd5", b"stale").unwrap();
        let index = ChecksumIndex::new(&cache);
        let checksum = Checksum::of(b"fresh");

        index.register(checksum, "k").unwrap();
        assert!(index.verify("k", checksum).is_ok());
    }

    #[test]
    fn test_integrity_slot_taken() {
        let cache = MemoryCache::new();
        let index = ChecksumIndex::new(&cache);
        assert!(!index.integrity_slot_taken("doc").unwrap());

        // stale record from this key
        cache.set("docmd5", Checksum::of(b"old").to_hex().as_bytes()).unwrap();
        assert!(!index.integrity_slot_taken("doc").unwrap());

        // manifest of a blob stored under "docmd5"
        cache.set("docmd5", b"1").unwrap();
        assert!(index.integrity_slot_taken("doc").unwrap());

        // chunk 5 of a blob stored under "docmd"
        cache.set("docmd5", b"chunk bytes").unwrap();
        assert!(index.integrity_slot_taken("doc").unwrap());
    }

    #[test]
    fn test_verify_mismatch() {
        let cache = MemoryCache::new();
        let index = ChecksumIndex::new(&cache);
        index.register(Checksum::of(b"original"), "k").unwrap();

        let err = index.verify("k", Checksum::of(b"tampered")).unwrap_err();
        assert!(matches!(
            err,
            BlobError::CorruptData {
                kind: CorruptionKind::ChecksumMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_verify_missing_record() {
        let cache = MemoryCache::new();
        let index = ChecksumIndex::new(&cache);

        let err = index.verify("never", Checksum::of(b"x")).unwrap_err();
        assert!(matches!(
            err,
            BlobError::CorruptData {
                kind: CorruptionKind::MissingChecksum,
                ..
            }
        ));
    }

    #[test]
    fn test_cache_failure_is_unavailable() {
        let cache = MemoryCache::new();
        let index = ChecksumIndex::new(&cache);
        cache.set_available(false);

        assert!(matches!(
            index.register(Checksum::of(b"x"), "k"),
            Err(BlobError::CacheUnavailable(_))
        ));
        assert!(matches!(
            index.verify("k", Checksum::of(b"x")),
            Err(BlobError::CacheUnavailable(_))
        ));
    }
}
