//! The blob store: put and get over a [`CacheClient`].
//!
//! A put, in order, each step short-circuiting:
//!
//! 1. validate the key (and, once the size is known, the last chunk key)
//! 2. reject blobs over the size ceiling
//! 3. refuse outright if the cache reports evictions
//! 4. refuse if a manifest already exists for the key, or if the key's
//!    integrity slot holds another blob's entry
//! 5. register the content checksum (dedup + integrity records)
//! 6. write chunks `key0..keyN-1`, insert-if-absent
//! 7. write the manifest `key -> N`, insert-if-absent
//!
//! The manifest goes last, so a reader racing a put sees either no blob or
//! the whole blob. A put that fails after step 5 leaves its records behind
//! for the cache to expire; there is no rollback.
//!
//! # Example
//!
//! ```
//! use bottlecache::{BlobStore, MemoryCache, StoreConfig};
//!
//! let store = BlobStore::new(MemoryCache::new(), StoreConfig::new(10, 1024)?)?;
//!
//! store.put("doc", &b"hello world!"[..])?;
//! assert_eq!(store.manifest("doc")?.map(|m| m.chunk_count()), Some(2));
//! assert_eq!(&store.get("doc")?[..], b"hello world!");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod manifest;
mod scratch;

use std::io::{self, BufReader, Read};

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::{CacheClient, CacheStats};
use crate::chunk::{Checksum, Chunk};
use crate::chunker::Chunker;
use crate::config::StoreConfig;
use crate::error::{BlobError, ConfigError, CorruptionKind};
use crate::index::ChecksumIndex;
use crate::key::{KeyValidator, chunk_key};

pub use manifest::Manifest;

/// Chunked blob storage on top of a size-limited cache.
///
/// The store owns its cache client; pass a reference or an `Arc` to share
/// one client between stores. It keeps no state of its own between calls.
#[derive(Debug)]
pub struct BlobStore<C> {
    cache: C,
    config: StoreConfig,
    chunker: Chunker,
}

impl<C: CacheClient> BlobStore<C> {
    /// Creates a store over `cache`.
    pub fn new(cache: C, config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let chunker = Chunker::new(config.chunk_size())?;
        Ok(Self {
            cache,
            config,
            chunker,
        })
    }

    /// Returns the cache client.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the checksum records kept in the cache.
    pub fn index(&self) -> ChecksumIndex<'_, C> {
        ChecksumIndex::new(&self.cache)
    }

    /// Stores an in-memory blob under `key`. Returns the key.
    pub fn put(&self, key: &str, data: impl Into<Bytes>) -> Result<String, BlobError> {
        let data = data.into();
        KeyValidator::new(&self.cache).validate(key)?;
        self.check_size(data.len() as u64)?;

        let checksum = || Checksum::of(&data);
        let chunks = self.chunker.split(data.clone()).into_iter().map(Ok);
        self.store(key, data.len() as u64, checksum, chunks)
    }

    /// Stores a blob read from `reader` under `key`. Returns the key.
    ///
    /// The input is staged on scratch storage first, so memory use stays at
    /// one chunk regardless of blob size.
    pub fn put_reader<R: Read>(&self, key: &str, reader: R) -> Result<String, BlobError> {
        KeyValidator::new(&self.cache).validate(key)?;
        let staged = scratch::stage(
            reader,
            self.config.scratch_dir(),
            self.config.max_file_size(),
        )?;

        let checksum = staged.checksum;
        let chunks = self.chunker.chunk(BufReader::new(staged.file));
        self.store(key, staged.len, || checksum, chunks)
    }

    /// Fetches the blob stored under `key`.
    pub fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        let manifest = self.manifest(key)?.ok_or_else(|| BlobError::NoSuchKey {
            key: key.to_string(),
        })?;
        info!(key, chunks = manifest.chunk_count(), "retrieving blob");

        let mut chunks = Vec::new();
        for index in 0..manifest.chunk_count() {
            let Some(data) = self.cache.get(&chunk_key(key, index))? else {
                warn!(key, index, "chunk missing from cache");
                return Err(BlobError::corrupt(
                    key,
                    CorruptionKind::MissingChunk { index },
                ));
            };
            chunks.push(Chunk::new(index, data));
        }

        let data = Chunker::join(chunks);
        self.index().verify(key, Checksum::of(&data))?;
        debug!(key, size = data.len(), "blob verified");
        Ok(data)
    }

    /// Reads the manifest for `key`, if one exists.
    pub fn manifest(&self, key: &str) -> Result<Option<Manifest>, BlobError> {
        // A key the cache cannot hold can never have been stored.
        if self.cache.check_key(key).is_err() {
            return Ok(None);
        }
        match self.cache.get(key)? {
            None => Ok(None),
            Some(raw) => Manifest::decode(&raw).map(Some).ok_or_else(|| {
                BlobError::corrupt(
                    key,
                    CorruptionKind::BadManifest {
                        value: String::from_utf8_lossy(&raw).into_owned(),
                    },
                )
            }),
        }
    }

    /// Reads the cache's counters.
    pub fn stats(&self) -> Result<CacheStats, BlobError> {
        Ok(self.cache.stats()?)
    }

    /// Drops every entry in the cache, returning every key to absent.
    pub fn flush(&self) -> Result<(), BlobError> {
        warn!("flushing the whole cache");
        Ok(self.cache.flush_all()?)
    }

    fn check_size(&self, size: u64) -> Result<(), BlobError> {
        let max = self.config.max_file_size();
        if size > max {
            warn!(size, max, "blob too large for storage");
            return Err(BlobError::FileTooLarge { size, max });
        }
        Ok(())
    }

    /// Steps shared by both put flavours, from the chunk-key check onwards.
    fn store<F, I>(&self, key: &str, len: u64, checksum: F, chunks: I) -> Result<String, BlobError>
    where
        F: FnOnce() -> Checksum,
        I: Iterator<Item = io::Result<Chunk>>,
    {
        let chunk_count = self.chunker.chunk_count(len);
        KeyValidator::new(&self.cache).validate_chunks(key, chunk_count)?;
        info!(key, size = len, chunks = chunk_count, "storing blob");

        let evictions = self.cache.stats()?.evictions;
        if evictions > 0 {
            warn!(key, evictions, "cache is evicting, refusing to store");
            return Err(BlobError::CacheUnderEvictionPressure { evictions });
        }

        if self.cache.get(key)?.is_some() {
            return Err(self.key_exists(key));
        }
        if self.index().integrity_slot_taken(key)? {
            return Err(self.key_exists(key));
        }

        self.index().register(checksum(), key)?;

        let mut written = 0u64;
        for chunk in chunks {
            let chunk = chunk.map_err(BlobError::Scratch)?;
            let cache_key = chunk_key(key, chunk.index);
            debug!(key = %cache_key, size = chunk.len(), "adding chunk");
            if !self.cache.add(&cache_key, &chunk.data)? {
                warn!(key = %cache_key, "chunk key already taken");
                return Err(self.key_exists(key));
            }
            written += 1;
        }
        debug_assert_eq!(written, chunk_count);

        if !self.cache.add(key, Manifest::new(written).encode().as_bytes())? {
            return Err(self.key_exists(key));
        }

        info!(key, chunks = written, "stored blob");
        Ok(key.to_string())
    }

    fn key_exists(&self, key: &str) -> BlobError {
        warn!(key, "key already exists in cache");
        BlobError::KeyExists {
            key: key.to_string(),
        }
    }
}
