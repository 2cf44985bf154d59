//! bottlecache
//!
//! Chunked blob storage on top of memcached.
//!
//! memcached caps values at about a megabyte. `bottlecache` stores larger
//! blobs by splitting them into fixed-size chunks, each under its own
//! derived key, behind a small manifest holding the chunk count. Every blob
//! also gets two checksum records:
//!
//! - a dedup record, so the same content is never stored under two keys
//! - an integrity record, so a read that reassembles damaged or partly
//!   evicted data fails instead of returning it
//!
//! The crate intentionally:
//! - does NOT manage expiry or eviction (the cache does)
//! - does NOT delete, update or list blobs
//! - does NOT roll back a partially written put
//!
//! # Example
//!
//! ```
//! use bottlecache::{BlobError, BlobStore, MemoryCache, StoreConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = BlobStore::new(MemoryCache::new(), StoreConfig::default())?;
//!
//!     let key = store.put("report.pdf", vec![7u8; 3_000_000])?;
//!     assert_eq!(store.get(&key)?.len(), 3_000_000);
//!
//!     // same bytes under another key
//!     let err = store.put("copy.pdf", vec![7u8; 3_000_000]).unwrap_err();
//!     assert!(matches!(err, BlobError::FileCollision { .. }));
//!     Ok(())
//! }
//! ```
//!
//! # memcached
//!
//! ```no_run
//! use bottlecache::{BlobStore, CacheConfig, MemcachedClient, StoreConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = MemcachedClient::new(CacheConfig::from_env()?);
//!     let store = BlobStore::new(cache, StoreConfig::from_env()?)?;
//!
//!     let file = std::fs::File::open("data.bin")?;
//!     store.put_reader("data.bin", file)?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod chunk;
mod chunker;
mod config;
mod error;
mod hash;
mod index;
mod key;
mod store;

//
// Public surface
//

pub use cache::{
    CacheClient, CacheStats, MAX_KEY_LENGTH, MAX_VALUE_SIZE, MemcachedClient, MemoryCache,
    check_key,
};
pub use chunk::{Checksum, Chunk};
pub use chunker::{ChunkIter, Chunker};
pub use config::{
    CacheConfig, DEFAULT_CACHE_HOST, DEFAULT_CACHE_PORT, DEFAULT_CACHE_TIMEOUT,
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE, MAX_CHUNK_SIZE, StoreConfig,
};
pub use error::{BlobError, CacheError, ConfigError, CorruptionKind, KeyError};
pub use hash::ContentHasher;
pub use index::ChecksumIndex;
pub use key::{INTEGRITY_SUFFIX, KeyValidator, chunk_key, integrity_key};
pub use store::{BlobStore, Manifest};
