//! Error types for bottlecache.
//!
//! - [`BlobError`] - outcome of [`BlobStore::put`](crate::BlobStore::put) and
//!   [`BlobStore::get`](crate::BlobStore::get)
//! - [`CacheError`] - transport or server failure of the backing cache
//! - [`KeyError`] - why a key was rejected by the cache's key syntax
//! - [`ConfigError`] - invalid configuration

use std::io;

use crate::chunk::Checksum;

/// Errors returned by blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The key (or one of the keys derived from it) is not accepted by the cache.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// What the cache's key syntax objected to.
        reason: KeyError,
    },

    /// The blob is larger than the configured maximum.
    ///
    /// For streamed input `size` is a lower bound: reading stops one byte
    /// past the limit.
    #[error("blob too large: {size} bytes (max {max})")]
    FileTooLarge {
        /// Observed size in bytes.
        size: u64,
        /// Configured maximum.
        max: u64,
    },

    /// The cache reported evictions, so nothing was written.
    #[error("cache is evicting entries ({evictions} evictions), refusing to store")]
    CacheUnderEvictionPressure {
        /// Eviction counter reported by the cache.
        evictions: u64,
    },

    /// Identical content is already stored under some key.
    #[error("content of {key:?} is already stored in the cache")]
    FileCollision {
        /// The key whose put was rejected.
        key: String,
    },

    /// A blob is already stored under this key.
    #[error("key {key:?} already exists in the cache")]
    KeyExists {
        /// The key whose put was rejected.
        key: String,
    },

    /// No blob is stored under this key.
    #[error("key {key:?} does not exist in the cache")]
    NoSuchKey {
        /// The requested key.
        key: String,
    },

    /// Stored data failed an integrity check.
    #[error("stored data for {key:?} is corrupt: {kind}")]
    CorruptData {
        /// The requested key.
        key: String,
        /// What was wrong with it.
        kind: CorruptionKind,
    },

    /// The cache could not be reached or answered with an error.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),

    /// Staging streamed input on scratch storage failed.
    #[error("scratch storage error: {0}")]
    Scratch(#[source] io::Error),
}

impl BlobError {
    /// Returns true if the same call may succeed later without any change
    /// to the stored data.
    ///
    /// The store never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BlobError::CacheUnderEvictionPressure { .. } | BlobError::CacheUnavailable(_)
        )
    }

    pub(crate) fn corrupt(key: &str, kind: CorruptionKind) -> Self {
        BlobError::CorruptData {
            key: key.to_string(),
            kind,
        }
    }
}

/// The way in which stored data was found to be corrupt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorruptionKind {
    /// The manifest promised a chunk that the cache does not hold.
    #[error("chunk {index} is missing")]
    MissingChunk {
        /// Zero-based ordinal of the missing chunk.
        index: u64,
    },

    /// No integrity checksum is recorded for the key.
    #[error("no checksum recorded")]
    MissingChecksum,

    /// The reassembled blob does not hash to the recorded checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Checksum (or raw record) stored at put time.
        expected: String,
        /// Checksum of the reassembled bytes.
        actual: Checksum,
    },

    /// The manifest entry is not a chunk count.
    #[error("manifest is not a chunk count: {value:?}")]
    BadManifest {
        /// The raw manifest value, lossily decoded.
        value: String,
    },
}

/// Errors raised by a [`CacheClient`](crate::CacheClient).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Transport error talking to the cache.
    #[error("io error: {0}")]
    Io(#[source] io::Error),

    /// The cache did not answer in time.
    #[error("timed out waiting for the cache")]
    Timeout,

    /// The cache answered with something the client could not parse.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The cache reported a server-side failure.
    #[error("server error: {0}")]
    Server(String),

    /// The cache rejected the request as malformed.
    #[error("client error: {0}")]
    Client(String),
}

impl From<io::Error> for CacheError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => CacheError::Timeout,
            _ => CacheError::Io(e),
        }
    }
}

/// Reasons a key fails the cache's key syntax.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The key is empty.
    #[error("key is empty")]
    Empty,

    /// The key is longer than the cache allows.
    #[error("key is {len} bytes (max {max})")]
    TooLong {
        /// Length of the key in bytes.
        len: usize,
        /// Maximum key length in bytes.
        max: usize,
    },

    /// The key contains whitespace or a control character.
    #[error("illegal character {ch:?} at byte {position}")]
    IllegalCharacter {
        /// The offending character.
        ch: char,
        /// Byte offset of the character.
        position: usize,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration parameter.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of what was invalid.
        message: &'static str,
    },

    /// An environment variable could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// The value found.
        value: String,
    },
}
