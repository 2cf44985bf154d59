//! Configuration for the blob store and its cache connection.
//!
//! - [`StoreConfig`] - chunk size, blob size ceiling and scratch location
//! - [`CacheConfig`] - where the memcached server lives
//!
//! Both can be built in code or read from the environment:
//!
//! | Variable           | Meaning                          | Default      |
//! |--------------------|----------------------------------|--------------|
//! | `CHUNK_SIZE`       | bytes per chunk                  | 1,024,000    |
//! | `MAX_FILE_SIZE`    | largest accepted blob in bytes   | 52,428,800   |
//! | `SCRATCH_DIR`      | directory for staging input      | system temp  |
//! | `CACHE_HOST`       | memcached host                   | `127.0.0.1`  |
//! | `CACHE_PORT`       | memcached port                   | 11211        |
//! | `CACHE_TIMEOUT_MS` | connect/read/write timeout       | 5000         |
//!
//! # Example
//!
//! ```
//! use bottlecache::StoreConfig;
//!
//! let config = StoreConfig::new(10, 1024)?.with_scratch_dir("/var/tmp");
//! assert_eq!(config.chunk_size(), 10);
//! # Ok::<(), bottlecache::ConfigError>(())
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default chunk size (1,024,000 bytes).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1000;

/// Default maximum blob size (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024 * 50;

/// Largest chunk a default memcached (`-I 1m`) stores.
///
/// The 1 MiB item limit also covers the item header and the key, so 1 KiB of
/// it is held back.
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024 - 1024;

/// Default cache host.
pub const DEFAULT_CACHE_HOST: &str = "127.0.0.1";

/// Default memcached port.
pub const DEFAULT_CACHE_PORT: u16 = 11211;

/// Default timeout for cache round-trips.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`BlobStore`](crate::BlobStore).
///
/// Constraints: `0 < chunk_size <= MAX_CHUNK_SIZE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    chunk_size: usize,
    max_file_size: u64,
    scratch_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Creates a new configuration.
    ///
    /// Returns error if `chunk_size` is zero or above [`MAX_CHUNK_SIZE`].
    pub fn new(chunk_size: usize, max_file_size: u64) -> Result<Self, ConfigError> {
        let config = Self {
            chunk_size,
            max_file_size,
            scratch_dir: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    /// for variables it does not know.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(size) = parse_var(&lookup, "CHUNK_SIZE")? {
            config.chunk_size = size;
        }
        if let Some(size) = parse_var(&lookup, "MAX_FILE_SIZE")? {
            config.max_file_size = size;
        }
        if let Some(dir) = lookup("SCRATCH_DIR").filter(|d| !d.is_empty()) {
            config.scratch_dir = Some(PathBuf::from(dir));
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets the maximum blob size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Sets the directory used to stage streamed input.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Returns the chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the maximum blob size.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Returns the scratch directory, if one is set.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// Validates the current configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidConfig {
                message: "chunk size must be non-zero",
            });
        }

        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::InvalidConfig {
                message: "chunk size cannot exceed the cache item ceiling",
            });
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            scratch_dir: None,
        }
    }
}

/// Connection settings for a [`MemcachedClient`](crate::MemcachedClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Timeout applied to connect, read and write.
    pub timeout: Duration,
}

impl CacheConfig {
    /// Creates a configuration for `host:port` with the default timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_CACHE_TIMEOUT,
        }
    }

    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup("CACHE_HOST").filter(|h| !h.is_empty()) {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "CACHE_PORT")? {
            config.port = port;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "CACHE_TIMEOUT_MS")? {
            if ms == 0 {
                return Err(ConfigError::InvalidConfig {
                    message: "cache timeout must be non-zero",
                });
            }
            config.timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_HOST, DEFAULT_CACHE_PORT)
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}
