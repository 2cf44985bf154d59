//! The per-key manifest record.

use std::fmt;

/// How many chunks make up the blob stored under a key.
///
/// Stored under the blob key itself as the chunk count in ASCII decimal.
/// Its presence promises that every chunk in `0..chunk_count` was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manifest {
    chunk_count: u64,
}

impl Manifest {
    /// Creates a manifest for `chunk_count` chunks.
    pub fn new(chunk_count: u64) -> Self {
        Self { chunk_count }
    }

    /// Returns the chunk count.
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Encodes the manifest as stored in the cache.
    pub fn encode(&self) -> String {
        self.chunk_count.to_string()
    }

    /// Decodes a cached manifest. Returns `None` if it is not a count.
    pub fn decode(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok().map(Self::new)
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Manifest({} chunks)", self.chunk_count)
    }
}
