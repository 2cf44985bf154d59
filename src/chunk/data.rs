//! The Chunk type - one fixed-size window of a blob.

use bytes::Bytes;
use std::fmt;

/// A slice of a blob together with its position in the chunk sequence.
///
/// # Example
///
/// ```
/// use bottlecache::Chunk;
/// use bytes::Bytes;
///
/// let chunk = Chunk::new(1, Bytes::from_static(b"d!"));
///
/// assert_eq!(chunk.index(), 1);
/// assert_eq!(chunk.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based ordinal within the blob.
    pub index: u64,

    /// The chunk data.
    pub data: Bytes,
}

impl Chunk {
    /// Creates a new chunk.
    pub fn new(index: u64, data: impl Into<Bytes>) -> Self {
        Self {
            index,
            data: data.into(),
        }
    }

    /// Returns the ordinal of the chunk.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Returns the length of the chunk data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the chunk has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a reference to the chunk data.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consumes the chunk and returns the underlying data.
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk(#{}, {} bytes)", self.index, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let chunk = Chunk::new(3, &b"hello"[..]);
        assert_eq!(chunk.index(), 3);
        assert_eq!(chunk.len(), 5);
        assert!(!chunk.is_empty());
    }

    #[test]
    fn test_empty() {
        let chunk = Chunk::new(0, &b""[..]);
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_into_data() {
        let chunk = Chunk::new(0, Bytes::from_static(b"test"));
        assert_eq!(chunk.data(), &Bytes::from_static(b"test"));
        assert_eq!(chunk.into_data(), Bytes::from_static(b"test"));
    }

    #[test]
    fn test_display() {
        let chunk = Chunk::new(7, &b"hello"[..]);
        assert_eq!(chunk.to_string(), "Chunk(#7, 5 bytes)");
    }
}
