//! Fixed-size chunking engine.
//!
//! Splitting reads the source in windows of `chunk_size` bytes, producing
//! `ceil(len / chunk_size)` chunks with only the last one allowed to be
//! short. An empty blob yields no chunks. Joining is plain concatenation in
//! the order the chunks are supplied.
//!
//! # Example
//!
//! ```
//! use bottlecache::Chunker;
//!
//! let chunker = Chunker::new(10)?;
//! let chunks = chunker.split(&b"hello world!"[..]);
//!
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(&chunks[0].data[..], b"hello worl");
//! assert_eq!(&chunks[1].data[..], b"d!");
//! assert_eq!(&Chunker::join(chunks)[..], b"hello world!");
//! # Ok::<(), bottlecache::ConfigError>(())
//! ```

use std::io::Read;

use bytes::{Bytes, BytesMut};

use super::ChunkIter;
use crate::chunk::Chunk;
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::ConfigError;

/// Splits blobs into fixed-size chunks and joins them back.
///
/// `Chunker` holds no state beyond its window size; every call is
/// independent and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    /// Creates a chunker with the given window size.
    ///
    /// Returns error if `chunk_size` is zero.
    pub fn new(chunk_size: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidConfig {
                message: "chunk size must be non-zero",
            });
        }
        Ok(Self { chunk_size })
    }

    /// Returns the window size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks a blob of `len` bytes splits into.
    pub fn chunk_count(&self, len: u64) -> u64 {
        len.div_ceil(self.chunk_size as u64)
    }

    /// Splits an in-memory blob.
    ///
    /// Chunk data is zero-copy sliced from the input.
    pub fn split(&self, data: impl Into<Bytes>) -> Vec<Chunk> {
        let data = data.into();
        let mut chunks = Vec::with_capacity(data.len().div_ceil(self.chunk_size));
        let mut start = 0usize;
        let mut index = 0u64;

        while start < data.len() {
            let end = (start + self.chunk_size).min(data.len());
            chunks.push(Chunk::new(index, data.slice(start..end)));
            start = end;
            index += 1;
        }

        chunks
    }

    /// Creates a lazy chunking iterator over a reader.
    pub fn chunk<R: Read>(&self, reader: R) -> ChunkIter<R> {
        ChunkIter::new(reader, self.chunk_size)
    }

    /// Concatenates chunks in the order given.
    ///
    /// No reordering happens here: callers must supply chunk 0 first.
    pub fn join<I>(chunks: I) -> Bytes
    where
        I: IntoIterator<Item = Chunk>,
    {
        let mut chunks = chunks.into_iter().peekable();

        // A single chunk can be handed back without copying.
        let Some(first) = chunks.next() else {
            return Bytes::new();
        };
        if chunks.peek().is_none() {
            return first.data;
        }

        let mut out = BytesMut::from(&first.data[..]);
        for chunk in chunks {
            out.extend_from_slice(&chunk.data);
        }
        out.freeze()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(Chunker::new(0).is_err());
    }

    #[test]
    fn test_split_empty() {
        let chunker = Chunker::default();
        assert!(chunker.split(Bytes::new()).is_empty());
        assert_eq!(chunker.chunk_count(0), 0);
    }

    #[test]
    fn test_split_hello_world() {
        let chunker = Chunker::new(10).unwrap();
        let chunks = chunker.split(&b"hello world!"[..]);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], Chunk::new(0, &b"hello worl"[..]));
        assert_eq!(chunks[1], Chunk::new(1, &b"d!"[..]));
    }

    #[test]
    fn test_split_exact_multiple() {
        let chunker = Chunker::new(16).unwrap();
        let chunks = chunker.split(vec![0xABu8; 64]);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunker.chunk_count(64), 4);
        assert!(chunks.iter().all(|c| c.len() == 16));
    }

    #[test]
    fn test_split_one_past_multiple() {
        let chunker = Chunker::new(16).unwrap();
        let chunks = chunker.split(vec![0xABu8; 65]);

        assert_eq!(chunks.len(), 5);
        assert_eq!(chunker.chunk_count(65), 5);
        assert_eq!(chunks[4].len(), 1);
    }

    #[test]
    fn test_split_indices_ascending() {
        let chunker = Chunker::new(7).unwrap();
        let data: Vec<u8> = (0..100).map(|i| i as u8).collect();

        for (i, chunk) in chunker.split(data).iter().enumerate() {
            assert_eq!(chunk.index, i as u64);
        }
    }

    #[test]
    fn test_join_preserves_order() {
        let chunker = Chunker::new(3).unwrap();
        let data: Vec<u8> = (0..50).map(|i| i as u8).collect();

        let joined = Chunker::join(chunker.split(data.clone()));
        assert_eq!(&joined[..], &data[..]);
    }

    #[test]
    fn test_join_reversed_input_is_not_reordered() {
        let chunker = Chunker::new(5).unwrap();
        let mut chunks = chunker.split(&b"abcdefghij"[..]);
        chunks.reverse();

        assert_eq!(&Chunker::join(chunks)[..], b"fghijabcde");
    }

    #[test]
    fn test_join_empty_and_single() {
        assert!(Chunker::join(Vec::new()).is_empty());
        assert_eq!(
            &Chunker::join(vec![Chunk::new(0, &b"only"[..])])[..],
            b"only"
        );
    }

    #[test]
    fn test_reader_matches_split() {
        let chunker = Chunker::new(10).unwrap();
        let data: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();

        let from_reader: Vec<_> = chunker
            .chunk(Cursor::new(&data))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(from_reader, chunker.split(data));
    }
}
