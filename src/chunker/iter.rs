//! Lazy chunk iterator over a [`std::io::Read`] source.

use std::io::{self, Read};

use bytes::BytesMut;

use crate::chunk::Chunk;

/// An iterator that yields fixed-size chunks from a reader.
///
/// Each call reads until a full window of `chunk_size` bytes is gathered or
/// the reader is exhausted, so at most one chunk is buffered at a time. Short
/// reads from the underlying source do not produce short chunks; only the
/// final chunk may be shorter than the window.
///
/// # Example
///
/// ```
/// use bottlecache::Chunker;
/// use std::io::Cursor;
///
/// let chunker = Chunker::new(4)?;
/// let lens: Vec<usize> = chunker
///     .chunk(Cursor::new(b"0123456789"))
///     .map(|c| c.map(|c| c.len()))
///     .collect::<Result<_, _>>()?;
///
/// assert_eq!(lens, vec![4, 4, 2]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ChunkIter<R> {
    reader: R,
    chunk_size: usize,
    index: u64,
    finished: bool,
}

impl<R: Read> ChunkIter<R> {
    pub(crate) fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size,
            index: 0,
            finished: false,
        }
    }

    /// Fills one window, returning how many bytes were read.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for ChunkIter<R> {
    type Item = io::Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buf = BytesMut::zeroed(self.chunk_size);
        match self.fill(&mut buf) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(n) => {
                if n < self.chunk_size {
                    self.finished = true;
                }
                buf.truncate(n);
                let chunk = Chunk::new(self.index, buf.freeze());
                self.index += 1;
                Some(Ok(chunk))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
