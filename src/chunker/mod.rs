//! Fixed-size chunking.
//!
//! - [`Chunker`] - Splits blobs into ordered chunks and joins them back
//! - [`ChunkIter`] - Lazy chunk iterator over a reader

mod engine;
mod iter;

pub use engine::Chunker;
pub use iter::ChunkIter;
