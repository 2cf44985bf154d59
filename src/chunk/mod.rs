//! Chunk types.
//!
//! - [`Chunk`] - Ordinal slice of a blob
//! - [`Checksum`] - 128-bit content digest

mod checksum;
mod data;

pub use checksum::Checksum;
pub use data::Chunk;
