//! Content digest used for deduplication and integrity checks.
//!
//! - [`ContentHasher`] - incremental 128-bit BLAKE3 digest

mod blake3;

pub use blake3::ContentHasher;
