//! BLAKE3-based content hashing, truncated to 128 bits.

use crate::chunk::Checksum;

/// A hasher producing a [`Checksum`] from the first 16 bytes of BLAKE3's
/// extendable output.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    state: blake3::Hasher,
}

impl ContentHasher {
    /// Creates a new hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the hasher with more data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.state.update(data);
        self
    }

    /// Finalizes and returns the checksum.
    pub fn finalize(&self) -> Checksum {
        let mut out = [0u8; Checksum::SIZE];
        self.state.finalize_xof().fill(&mut out);
        Checksum::new(out)
    }

    /// Resets the hasher to its initial state.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Hashes `data` in one shot.
    pub fn digest(data: &[u8]) -> Checksum {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}
