//! Content checksum type.

use std::fmt;
use std::str::FromStr;

use crate::hash::ContentHasher;

/// A 128-bit digest of a blob's content.
///
/// Stored in the cache as 32 lowercase hex characters, both as the dedup
/// record's key and as the integrity record's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checksum([u8; 16]);

impl Checksum {
    /// The size of the checksum in bytes.
    pub const SIZE: usize = 16;

    /// Creates a checksum from raw digest bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Computes the checksum of `data`.
    pub fn of(data: &[u8]) -> Self {
        ContentHasher::digest(data)
    }

    /// Returns the checksum as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the checksum as a hex string.
    pub fn to_hex(&self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut result = String::with_capacity(Self::SIZE * 2);
        for byte in &self.0 {
            result.push(HEX[(byte >> 4) as usize] as char);
            result.push(HEX[(byte & 0xf) as usize] as char);
        }
        result
    }

    /// Parses a checksum from a hex string.
    ///
    /// Returns `None` if the string is not valid hex or not exactly 32 characters.
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        if hex_str.len() != Self::SIZE * 2 || !hex_str.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex_str[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Checksum {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or(())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex() {
        let checksum = Checksum::new([0xABu8; 16]);
        let hex = checksum.to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c == 'a' || c == 'b'));
        assert_eq!(hex, checksum.to_string());
    }

    #[test]
    fn test_from_hex() {
        let checksum = Checksum::of(b"hello world!");
        assert_eq!(Checksum::from_hex(&checksum.to_hex()), Some(checksum));
        assert_eq!(checksum.to_hex().parse::<Checksum>(), Ok(checksum));

        assert!(Checksum::from_hex("abc").is_none());
        assert!(Checksum::from_hex(&"zz".repeat(16)).is_none());
        assert!(Checksum::from_hex(&"é".repeat(16)).is_none());
        assert!(Checksum::from_hex(&"+f".repeat(16)).is_none());
    }

    #[test]
    fn test_display_prefix() {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]);
        let s = Checksum::new(bytes).to_string();
        assert!(s.starts_with("0123456789abcdef"));
    }

    #[test]
    fn test_content_sensitivity() {
        assert_eq!(Checksum::of(b"same"), Checksum::of(b"same"));
        assert_ne!(Checksum::of(b"same"), Checksum::of(b"same!"));
    }
}
