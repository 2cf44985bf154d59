//! Staging streamed input on disk before it is chunked.
//!
//! The checksum must be registered before any chunk is written, so a stream
//! is read once into an anonymous temp file while hashing, then read again
//! for chunking. The file has no name on disk and disappears when the
//! [`Staged`] value is dropped, whichever way the put ends.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::chunk::Checksum;
use crate::error::BlobError;
use crate::hash::ContentHasher;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A fully staged input, rewound to the start.
#[derive(Debug)]
pub(crate) struct Staged {
    pub(crate) file: File,
    pub(crate) len: u64,
    pub(crate) checksum: Checksum,
}

/// Copies `reader` into a scratch file in `dir` (or the system temp dir).
///
/// Reads at most `max + 1` bytes; more than `max` is
/// [`BlobError::FileTooLarge`].
pub(crate) fn stage<R: Read>(
    reader: R,
    dir: Option<&Path>,
    max: u64,
) -> Result<Staged, BlobError> {
    let mut file = match dir {
        Some(dir) => tempfile::tempfile_in(dir),
        None => tempfile::tempfile(),
    }
    .map_err(BlobError::Scratch)?;

    let mut reader = reader.take(max.saturating_add(1));
    let mut hasher = ContentHasher::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut len = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(BlobError::Scratch(e)),
        };
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n]).map_err(BlobError::Scratch)?;
        len += n as u64;
    }

    if len > max {
        return Err(BlobError::FileTooLarge { size: len, max });
    }

    file.seek(SeekFrom::Start(0)).map_err(BlobError::Scratch)?;
    let checksum = hasher.finalize();
    debug!(len, %checksum, "staged input on scratch storage");

    Ok(Staged {
        file,
        len,
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_stage_roundtrip() {
        let data: Vec<u8> = (0..200_000).map(|i| (i % 251) as u8).collect();
        let mut staged = stage(Cursor::new(&data), None, 1 << 20).unwrap();

        assert_eq!(staged.len, data.len() as u64);
        assert_eq!(staged.checksum, Checksum::of(&data));

        let mut back = Vec::new();
        staged.file.read_to_end(&mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_stage_exact_limit() {
        let staged = stage(Cursor::new(vec![1u8; 64]), None, 64).unwrap();
        assert_eq!(staged.len, 64);
    }

    #[test]
    fn test_stage_over_limit() {
        let err = stage(Cursor::new(vec![1u8; 1000]), None, 64).unwrap_err();
        assert!(matches!(err, BlobError::FileTooLarge { size: 65, max: 64 }));
    }

    #[test]
    fn test_stage_in_dir_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _staged = stage(Cursor::new(b"hello"), Some(dir.path()), 64).unwrap();
            let _ = stage(Cursor::new(vec![0u8; 100]), Some(dir.path()), 64).unwrap_err();
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_stage_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            stage(Cursor::new(b"x"), Some(&missing), 64),
            Err(BlobError::Scratch(_))
        ));
    }
}
