// src/hash.rs

//! Fingerprints and timestamps of on-disk files
//!
//! pacman-g2 records SHA-1 sums in its database (`%SHA1SUM%`, backup
//! entries), so the harness fingerprints with the same algorithm.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

const BLOCK_SIZE: usize = 1 << 20;

/// SHA-1 hex digest of a file's bytes
///
/// An unreadable or missing file yields an empty string, which callers treat
/// as "no prior state".
pub fn file_fingerprint(path: &Path) -> String {
    match hash_reader(File::open(path)) {
        Ok(digest) => digest,
        Err(_) => String::new(),
    }
}

fn hash_reader(file: io::Result<File>) -> io::Result<String> {
    let mut file = file?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-1 hex digest of in-memory data
pub fn data_fingerprint(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}

/// Access, modify and change times of a file, in nanoseconds since the epoch
///
/// The zero value means the file never existed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileTimes {
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

impl FileTimes {
    /// Stat `path` without following symlinks
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(Self {
            atime: nanos(meta.atime(), meta.atime_nsec()),
            mtime: nanos(meta.mtime(), meta.mtime_nsec()),
            ctime: nanos(meta.ctime(), meta.ctime_nsec()),
        })
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Modify and change times; reading a file moves only the access time
    pub fn content_times(&self) -> (i64, i64) {
        (self.mtime, self.ctime)
    }
}

fn nanos(secs: i64, nsec: i64) -> i64 {
    secs.saturating_mul(1_000_000_000).saturating_add(nsec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_matches_known_digest() {
        assert_eq!(data_fingerprint(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(file_fingerprint(&path), data_fingerprint(b"abc"));
    }

    #[test]
    fn test_missing_file_has_empty_fingerprint() {
        assert_eq!(file_fingerprint(Path::new("/nonexistent/pactest/file")), "");
    }

    #[test]
    fn test_file_times() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        let times = FileTimes::of(&path).unwrap();
        assert!(!times.is_zero());
        assert!(times.mtime > 0);
        assert!(FileTimes::of(&dir.path().join("missing")).is_err());
    }
}
