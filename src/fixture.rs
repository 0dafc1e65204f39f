// src/fixture.rs

//! Filesystem fixtures
//!
//! Test cases describe files with a small syntax:
//! - `path/to/file` - regular file whose content is the entry text
//! - `path/to/dir/` - directory
//! - `path/to/link -> target` - symlink (target relative to the link's directory)
//! - `path/to/file*` - regular file flagged as altered by the test case
//!
//! Files materialized here can be tracked so FILE_MODIFIED rules can tell
//! whether the subject rewrote them.

use crate::error::Result;
use crate::hash::{self, FileTimes};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const LINK_SEPARATOR: &str = " -> ";

/// Parsed form of a fixture entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Altered,
    Directory,
    Symlink { target: String },
}

/// Split a fixture entry into its path and kind
pub fn parse_entry(entry: &str) -> (&str, EntryKind) {
    if let Some((path, target)) = entry.split_once(LINK_SEPARATOR) {
        (
            path,
            EntryKind::Symlink {
                target: target.to_string(),
            },
        )
    } else if let Some(path) = entry.strip_suffix('*') {
        (path, EntryKind::Altered)
    } else if entry.ends_with('/') {
        (entry, EntryKind::Directory)
    } else {
        (entry, EntryKind::File)
    }
}

/// Path component of a fixture entry (link target and altered marker removed)
pub fn filename_of(entry: &str) -> &str {
    parse_entry(entry).0
}

/// Write `data` to `path`, creating parent directories
///
/// A trailing newline is appended to non-empty data that lacks one.
pub fn write_file(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = data.to_string();
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// Materialize one fixture entry under `root`
pub fn make_entry(root: &Path, entry: &str, data: &str) -> Result<()> {
    let (name, kind) = parse_entry(entry);
    let path = root.join(name);
    debug!("Creating fixture {:?}: {}", kind, path.display());

    match kind {
        EntryKind::Directory => fs::create_dir_all(&path)?,
        EntryKind::Symlink { target } => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            std::os::unix::fs::symlink(target, &path)?;
        }
        EntryKind::File | EntryKind::Altered => write_file(&path, data)?,
    }

    Ok(())
}

/// Materialize a fixture entry whose content is its own entry text
pub fn install_entry(root: &Path, entry: &str) -> Result<()> {
    make_entry(root, entry, entry)
}

/// A filesystem entry whose modification state can be queried
pub trait Tracked {
    /// Path of the entry relative to the test root
    fn name(&self) -> &str;

    /// Whether the entry changed since it started being tracked
    fn is_modified(&self) -> bool;
}

/// Fingerprint and timestamps of a file taken before the subject runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    name: String,
    path: PathBuf,
    fingerprint: String,
    times: FileTimes,
}

impl TrackedFile {
    /// Start tracking `root/name`; a missing file is tracked as absent
    pub fn new(root: &Path, name: &str) -> Self {
        let name = filename_of(name).to_string();
        let path = root.join(&name);
        let fingerprint = hash::file_fingerprint(&path);
        let times = FileTimes::of(&path).unwrap_or_default();
        Self {
            name,
            path,
            fingerprint,
            times,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Tracked for TrackedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_modified(&self) -> bool {
        let times = FileTimes::of(&self.path).unwrap_or_default();
        let fingerprint = hash::file_fingerprint(&self.path);
        let modified = fingerprint != self.fingerprint
            || times.content_times() != self.times.content_times();
        debug!(
            "{}: fingerprint {} -> {}, modified={}",
            self.name, self.fingerprint, fingerprint, modified
        );
        modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_entry() {
        assert_eq!(parse_entry("bin/dummy"), ("bin/dummy", EntryKind::File));
        assert_eq!(parse_entry("etc/dummy.conf*"), ("etc/dummy.conf", EntryKind::Altered));
        assert_eq!(parse_entry("usr/share/"), ("usr/share/", EntryKind::Directory));
        assert_eq!(
            parse_entry("lib/libfoo.so -> libfoo.so.1"),
            (
                "lib/libfoo.so",
                EntryKind::Symlink {
                    target: "libfoo.so.1".to_string()
                }
            )
        );
    }

    #[test]
    fn test_make_entries() {
        let root = TempDir::new().unwrap();
        for entry in ["bin/dummy", "etc/dummy.conf*", "usr/share/doc/", "bin/alias -> dummy"] {
            install_entry(root.path(), entry).unwrap();
        }

        let content = fs::read_to_string(root.path().join("bin/dummy")).unwrap();
        assert_eq!(content, "bin/dummy\n");
        let altered = fs::read_to_string(root.path().join("etc/dummy.conf")).unwrap();
        assert_eq!(altered, "etc/dummy.conf*\n");
        assert!(root.path().join("usr/share/doc").is_dir());

        let link = root.path().join("bin/alias");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("dummy"));
    }

    #[test]
    fn test_tracked_file_detects_rewrite() {
        let root = TempDir::new().unwrap();
        install_entry(root.path(), "etc/dummy.conf").unwrap();

        let tracked = TrackedFile::new(root.path(), "etc/dummy.conf*");
        assert_eq!(tracked.name(), "etc/dummy.conf");
        assert!(!tracked.is_modified());

        fs::write(tracked.path(), "changed by the subject\n").unwrap();
        assert!(tracked.is_modified());
    }

    #[test]
    fn test_tracked_missing_file() {
        let root = TempDir::new().unwrap();
        let tracked = TrackedFile::new(root.path(), "etc/absent");
        assert!(!tracked.is_modified());

        install_entry(root.path(), "etc/absent").unwrap();
        assert!(tracked.is_modified());
    }
}
