// src/db/record.rs

//! In-memory package records
//!
//! A `PackageRecord` holds everything the harness knows about one package:
//! its metadata, its dependency lists, its file manifest and its scriptlets.
//! Which fields reach the disk depends on the repository kind (see
//! `db::section`).

use crate::fixture;
use crate::hash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Installed explicitly by the user
pub const REASON_EXPLICIT: i32 = 0;
/// Pulled in as a dependency
pub const REASON_DEPEND: i32 = 1;

/// A file marked as user configuration, with its content fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub path: String,
    pub fingerprint: String,
}

impl BackupEntry {
    pub fn new(path: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Backup entry for a fixture file, fingerprinted over the content the
    /// fixture builder writes for it
    pub fn from_fixture(entry: &str) -> Self {
        let path = fixture::filename_of(entry);
        Self::new(path, hash::data_fingerprint(format!("{}\n", entry).as_bytes()))
    }

    /// Parse a `path<TAB>fingerprint` line
    pub fn parse(line: &str) -> Self {
        match line.split_once('\t') {
            Some((path, fingerprint)) => Self::new(path, fingerprint),
            None => Self::new(line, ""),
        }
    }
}

impl fmt::Display for BackupEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.path, self.fingerprint)
    }
}

/// Scriptlet bodies for the package lifecycle hooks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scriptlets {
    pub pre_install: String,
    pub post_install: String,
    pub pre_remove: String,
    pub post_remove: String,
    pub pre_upgrade: String,
    pub post_upgrade: String,
}

impl Scriptlets {
    /// Hook names in the order they are written to disk
    pub const HOOKS: [&'static str; 6] = [
        "pre_install",
        "post_install",
        "pre_remove",
        "post_remove",
        "pre_upgrade",
        "post_upgrade",
    ];

    /// Body of a hook by name
    pub fn get(&self, hook: &str) -> Option<&str> {
        let body = match hook {
            "pre_install" => &self.pre_install,
            "post_install" => &self.post_install,
            "pre_remove" => &self.pre_remove,
            "post_remove" => &self.post_remove,
            "pre_upgrade" => &self.pre_upgrade,
            "post_upgrade" => &self.post_upgrade,
            _ => return None,
        };
        Some(body.as_str())
    }

    /// Mutable body of a hook by name
    pub fn get_mut(&mut self, hook: &str) -> Option<&mut String> {
        let body = match hook {
            "pre_install" => &mut self.pre_install,
            "post_install" => &mut self.post_install,
            "pre_remove" => &mut self.pre_remove,
            "post_remove" => &mut self.post_remove,
            "pre_upgrade" => &mut self.pre_upgrade,
            "post_upgrade" => &mut self.post_upgrade,
            _ => return None,
        };
        Some(body)
    }

    /// Non-empty hooks in lifecycle order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        Self::HOOKS
            .iter()
            .filter_map(|hook| self.get(hook).map(|body| (*hook, body)))
            .filter(|(_, body)| !body.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Metadata and manifest of a single package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    /// `<upstream>-<release>`
    pub version: String,
    pub arch: String,
    pub description: String,
    pub url: String,
    pub license: Vec<String>,
    pub groups: Vec<String>,
    pub build_date: String,
    pub install_date: String,
    pub packager: String,
    pub size: i64,
    pub csize: i64,
    pub reason: i32,
    /// Checksum of the package archive (sync repositories only)
    pub sha1sum: String,
    /// Sync repositories only
    pub replaces: Vec<String>,
    pub force: bool,
    pub stick: bool,

    pub depends: Vec<String>,
    /// Back-references, persisted in the `local` repository only
    pub required_by: Vec<String>,
    pub conflicts: Vec<String>,
    pub provides: Vec<String>,

    /// File manifest in fixture syntax
    pub files: Vec<String>,
    pub backup: Vec<BackupEntry>,
    /// Files the package archive asks the subject to remove
    pub removes: Vec<String>,

    pub scriptlets: Scriptlets,
}

impl PackageRecord {
    /// Create a record for the host architecture
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: std::env::consts::ARCH.to_string(),
            ..Default::default()
        }
    }

    /// Directory name inside a repository: `name-version`
    pub fn dbname(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// `name-version-arch`
    pub fn fullname(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.arch)
    }

    /// Package archive file name, e.g. `dummy-1.0-1-x86_64.fpm`
    pub fn filename(&self, extension: &str) -> String {
        format!("{}{}", self.fullname(), extension)
    }

    /// Whether `path` is listed in the backup array
    pub fn has_backup(&self, path: &str) -> bool {
        self.backup.iter().any(|b| b.path == path)
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.fullname())?;
        writeln!(f, "description: {}", self.description)?;
        writeln!(f, "url: {}", self.url)?;
        writeln!(f, "depends: {}", self.depends.join(" "))?;
        writeln!(f, "files: {}", self.files.join(" "))?;
        write!(f, "reason: {}", self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let mut pkg = PackageRecord::new("dummy", "1.0-1");
        pkg.arch = "x86_64".to_string();
        assert_eq!(pkg.dbname(), "dummy-1.0-1");
        assert_eq!(pkg.fullname(), "dummy-1.0-1-x86_64");
        assert_eq!(pkg.filename(".fpm"), "dummy-1.0-1-x86_64.fpm");
    }

    #[test]
    fn test_backup_entry_parse() {
        let entry = BackupEntry::parse("etc/dummy.conf\tabc123");
        assert_eq!(entry.path, "etc/dummy.conf");
        assert_eq!(entry.fingerprint, "abc123");
        assert_eq!(entry.to_string(), "etc/dummy.conf\tabc123");

        let bare = BackupEntry::parse("etc/other.conf");
        assert_eq!(bare.path, "etc/other.conf");
        assert!(bare.fingerprint.is_empty());
    }

    #[test]
    fn test_backup_from_fixture_strips_marker() {
        let entry = BackupEntry::from_fixture("etc/dummy.conf*");
        assert_eq!(entry.path, "etc/dummy.conf");
        assert_eq!(entry.fingerprint, hash::data_fingerprint(b"etc/dummy.conf*\n"));
    }

    #[test]
    fn test_scriptlets_order() {
        let mut scripts = Scriptlets::default();
        assert!(scripts.is_empty());

        scripts.post_upgrade = "echo up".to_string();
        *scripts.get_mut("pre_install").unwrap() = "echo pre".to_string();

        let hooks: Vec<_> = scripts.iter().collect();
        assert_eq!(hooks, vec![("pre_install", "echo pre"), ("post_upgrade", "echo up")]);
        assert!(scripts.get_mut("bogus").is_none());
    }
}
