// src/db/mod.rs

//! Package database layer
//!
//! A repository is a directory holding one subdirectory per package entry,
//! `<name>-<version>/`, with the text files described in `section`:
//! - `local` is the installed-system view: `desc`, `files`, `depends` and
//!   optionally `install`
//! - any other name is a sync repository: `desc` and `depends`, plus a
//!   gzip-compressed tarball of the whole directory built by `gensync`

pub mod record;
pub mod section;
pub mod snapshot;

pub use record::{BackupEntry, PackageRecord, Scriptlets};
pub use snapshot::{SectionKey, SectionState, Snapshot};

use crate::config::Config;
use crate::error::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the installed-system repository
pub const LOCAL: &str = "local";

/// A package record together with the state of the files it was read from
#[derive(Debug, Clone)]
pub struct DbEntry {
    pub record: PackageRecord,
    pub snapshot: Snapshot,
}

/// Split a package directory name on its last two hyphens
///
/// `foo-bar-1.0-2` gives `("foo-bar", "1.0", "2")`.
pub fn split_dbname(dirname: &str) -> Option<(&str, &str, &str)> {
    let mut parts = dirname.rsplitn(3, '-');
    let release = parts.next()?;
    let version = parts.next()?;
    let name = parts.next()?;
    Some((name, version, release))
}

/// A named package database rooted in a test root
#[derive(Debug, Clone)]
pub struct Repository {
    treename: String,
    dbdir: PathBuf,
    archive: Option<PathBuf>,
    /// Snapshots of the entries written through this repository
    written: HashMap<String, Snapshot>,
}

impl Repository {
    /// Repository `treename` under `root/<dbpath>`
    pub fn new(treename: &str, root: &Path, config: &Config) -> Self {
        let dbroot = root.join(&config.dbpath);
        let archive = (treename != LOCAL)
            .then(|| dbroot.join(format!("{}{}", treename, config.db_extension)));
        Self {
            treename: treename.to_string(),
            dbdir: dbroot.join(treename),
            archive,
            written: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.treename
    }

    pub fn is_local(&self) -> bool {
        self.treename == LOCAL
    }

    /// Directory holding the package entries
    pub fn path(&self) -> &Path {
        &self.dbdir
    }

    /// Location of the compressed database (sync repositories only)
    pub fn archive_path(&self) -> Option<&Path> {
        self.archive.as_deref()
    }

    /// Write a package entry and return the state of the files written
    ///
    /// The snapshot is also remembered so that `is_modified` can later tell
    /// whether something else rewrote the entry.
    pub fn write(&mut self, pkg: &PackageRecord) -> Result<Snapshot> {
        let local = self.is_local();
        let path = self.dbdir.join(pkg.dbname());
        debug!("Writing {} entry: {}", self.treename, path.display());
        fs::create_dir_all(&path)?;

        let mut snapshot = Snapshot::new();
        write_section(&path, SectionKey::Desc, &section::encode_desc(pkg, local), &mut snapshot)?;
        if local {
            write_section(&path, SectionKey::Files, &section::encode_files(pkg), &mut snapshot)?;
        }
        write_section(
            &path,
            SectionKey::Depends,
            &section::encode_depends(pkg, local),
            &mut snapshot,
        )?;
        if local && !pkg.scriptlets.is_empty() {
            write_section(
                &path,
                SectionKey::Install,
                &section::encode_install(&pkg.scriptlets),
                &mut snapshot,
            )?;
        }

        self.written.insert(pkg.name.clone(), snapshot.clone());
        Ok(snapshot)
    }

    /// Find the entry directory for package `name`
    fn find_entry(&self, name: &str) -> Result<Option<(PathBuf, String)>> {
        let mut dirnames = match self.entry_dirnames() {
            Ok(names) => names,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        dirnames.sort();

        Ok(dirnames.into_iter().find_map(|dirname| {
            let (pkgname, pkgver, pkgrel) = split_dbname(&dirname)?;
            (pkgname == name).then(|| {
                let version = format!("{}-{}", pkgver, pkgrel);
                (self.dbdir.join(&dirname), version)
            })
        }))
    }

    fn entry_dirnames(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dbdir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    /// Read the entry of package `name`
    ///
    /// Returns `Ok(None)` when the repository directory or the entry does
    /// not exist. A missing `install` file (or, for sync repositories, a
    /// missing `files`/`depends` file) leaves its section at the zero state.
    pub fn read(&self, name: &str) -> Result<Option<DbEntry>> {
        let Some((path, version)) = self.find_entry(name)? else {
            debug!("{}: no entry for {}", self.treename, name);
            return Ok(None);
        };

        let mut record = PackageRecord {
            name: name.to_string(),
            version,
            ..Default::default()
        };
        let mut snapshot = Snapshot::new();

        let desc = path.join(SectionKey::Desc.file_name());
        section::decode_desc(&fs::read_to_string(&desc)?, &mut record)?;
        snapshot.insert(SectionKey::Desc, SectionState::capture(&desc));

        if let Some(content) = read_optional(&path, SectionKey::Files, &mut snapshot)? {
            section::decode_files(&content, &mut record)?;
        }
        if let Some(content) = read_optional(&path, SectionKey::Depends, &mut snapshot)? {
            section::decode_depends(&content, &mut record)?;
        }
        if let Some(content) = read_optional(&path, SectionKey::Install, &mut snapshot)? {
            section::decode_install(&content, &mut record);
        }

        Ok(Some(DbEntry { record, snapshot }))
    }

    /// Names of all packages with an entry in this repository
    pub fn list(&self) -> Result<Vec<String>> {
        let dirnames = match self.entry_dirnames() {
            Ok(names) => names,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names: Vec<String> = dirnames
            .iter()
            .filter_map(|d| split_dbname(d).map(|(name, _, _)| name.to_string()))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Adopt `snapshot` as the reference state of `name`
    ///
    /// Used when the entry was written by an earlier process and its
    /// snapshot was persisted.
    pub fn remember(&mut self, name: &str, snapshot: Snapshot) {
        self.written.insert(name.to_string(), snapshot);
    }

    /// Snapshot taken when `name` was last written through this repository
    pub fn written_snapshot(&self, name: &str) -> Option<&Snapshot> {
        self.written.get(name)
    }

    /// Whether the entry of `name` changed since this repository wrote it
    ///
    /// Packages never written through this repository are reported
    /// unmodified.
    pub fn is_modified(&self, name: &str, current: &Snapshot) -> bool {
        match self.written.get(name) {
            Some(old) => Snapshot::is_modified(old, current),
            None => false,
        }
    }

    /// Build the compressed database of a sync repository
    ///
    /// Archives the immediate contents of the repository directory. Does
    /// nothing for `local`.
    pub fn gensync(&self) -> Result<()> {
        let Some(archive) = &self.archive else {
            return Ok(());
        };
        info!("Generating sync database: {}", archive.display());

        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.dbdir)?;

        let mut children: Vec<_> = fs::read_dir(&self.dbdir)?.collect::<std::io::Result<_>>()?;
        children.sort_by_key(|e| e.file_name());

        let encoder = GzEncoder::new(File::create(archive)?, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for child in children {
            let name = child.file_name();
            if child.file_type()?.is_dir() {
                builder.append_dir_all(&name, child.path())?;
            } else {
                builder.append_path_with_name(child.path(), &name)?;
            }
        }
        builder.into_inner()?.finish()?;

        Ok(())
    }
}

fn write_section(dir: &Path, key: SectionKey, content: &str, snapshot: &mut Snapshot) -> Result<()> {
    let path = dir.join(key.file_name());
    fs::write(&path, content)?;
    snapshot.insert(key, SectionState::capture(&path));
    Ok(())
}

fn read_optional(dir: &Path, key: SectionKey, snapshot: &mut Snapshot) -> Result<Option<String>> {
    let path = dir.join(key.file_name());
    match fs::read_to_string(&path) {
        Ok(content) => {
            snapshot.insert(key, SectionState::capture(&path));
            Ok(Some(content))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
