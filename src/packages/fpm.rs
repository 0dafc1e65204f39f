// src/packages/fpm.rs

//! pacman-g2 package archives (.fpm)
//!
//! A package is a gzip-compressed tarball holding `.PKGINFO`, an optional
//! `.INSTALL` scriptlet file, a `.FILELIST`, and the payload. The harness
//! generates the payload itself: every regular file contains its own
//! manifest entry followed by a newline.

use crate::config::Config;
use crate::db::record::{BackupEntry, PackageRecord};
use crate::db::section;
use crate::error::{Error, Result};
use crate::fixture::{self, EntryKind};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

const PKGINFO: &str = ".PKGINFO";
const INSTALL: &str = ".INSTALL";
const FILELIST: &str = ".FILELIST";

/// Render `.PKGINFO` for a package
pub fn pkginfo(pkg: &PackageRecord) -> String {
    let mut data = vec![
        format!("pkgname = {}", pkg.name),
        format!("pkgver = {}", pkg.version),
        format!("pkgdesc = {}", pkg.description),
        format!("url = {}", pkg.url),
        format!("builddate = {}", pkg.build_date),
        format!("packager = {}", pkg.packager),
        format!("size = {}", pkg.size),
    ];
    if !pkg.arch.is_empty() {
        data.push(format!("arch = {}", pkg.arch));
    }
    let lists: [(&str, Vec<&str>); 8] = [
        ("license", pkg.license.iter().map(String::as_str).collect()),
        ("replaces", pkg.replaces.iter().map(String::as_str).collect()),
        ("group", pkg.groups.iter().map(String::as_str).collect()),
        ("depend", pkg.depends.iter().map(String::as_str).collect()),
        ("conflict", pkg.conflicts.iter().map(String::as_str).collect()),
        ("provides", pkg.provides.iter().map(String::as_str).collect()),
        ("backup", pkg.backup.iter().map(|b| b.path.as_str()).collect()),
        ("remove", pkg.removes.iter().map(String::as_str).collect()),
    ];
    for (key, values) in lists {
        data.extend(values.into_iter().map(|v| format!("{} = {}", key, v)));
    }
    let mut out = data.join("\n");
    out.push('\n');
    out
}

/// Parse `.PKGINFO` content back into a record
pub fn parse_pkginfo(content: &str) -> Result<PackageRecord> {
    let mut pkg = PackageRecord::default();

    for line in content.lines() {
        let line = line.trim();

        // Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().to_string();
        match key.trim() {
            "pkgname" => pkg.name = value,
            "pkgver" => pkg.version = value,
            "pkgdesc" => pkg.description = value,
            "url" => pkg.url = value,
            "builddate" => pkg.build_date = value,
            "packager" => pkg.packager = value,
            "size" => {
                pkg.size = value
                    .parse()
                    .map_err(|_| Error::Archive(format!("Invalid size in {}: {}", PKGINFO, value)))?
            }
            "arch" => pkg.arch = value,
            "license" => pkg.license.push(value),
            "replaces" => pkg.replaces.push(value),
            "group" => pkg.groups.push(value),
            "depend" => pkg.depends.push(value),
            "conflict" => pkg.conflicts.push(value),
            "provides" => pkg.provides.push(value),
            "backup" => pkg.backup.push(BackupEntry::new(value, "")),
            "remove" => pkg.removes.push(value),
            _ => {} // Ignore unknown keys
        }
    }

    if pkg.name.is_empty() || pkg.version.is_empty() {
        return Err(Error::Archive(format!("{} lacks pkgname or pkgver", PKGINFO)));
    }
    Ok(pkg)
}

/// Render `.INSTALL`, or `None` when the package has no scriptlets
pub fn install_script(pkg: &PackageRecord) -> Option<String> {
    (!pkg.scriptlets.is_empty()).then(|| section::encode_install(&pkg.scriptlets))
}

fn header(entry_type: EntryType, mode: u32, size: u64, mtime: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_size(size);
    header.set_mtime(mtime);
    header
}

fn append_file<W: Write>(builder: &mut Builder<W>, path: &str, data: &[u8], mtime: u64) -> io::Result<()> {
    let mut h = header(EntryType::Regular, 0o644, data.len() as u64, mtime);
    builder.append_data(&mut h, path, data)
}

/// Build the package archive of `pkg` in `dir`
///
/// The record's size is set to the total size of the payload files. Returns
/// the path of the archive, `<name>-<version>-<arch><pkg_extension>`.
pub fn make_package(pkg: &mut PackageRecord, dir: &Path, config: &Config) -> Result<PathBuf> {
    let archive = dir.join(pkg.filename(&config.pkg_extension));
    debug!("Building package archive: {}", archive.display());
    fs::create_dir_all(dir)?;

    pkg.size = pkg
        .files
        .iter()
        .filter(|f| matches!(fixture::parse_entry(f).1, EntryKind::File | EntryKind::Altered))
        .map(|f| f.len() as i64 + 1)
        .sum();

    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let encoder = GzEncoder::new(File::create(&archive)?, Compression::default());
    let mut builder = Builder::new(encoder);

    append_file(&mut builder, PKGINFO, pkginfo(pkg).as_bytes(), mtime)?;
    if let Some(script) = install_script(pkg) {
        append_file(&mut builder, INSTALL, script.as_bytes(), mtime)?;
    }

    if !pkg.files.is_empty() {
        let mut filelist = section::expand_file_list(&pkg.files).join("\n");
        filelist.push('\n');
        append_file(&mut builder, FILELIST, filelist.as_bytes(), mtime)?;

        // Parent directories first, then the manifest entries themselves
        for dir in section::expand_file_list(&pkg.files)
            .iter()
            .filter(|p| p.ends_with('/'))
        {
            let mut h = header(EntryType::Directory, 0o755, 0, mtime);
            builder.append_data(&mut h, dir, io::empty())?;
        }

        for entry in &pkg.files {
            let (path, kind) = fixture::parse_entry(entry);
            match kind {
                EntryKind::Directory => {}
                EntryKind::Symlink { target } => {
                    let mut h = header(EntryType::Symlink, 0o777, 0, mtime);
                    h.set_link_name(&target)?;
                    builder.append_data(&mut h, path, io::empty())?;
                }
                EntryKind::File | EntryKind::Altered => {
                    append_file(&mut builder, path, format!("{}\n", entry).as_bytes(), mtime)?;
                }
            }
        }
    }

    builder.into_inner()?.finish()?;
    Ok(archive)
}

fn open_archive(path: &Path) -> Result<Archive<GzDecoder<File>>> {
    let file = File::open(path)
        .map_err(|e| Error::Archive(format!("Failed to open package file {}: {}", path.display(), e)))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Read the metadata of a package archive
pub fn read_package(path: &Path) -> Result<PackageRecord> {
    let mut archive = open_archive(path)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_string_lossy() == PKGINFO {
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            return parse_pkginfo(&content);
        }
    }
    Err(Error::Archive(format!("No {} found in {}", PKGINFO, path.display())))
}

/// Paths of all entries of a package archive, in archive order
pub fn list_entries(path: &Path) -> Result<Vec<String>> {
    let mut archive = open_archive(path)?;
    let mut names = Vec::new();
    for entry in archive.entries()? {
        names.push(entry?.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}
