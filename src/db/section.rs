// src/db/section.rs

//! Text encoding of package database entries
//!
//! Each file of an entry is a sequence of sections:
//!
//! ```text
//! %NAME%
//! dummy
//!
//! %GROUPS%
//! base
//! devel
//!
//! ```
//!
//! Scalar sections hold exactly one line, list sections hold lines up to the
//! next blank line. The byte layout must match what pacman-g2 itself writes.

use crate::db::record::{BackupEntry, PackageRecord, Scriptlets};
use crate::error::{Error, Result};
use crate::fixture;
use std::collections::BTreeSet;
use std::str::Lines;

/// Accumulates sections for one file, skipping empty values
#[derive(Default)]
struct SectionWriter {
    blocks: Vec<String>,
}

impl SectionWriter {
    fn always(&mut self, title: &str, body: &str) {
        self.blocks.push(format!("%{}%\n{}\n", title, body));
    }

    fn scalar(&mut self, title: &str, value: &str) {
        if !value.is_empty() {
            self.always(title, value);
        }
    }

    fn list<S: AsRef<str>>(&mut self, title: &str, values: &[S]) {
        if !values.is_empty() {
            let body: Vec<&str> = values.iter().map(|v| v.as_ref()).collect();
            self.always(title, &body.join("\n"));
        }
    }

    fn integer(&mut self, title: &str, value: i64) {
        if value != 0 {
            self.always(title, &value.to_string());
        }
    }

    fn flag(&mut self, title: &str, set: bool) {
        if set {
            self.always(title, "");
        }
    }

    fn finish(self) -> String {
        if self.blocks.is_empty() {
            String::new()
        } else {
            let mut out = self.blocks.join("\n");
            out.push('\n');
            out
        }
    }
}

/// Encode the `desc` file
pub fn encode_desc(pkg: &PackageRecord, local: bool) -> String {
    let mut w = SectionWriter::default();
    w.always("NAME", &pkg.name);
    w.always("VERSION", &pkg.version);
    w.scalar("DESC", &pkg.description);
    w.list("GROUPS", &pkg.groups);
    w.scalar("ARCH", &pkg.arch);
    if local {
        w.scalar("URL", &pkg.url);
        w.list("LICENSE", &pkg.license);
        w.scalar("BUILDDATE", &pkg.build_date);
        w.scalar("INSTALLDATE", &pkg.install_date);
        w.scalar("PACKAGER", &pkg.packager);
        w.integer("SIZE", pkg.size);
        w.integer("REASON", i64::from(pkg.reason));
    } else {
        w.integer("CSIZE", pkg.csize);
        w.scalar("SHA1SUM", &pkg.sha1sum);
        w.list("REPLACES", &pkg.replaces);
        w.flag("FORCE", pkg.force);
        w.flag("STICK", pkg.stick);
    }
    w.finish()
}

/// Encode the `files` file (local repositories only)
pub fn encode_files(pkg: &PackageRecord) -> String {
    let mut w = SectionWriter::default();
    w.list("FILES", &expand_file_list(&pkg.files));
    let backup: Vec<String> = pkg.backup.iter().map(|b| b.to_string()).collect();
    w.list("BACKUP", &backup);
    w.finish()
}

/// Encode the `depends` file
pub fn encode_depends(pkg: &PackageRecord, local: bool) -> String {
    let mut w = SectionWriter::default();
    w.list("DEPENDS", &pkg.depends);
    if local {
        w.list("REQUIREDBY", &pkg.required_by);
    }
    w.list("CONFLICTS", &pkg.conflicts);
    w.list("PROVIDES", &pkg.provides);
    w.finish()
}

/// Encode the `install` file, one shell function per non-empty hook
pub fn encode_install(scriptlets: &Scriptlets) -> String {
    let functions: Vec<String> = scriptlets
        .iter()
        .map(|(hook, body)| format!("{}() {{\n{}\n}}", hook, body))
        .collect();
    let mut out = functions.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Expand a file manifest with every directory leading to its entries
///
/// `usr/local/bin/dummy` yields `usr/`, `usr/local/`, `usr/local/bin/` and
/// `usr/local/bin/dummy`. The result is deduplicated and sorted bytewise,
/// which is the order pacman-g2 keeps its `%FILES%` section in.
pub fn expand_file_list<S: AsRef<str>>(files: &[S]) -> Vec<String> {
    let mut expanded = BTreeSet::new();
    for entry in files {
        let mut dir = fixture::filename_of(entry.as_ref());
        expanded.insert(dir.to_string());
        while let Some((parent, _)) = dir.rsplit_once('/') {
            expanded.insert(format!("{}/", parent));
            dir = parent;
        }
    }
    expanded.into_iter().collect()
}

/// Line cursor over one section file
struct SectionReader<'a> {
    file: &'a str,
    lines: Lines<'a>,
}

impl<'a> SectionReader<'a> {
    fn new(file: &'a str, content: &'a str) -> Self {
        Self {
            file,
            lines: content.lines(),
        }
    }

    /// Advance to the next `%TITLE%` line and return the title
    fn next_section(&mut self) -> Option<&'a str> {
        self.lines.by_ref().find_map(|line| {
            line.strip_prefix('%')
                .and_then(|rest| rest.strip_suffix('%'))
                .filter(|title| !title.is_empty())
        })
    }

    fn scalar(&mut self, section: &str) -> Result<String> {
        self.lines
            .next()
            .map(str::to_string)
            .ok_or_else(|| Error::MalformedSection {
                file: self.file.to_string(),
                section: section.to_string(),
            })
    }

    fn list(&mut self) -> Vec<String> {
        self.lines
            .by_ref()
            .take_while(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn integer(&mut self, section: &str) -> Result<i64> {
        let value = self.scalar(section)?;
        value.trim().parse().map_err(|_| Error::InvalidInteger {
            file: self.file.to_string(),
            section: section.to_string(),
            value,
        })
    }

    fn reason(&mut self, section: &str) -> Result<i32> {
        let value = self.integer(section)?;
        i32::try_from(value).map_err(|_| Error::InvalidInteger {
            file: self.file.to_string(),
            section: section.to_string(),
            value: value.to_string(),
        })
    }

    /// Consume the (empty) body of a presence-only section
    fn flag(&mut self) -> bool {
        self.lines.next();
        true
    }
}

/// Decode a `desc` file into `pkg`
///
/// Name and version come from the entry's directory name; `%NAME%` and
/// `%VERSION%` are not read back.
pub fn decode_desc(content: &str, pkg: &mut PackageRecord) -> Result<()> {
    let mut r = SectionReader::new("desc", content);
    while let Some(section) = r.next_section() {
        match section {
            "DESC" => pkg.description = r.scalar(section)?,
            "GROUPS" => pkg.groups = r.list(),
            "URL" => pkg.url = r.scalar(section)?,
            "LICENSE" => pkg.license = r.list(),
            "ARCH" => pkg.arch = r.scalar(section)?,
            "BUILDDATE" => pkg.build_date = r.scalar(section)?,
            "INSTALLDATE" => pkg.install_date = r.scalar(section)?,
            "PACKAGER" => pkg.packager = r.scalar(section)?,
            "REASON" => pkg.reason = r.reason(section)?,
            "SIZE" => pkg.size = r.integer(section)?,
            "CSIZE" => {
                pkg.csize = r.integer(section)?;
                pkg.size = pkg.csize;
            }
            "SHA1SUM" => pkg.sha1sum = r.scalar(section)?,
            "REPLACES" => pkg.replaces = r.list(),
            "FORCE" => pkg.force = r.flag(),
            "STICK" => pkg.stick = r.flag(),
            _ => {}
        }
    }
    Ok(())
}

/// Decode a `files` file into `pkg`
///
/// Directory entries synthesized by `expand_file_list` are dropped so the
/// manifest matches what was written.
pub fn decode_files(content: &str, pkg: &mut PackageRecord) -> Result<()> {
    let mut r = SectionReader::new("files", content);
    while let Some(section) = r.next_section() {
        match section {
            "FILES" => {
                pkg.files = r.list().into_iter().filter(|f| !f.ends_with('/')).collect();
            }
            "BACKUP" => {
                pkg.backup = r.list().iter().map(|line| BackupEntry::parse(line)).collect();
            }
            _ => {}
        }
    }
    Ok(())
}

/// Decode a `depends` file into `pkg`
///
/// Sync entries written by pacman-g2 itself carry `%REPLACES%`, `%FORCE%`
/// and `%STICK%` here rather than in `desc`.
pub fn decode_depends(content: &str, pkg: &mut PackageRecord) -> Result<()> {
    let mut r = SectionReader::new("depends", content);
    while let Some(section) = r.next_section() {
        match section {
            "DEPENDS" => pkg.depends = r.list(),
            "REQUIREDBY" => pkg.required_by = r.list(),
            "CONFLICTS" => pkg.conflicts = r.list(),
            "PROVIDES" => pkg.provides = r.list(),
            "REPLACES" => pkg.replaces = r.list(),
            "FORCE" => pkg.force = r.flag(),
            "STICK" => pkg.stick = r.flag(),
            _ => {}
        }
    }
    Ok(())
}

/// Decode an `install` file into `pkg.scriptlets`
///
/// Functions named after unknown hooks are ignored.
pub fn decode_install(content: &str, pkg: &mut PackageRecord) {
    let mut lines = content.lines();
    while let Some(line) = lines.next() {
        let Some(hook) = line.strip_suffix("() {") else {
            continue;
        };
        let body: Vec<&str> = lines.by_ref().take_while(|l| *l != "}").collect();
        if let Some(slot) = pkg.scriptlets.get_mut(hook) {
            *slot = body.join("\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_pkg() -> PackageRecord {
        let mut pkg = PackageRecord::new("dummy", "1.0-1");
        pkg.arch = "i686".to_string();
        pkg.description = "A dummy package".to_string();
        pkg.groups = vec!["base".to_string(), "devel".to_string()];
        pkg.size = 42;
        pkg.reason = 1;
        pkg
    }

    #[test]
    fn test_expand_file_list() {
        assert_eq!(
            expand_file_list(&["usr/local/bin/dummy"]),
            vec!["usr/", "usr/local/", "usr/local/bin/", "usr/local/bin/dummy"]
        );
    }

    #[test]
    fn test_expand_file_list_dedups_and_sorts() {
        let files = ["usr/bin/b", "etc/dummy.conf*", "usr/bin/a", "usr/lib/libx.so -> libx.so.1"];
        assert_eq!(
            expand_file_list(&files),
            vec![
                "etc/",
                "etc/dummy.conf",
                "usr/",
                "usr/bin/",
                "usr/bin/a",
                "usr/bin/b",
                "usr/lib/",
                "usr/lib/libx.so",
            ]
        );
    }

    #[test]
    fn test_encode_local_desc() {
        let desc = encode_desc(&local_pkg(), true);
        assert_eq!(
            desc,
            "%NAME%\ndummy\n\n%VERSION%\n1.0-1\n\n%DESC%\nA dummy package\n\n\
             %GROUPS%\nbase\ndevel\n\n%ARCH%\ni686\n\n%SIZE%\n42\n\n%REASON%\n1\n\n"
        );
    }

    #[test]
    fn test_encode_sync_desc_flags() {
        let mut pkg = PackageRecord::new("dummy", "1.0-1");
        pkg.arch.clear();
        pkg.csize = 100;
        pkg.size = 7;
        pkg.force = true;
        pkg.stick = true;
        pkg.required_by = vec!["other".to_string()];

        let desc = encode_desc(&pkg, false);
        assert_eq!(
            desc,
            "%NAME%\ndummy\n\n%VERSION%\n1.0-1\n\n%CSIZE%\n100\n\n%FORCE%\n\n\n%STICK%\n\n\n"
        );
        assert!(!encode_depends(&pkg, false).contains("REQUIREDBY"));
        assert!(encode_depends(&pkg, true).contains("%REQUIREDBY%\nother\n"));
    }

    #[test]
    fn test_empty_file_encodes_to_nothing() {
        let pkg = PackageRecord::new("dummy", "1.0-1");
        assert_eq!(encode_depends(&pkg, true), "");
        assert_eq!(encode_files(&pkg), "");
        assert_eq!(encode_install(&pkg.scriptlets), "");
    }

    #[test]
    fn test_desc_round_trip() {
        let pkg = local_pkg();
        let mut decoded = PackageRecord {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            ..Default::default()
        };
        decode_desc(&encode_desc(&pkg, true), &mut decoded).unwrap();
        assert_eq!(decoded, pkg);
    }

    #[test]
    fn test_decode_sync_flags_and_csize() {
        let mut pkg = PackageRecord::default();
        decode_desc("%CSIZE%\n100\n\n%FORCE%\n\n\n%STICK%\n\n", &mut pkg).unwrap();
        assert_eq!(pkg.csize, 100);
        assert_eq!(pkg.size, 100);
        assert!(pkg.force);
        assert!(pkg.stick);
    }

    #[test]
    fn test_files_round_trip_drops_directories() {
        let mut pkg = PackageRecord::new("dummy", "1.0-1");
        pkg.files = vec!["bin/dummy".to_string(), "usr/man/man1/dummy.1".to_string()];
        pkg.backup = vec![BackupEntry::new("etc/dummy.conf", "abc")];

        let content = encode_files(&pkg);
        assert!(content.starts_with("%FILES%\nbin/\nbin/dummy\nusr/\n"));
        assert!(content.ends_with("%BACKUP%\netc/dummy.conf\tabc\n\n"));

        let mut decoded = PackageRecord::default();
        decode_files(&content, &mut decoded).unwrap();
        assert_eq!(decoded.files, pkg.files);
        assert_eq!(decoded.backup, pkg.backup);
    }

    #[test]
    fn test_depends_accepts_sync_sections() {
        let mut pkg = PackageRecord::default();
        let content = "%DEPENDS%\nglibc\n\n%REPLACES%\nold\n\n%FORCE%\n\n";
        decode_depends(content, &mut pkg).unwrap();
        assert_eq!(pkg.depends, vec!["glibc"]);
        assert_eq!(pkg.replaces, vec!["old"]);
        assert!(pkg.force);
    }

    #[test]
    fn test_truncated_scalar_is_malformed() {
        let mut pkg = PackageRecord::default();
        let err = decode_desc("%NAME%\ndummy\n\n%DESC%", &mut pkg).unwrap_err();
        assert!(matches!(err, Error::MalformedSection { ref section, .. } if section == "DESC"));
    }

    #[test]
    fn test_bad_integer() {
        let mut pkg = PackageRecord::default();
        let err = decode_desc("%REASON%\nexplicit\n", &mut pkg).unwrap_err();
        assert!(matches!(err, Error::InvalidInteger { .. }));
    }

    #[test]
    fn test_reason_out_of_range() {
        let mut pkg = PackageRecord::default();
        let err = decode_desc("%REASON%\n4294967297\n\n", &mut pkg).unwrap_err();
        assert!(matches!(err, Error::InvalidInteger { ref value, .. } if value == "4294967297"));
        assert_eq!(pkg.reason, 0);

        decode_desc("%REASON%\n-1\n\n", &mut pkg).unwrap();
        assert_eq!(pkg.reason, -1);
    }

    #[test]
    fn test_install_round_trip() {
        let mut pkg = PackageRecord::default();
        pkg.scriptlets.post_install = "echo installed\necho twice".to_string();
        pkg.scriptlets.pre_remove = "echo bye".to_string();

        let content = encode_install(&pkg.scriptlets);
        assert_eq!(
            content,
            "post_install() {\necho installed\necho twice\n}\npre_remove() {\necho bye\n}\n"
        );

        let mut decoded = PackageRecord::default();
        decode_install(&content, &mut decoded);
        assert_eq!(decoded.scriptlets, pkg.scriptlets);
    }
}
