// src/rule/check.rs

//! Rule evaluation against the facts of a finished test run

use super::{FileCheck, Outcome, PacmanCheck, PkgCheck, Predicate};
use crate::config::Config;
use crate::db::{DbEntry, LOCAL, Repository};
use crate::fixture::Tracked;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Everything a rule may inspect after the subject has run
pub struct CheckContext<'a> {
    root: &'a Path,
    config: &'a Config,
    retcode: i32,
    repositories: &'a BTreeMap<String, Repository>,
    tracked: Vec<&'a dyn Tracked>,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        root: &'a Path,
        config: &'a Config,
        retcode: i32,
        repositories: &'a BTreeMap<String, Repository>,
    ) -> Self {
        Self {
            root,
            config,
            retcode,
            repositories,
            tracked: Vec::new(),
        }
    }

    /// Add filesystem entries FILE_MODIFIED rules can query
    pub fn track<T: Tracked>(mut self, files: &'a [T]) -> Self {
        self.tracked.extend(files.iter().map(|f| f as &dyn Tracked));
        self
    }

    pub fn retcode(&self) -> i32 {
        self.retcode
    }

    /// Captured output of the subject
    pub fn log_path(&self) -> PathBuf {
        self.root.join(&self.config.logfile)
    }

    /// Evaluate a predicate; never fails, I/O problems count as failure
    pub(super) fn evaluate(&self, predicate: &Predicate) -> Outcome {
        match predicate {
            Predicate::Pacman(check) => self.check_pacman(check),
            Predicate::Pkg { name, check } => self.check_pkg(name, check),
            Predicate::File { path, check } => self.check_file(path, *check),
            Predicate::Link { path } => Outcome::from_bool(is_symlink(&self.root.join(path))),
            Predicate::Unrecognized { kind, case } => {
                debug!("Skipping unrecognized rule {}_{}", kind, case);
                Outcome::Skipped
            }
        }
    }

    fn check_pacman(&self, check: &PacmanCheck) -> Outcome {
        match check {
            PacmanCheck::Retcode(expected) => Outcome::from_bool(self.retcode == *expected),
            PacmanCheck::Output(pattern) => Outcome::from_bool(self.log_contains(pattern)),
        }
    }

    fn log_contains(&self, pattern: &str) -> bool {
        let path = self.log_path();
        let log = match fs::read(&path) {
            Ok(log) => log,
            Err(e) => {
                warn!("Cannot read log {}: {}", path.display(), e);
                return false;
            }
        };
        // Localized output is not necessarily UTF-8
        log.split(|b| *b == b'\n')
            .any(|line| String::from_utf8_lossy(line).contains(pattern))
    }

    fn local_entry(&self, name: &str) -> Option<(&Repository, DbEntry)> {
        let Some(local) = self.repositories.get(LOCAL) else {
            warn!("No local repository to check {} against", name);
            return None;
        };
        match local.read(name) {
            Ok(Some(entry)) => Some((local, entry)),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read local entry {}: {}", name, e);
                None
            }
        }
    }

    fn check_pkg(&self, name: &str, check: &PkgCheck) -> Outcome {
        let Some((local, entry)) = self.local_entry(name) else {
            return Outcome::Failure;
        };
        debug!("{}: snapshot {:?}", name, entry.snapshot);
        let pkg = &entry.record;

        let ok = match check {
            PkgCheck::Exist => true,
            PkgCheck::Modified => {
                if local.written_snapshot(name).is_none() {
                    warn!("{}: no reference snapshot, skipping modification check", name);
                    return Outcome::Skipped;
                }
                local.is_modified(name, &entry.snapshot)
            }
            PkgCheck::Version(version) => pkg.version == *version,
            PkgCheck::Group(group) => pkg.groups.contains(group),
            PkgCheck::Depends(dep) => pkg.depends.contains(dep),
            PkgCheck::RequiredBy(dep) => pkg.required_by.contains(dep),
            PkgCheck::Reason(reason) => pkg.reason == *reason,
            PkgCheck::File(file) => pkg.files.contains(file),
            PkgCheck::Backup(path) => pkg.has_backup(path),
        };
        Outcome::from_bool(ok)
    }

    fn check_file(&self, path: &str, check: FileCheck) -> Outcome {
        let filename = self.root.join(path);
        let ok = match check {
            FileCheck::Exist => filename.is_file(),
            FileCheck::Modified => match self.tracked.iter().find(|f| f.name() == path) {
                Some(tracked) => tracked.is_modified(),
                None => {
                    warn!("{}: not tracked, skipping modification check", path);
                    return Outcome::Skipped;
                }
            },
            FileCheck::PacNew => with_suffix(&filename, &self.config.pacnew_suffix).is_file(),
            FileCheck::PacOrig => with_suffix(&filename, &self.config.pacorig_suffix).is_file(),
            FileCheck::PacSave => with_suffix(&filename, &self.config.pacsave_suffix).is_file(),
        };
        Outcome::from_bool(ok)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}
