// src/db/snapshot.rs

//! Per-section fingerprints and timestamps, and change detection
//!
//! Every read or write of a package entry returns a `Snapshot` of the files
//! it touched. Comparing the snapshot taken when the harness wrote an entry
//! with one taken after the subject ran tells whether the subject rewrote
//! any of the entry's files.

use crate::hash::{self, FileTimes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// One of the files making up a package entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    Desc,
    Depends,
    Files,
    Install,
}

impl SectionKey {
    pub const ALL: [SectionKey; 4] = [
        SectionKey::Desc,
        SectionKey::Depends,
        SectionKey::Files,
        SectionKey::Install,
    ];

    /// File name inside the package directory
    pub fn file_name(&self) -> &'static str {
        match self {
            SectionKey::Desc => "desc",
            SectionKey::Depends => "depends",
            SectionKey::Files => "files",
            SectionKey::Install => "install",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Fingerprint and timestamps of one section file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionState {
    pub fingerprint: String,
    pub times: FileTimes,
}

impl SectionState {
    /// Capture the state of `path`; a missing file gives the zero state
    pub fn capture(path: &Path) -> Self {
        Self {
            fingerprint: hash::file_fingerprint(path),
            times: FileTimes::of(path).unwrap_or_default(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.times.is_zero()
    }
}

/// States of all sections of a package entry at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    sections: BTreeMap<SectionKey, SectionState>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: SectionKey, state: SectionState) {
        self.sections.insert(key, state);
    }

    /// State of a section; absent sections read as the zero state
    pub fn get(&self, key: SectionKey) -> SectionState {
        self.sections.get(&key).cloned().unwrap_or_default()
    }

    /// Count the sections whose file was rewritten between `old` and `new`
    ///
    /// Only modify and change times are compared. An install section that
    /// never existed on either side is not counted.
    pub fn changed_sections(old: &Snapshot, new: &Snapshot) -> usize {
        SectionKey::ALL
            .iter()
            .filter(|&&key| {
                let before = old.get(key);
                let after = new.get(key);
                if key == SectionKey::Install && before.is_zero() && after.is_zero() {
                    return false;
                }
                let changed = before.times.content_times() != after.times.content_times();
                if changed {
                    debug!(
                        "section {} changed: {:?} -> {:?}",
                        key, before.times, after.times
                    );
                }
                changed
            })
            .count()
    }

    /// Whether any section was rewritten between `old` and `new`
    pub fn is_modified(old: &Snapshot, new: &Snapshot) -> bool {
        Self::changed_sections(old, new) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(atime: i64, mtime: i64, ctime: i64) -> SectionState {
        SectionState {
            fingerprint: String::new(),
            times: FileTimes { atime, mtime, ctime },
        }
    }

    fn snapshot(times: &[(SectionKey, (i64, i64, i64))]) -> Snapshot {
        let mut snap = Snapshot::new();
        for (key, (a, m, c)) in times {
            snap.insert(*key, state(*a, *m, *c));
        }
        snap
    }

    #[test]
    fn test_identical_snapshots_unmodified() {
        let snap = snapshot(&[
            (SectionKey::Desc, (1, 2, 3)),
            (SectionKey::Depends, (1, 2, 3)),
            (SectionKey::Files, (1, 2, 3)),
        ]);
        assert_eq!(Snapshot::changed_sections(&snap, &snap.clone()), 0);
        assert!(!Snapshot::is_modified(&snap, &snap));
    }

    #[test]
    fn test_access_time_is_ignored() {
        let old = snapshot(&[(SectionKey::Desc, (1, 2, 3))]);
        let new = snapshot(&[(SectionKey::Desc, (99, 2, 3))]);
        assert_eq!(Snapshot::changed_sections(&old, &new), 0);
    }

    #[test]
    fn test_modify_and_change_times_count() {
        let old = snapshot(&[
            (SectionKey::Desc, (1, 2, 3)),
            (SectionKey::Depends, (1, 2, 3)),
            (SectionKey::Files, (1, 2, 3)),
        ]);
        let new = snapshot(&[
            (SectionKey::Desc, (1, 5, 3)),
            (SectionKey::Depends, (1, 2, 7)),
            (SectionKey::Files, (1, 2, 3)),
        ]);
        assert_eq!(Snapshot::changed_sections(&old, &new), 2);
    }

    #[test]
    fn test_install_absent_on_both_sides() {
        let old = snapshot(&[(SectionKey::Desc, (1, 2, 3))]);
        let new = old.clone();
        assert_eq!(old.get(SectionKey::Install), SectionState::default());
        assert_eq!(Snapshot::changed_sections(&old, &new), 0);

        // The install file appearing is a change
        let added = snapshot(&[(SectionKey::Desc, (1, 2, 3)), (SectionKey::Install, (4, 5, 6))]);
        assert_eq!(Snapshot::changed_sections(&old, &added), 1);
    }

    #[test]
    fn test_section_file_names() {
        let names: Vec<_> = SectionKey::ALL.iter().map(|k| k.file_name()).collect();
        assert_eq!(names, vec!["desc", "depends", "files", "install"]);
    }
}
