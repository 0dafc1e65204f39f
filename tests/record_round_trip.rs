// tests/record_round_trip.rs

//! Writing a record and reading it back restores every field the
//! repository kind persists

use pactest::Config;
use pactest::db::{BackupEntry, LOCAL, PackageRecord, Repository, Scriptlets, Snapshot};
use proptest::prelude::*;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn pkg_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,5}(-[a-z0-9]{1,4})?"
}

fn pkg_version() -> impl Strategy<Value = String> {
    "[0-9]{1,2}\\.[0-9]{1,2}-[0-9]{1,2}"
}

fn text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ._<>@:/]{0,16}"
}

fn list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9.+<>=-]{1,8}", 0..4)
}

/// Sorted, distinct paths without fixture markers, as a decoded manifest is
fn manifest() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,4}(/[a-z]{1,4}){0,2}", 0..6)
        .prop_map(|files| files.into_iter().collect::<BTreeSet<_>>().into_iter().collect())
}

fn backups() -> impl Strategy<Value = Vec<BackupEntry>> {
    prop::collection::vec(
        ("[a-z]{1,4}/[a-z.]{1,8}", "([0-9a-f]{40})?").prop_map(|(p, f)| BackupEntry::new(p, f)),
        0..3,
    )
}

fn hooks() -> impl Strategy<Value = Scriptlets> {
    prop::collection::vec("(echo [a-z]{1,8})?", 6).prop_map(|bodies| {
        let mut scriptlets = Scriptlets::default();
        for (hook, body) in Scriptlets::HOOKS.iter().zip(bodies) {
            if let Some(slot) = scriptlets.get_mut(hook) {
                *slot = body;
            }
        }
        scriptlets
    })
}

prop_compose! {
    fn local_record()(
        (name, version, arch, description, url) in (pkg_name(), pkg_version(), "(i686|x86_64)?", text(), text()),
        (license, groups, build_date, install_date, packager) in (list(), list(), text(), text(), text()),
        (size, reason) in (any::<i64>(), any::<i32>()),
        (depends, required_by, conflicts, provides) in (list(), list(), list(), list()),
        (files, backup, scriptlets) in (manifest(), backups(), hooks())
    ) -> PackageRecord {
        PackageRecord {
            name, version, arch, description, url, license, groups, build_date,
            install_date, packager, size, reason, depends, required_by, conflicts,
            provides, files, backup, scriptlets,
            ..Default::default()
        }
    }
}

prop_compose! {
    fn sync_record()(
        (name, version, arch, description, groups) in (pkg_name(), pkg_version(), "(i686|x86_64)?", text(), list()),
        (csize, sha1sum, replaces, force, stick) in (0..i64::MAX, "([0-9a-f]{40})?", list(), any::<bool>(), any::<bool>()),
        (depends, conflicts, provides) in (list(), list(), list())
    ) -> PackageRecord {
        PackageRecord {
            name, version, arch, description, groups, csize, sha1sum, replaces,
            force, stick, depends, conflicts, provides,
            // Sync entries carry CSIZE, which reads back as both sizes
            size: csize,
            ..Default::default()
        }
    }
}

fn round_trip(treename: &str, pkg: &PackageRecord) -> (PackageRecord, Snapshot, Snapshot) {
    let root = TempDir::new().unwrap();
    let mut repo = Repository::new(treename, root.path(), &Config::default());
    let written = repo.write(pkg).unwrap();
    let entry = repo.read(&pkg.name).unwrap().unwrap();
    (entry.record, written, entry.snapshot)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn local_record_round_trips(pkg in local_record()) {
        let (read, written, current) = round_trip(LOCAL, &pkg);
        prop_assert_eq!(&read, &pkg);
        prop_assert!(!Snapshot::is_modified(&written, &current));
    }

    #[test]
    fn sync_record_round_trips(pkg in sync_record()) {
        let (read, written, current) = round_trip("frugalware-current", &pkg);
        prop_assert_eq!(&read, &pkg);
        prop_assert_eq!(Snapshot::changed_sections(&written, &current), 0);
    }
}
