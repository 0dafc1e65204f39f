// src/baseline.rs

//! State captured before the subject runs
//!
//! MODIFIED rules compare against the state the harness saw before the
//! subject ran. When setup and checking happen in separate processes, that
//! state is written to a JSON file in between.

use crate::db::{Repository, Snapshot};
use crate::error::Result;
use crate::fixture::TrackedFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Reference snapshots of package entries and tracked files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub packages: BTreeMap<String, Snapshot>,
    pub files: Vec<TrackedFile>,
}

impl Baseline {
    /// Snapshot every entry of `repo` and start tracking `files` under `root`
    pub fn capture<S: AsRef<str>>(repo: &Repository, root: &Path, files: &[S]) -> Result<Self> {
        let mut packages = BTreeMap::new();
        for name in repo.list()? {
            if let Some(entry) = repo.read(&name)? {
                packages.insert(name, entry.snapshot);
            }
        }
        let files = files
            .iter()
            .map(|f| TrackedFile::new(root, f.as_ref()))
            .collect();
        debug!("Captured {} package snapshots from {}", packages.len(), repo.name());
        Ok(Self { packages, files })
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading baseline from: {}", path.display());
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Wrote baseline: {}", path.display());
        Ok(())
    }

    /// Hand the package snapshots to `repo` as its reference state
    pub fn restore(&self, repo: &mut Repository) {
        for (name, snapshot) in &self.packages {
            repo.remember(name, snapshot.clone());
        }
    }
}
