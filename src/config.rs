// src/config.rs

//! Harness configuration
//!
//! Paths and file extensions used by the package manager under test. Every
//! path is relative to the test root. The defaults reproduce the pacman-g2
//! layout; a TOML file can override any subset of them.

use crate::db::Repository;
use crate::error::{Error, Result};
use crate::fixture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Layout of the package manager's on-disk state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database directory, one subdirectory per repository
    pub dbpath: String,

    /// Package cache directory
    pub cachedir: String,

    /// Extension of package archives
    pub pkg_extension: String,

    /// Extension of sync database archives
    pub db_extension: String,

    /// Suffixes the subject uses when it preserves configuration files
    pub pacnew_suffix: String,
    pub pacorig_suffix: String,
    pub pacsave_suffix: String,

    /// Subject configuration file
    pub conffile: String,

    /// Where sync repositories publish their packages
    pub syncrepo: String,

    /// Captured output of the subject
    pub logfile: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dbpath: "var/lib/pacman-g2".to_string(),
            cachedir: "var/cache/pacman-g2/pkg".to_string(),
            pkg_extension: ".fpm".to_string(),
            db_extension: ".fdb".to_string(),
            pacnew_suffix: ".pacnew".to_string(),
            pacorig_suffix: ".pacorig".to_string(),
            pacsave_suffix: ".pacsave".to_string(),
            conffile: "etc/pacman-g2.conf".to_string(),
            syncrepo: "var/pub".to_string(),
            logfile: "var/log/pactest.log".to_string(),
        }
    }
}

impl Config {
    /// Load a configuration from a TOML file
    ///
    /// Missing keys keep their default values.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Write the subject's configuration file under `root`
///
/// `options` become `key = value` lines of the `[options]` section (one line
/// per value). Every repository other than `local` gets its own section
/// pointing at its published directory.
pub fn write_pacman_conf<'a>(
    root: &Path,
    config: &Config,
    options: &BTreeMap<String, Vec<String>>,
    repositories: impl IntoIterator<Item = &'a Repository>,
) -> Result<()> {
    let mut data = vec!["[options]".to_string()];
    for (key, values) in options {
        data.extend(values.iter().map(|v| format!("{} = {}", key, v)));
    }

    for repo in repositories {
        if repo.is_local() {
            continue;
        }
        data.push(format!(
            "[{}]\nserver = file://{}\n",
            repo.name(),
            root.join(&config.syncrepo).join(repo.name()).display()
        ));
    }

    let path = root.join(&config.conffile);
    debug!("Writing subject configuration: {}", path.display());
    fixture::write_file(&path, &data.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_layout() {
        let config = Config::default();
        assert_eq!(config.dbpath, "var/lib/pacman-g2");
        assert_eq!(config.db_extension, ".fdb");
        assert_eq!(config.pacsave_suffix, ".pacsave");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml("dbpath = \"var/lib/pacman\"\npkg_extension = \".pkg.tar.gz\"\n").unwrap();
        assert_eq!(config.dbpath, "var/lib/pacman");
        assert_eq!(config.pkg_extension, ".pkg.tar.gz");
        assert_eq!(config.logfile, "var/log/pactest.log");
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml("dbpath = [");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_write_pacman_conf() {
        let root = TempDir::new().unwrap();
        let config = Config::default();
        let local = Repository::new("local", root.path(), &config);
        let sync = Repository::new("sync", root.path(), &config);

        let mut options = BTreeMap::new();
        options.insert("NoUpgrade".to_string(), vec!["etc/dummy.conf".to_string()]);

        write_pacman_conf(root.path(), &config, &options, [&local, &sync]).unwrap();

        let content = std::fs::read_to_string(root.path().join(&config.conffile)).unwrap();
        assert!(content.starts_with("[options]\nNoUpgrade = etc/dummy.conf\n[sync]\nserver = file://"));
        assert!(content.contains("var/pub/sync"));
        assert!(!content.contains("[local]"));
    }
}
