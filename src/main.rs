// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pactest::Config;
use pactest::baseline::Baseline;
use pactest::db::{LOCAL, Repository, section};
use pactest::packages;
use pactest::rule::{CheckContext, RuleSet};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "pactest")]
#[command(author, version, about = "Regression harness for the pacman-g2 package manager", long_about = None)]
struct Cli {
    /// Test root the subject operated on
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// TOML file overriding the default pacman-g2 layout
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a package database entry as JSON
    Dump {
        /// Package name
        name: String,
        /// Repository to read from
        #[arg(long, default_value = LOCAL)]
        repo: String,
    },
    /// List the packages of a repository
    List {
        /// Repository to list
        #[arg(long, default_value = LOCAL)]
        repo: String,
    },
    /// Evaluate rules against the test root
    Check {
        /// Exit code the subject returned
        #[arg(long)]
        retcode: i32,
        /// Baseline written by `snapshot` before the subject ran
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Rules, e.g. PKG_EXIST=dummy
        #[arg(required = true)]
        rules: Vec<String>,
    },
    /// Record the local database and tracked files before the subject runs
    Snapshot {
        /// Where to write the baseline
        #[arg(short, long)]
        output: PathBuf,
        /// Files that FILE_MODIFIED rules will query
        #[arg(long = "track", value_name = "PATH")]
        files: Vec<String>,
    },
    /// Build the compressed database of a sync repository
    Gensync {
        /// Repository name
        repo: String,
    },
    /// Print the metadata of a package archive as JSON
    Inspect {
        /// Path to the package archive
        package_path: PathBuf,
    },
    /// Print a file manifest with all leading directories
    Expand {
        /// Manifest entries
        files: Vec<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let root = cli.root.as_path();

    match cli.command {
        Commands::Dump { name, repo } => {
            let db = Repository::new(&repo, root, &config);
            let entry = db
                .read(&name)?
                .ok_or_else(|| anyhow::anyhow!("Package '{}' not found in {}", name, repo))?;
            let json = serde_json::json!({
                "record": entry.record,
                "snapshot": entry.snapshot,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
            Ok(())
        }
        Commands::List { repo } => {
            let db = Repository::new(&repo, root, &config);
            for name in db.list()? {
                println!("{}", name);
            }
            Ok(())
        }
        Commands::Check {
            retcode,
            snapshot,
            rules,
        } => {
            let mut set = RuleSet::new();
            for rule in &rules {
                set.add(rule)?;
            }

            let baseline = match snapshot {
                Some(path) => Baseline::load(&path)
                    .with_context(|| format!("Failed to load baseline {}", path.display()))?,
                None => Baseline::default(),
            };
            let mut local = Repository::new(LOCAL, root, &config);
            baseline.restore(&mut local);
            let mut repositories = BTreeMap::new();
            repositories.insert(LOCAL.to_string(), local);

            let ctx = CheckContext::new(root, &config, retcode, &repositories).track(&baseline.files);
            let tally = set.check(&ctx);
            for result in set.iter() {
                println!("{}", result);
            }
            println!("Rules: {}", tally);

            if !tally.passed() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Snapshot { output, files } => {
            let local = Repository::new(LOCAL, root, &config);
            Baseline::capture(&local, root, &files)?.save(&output)?;
            Ok(())
        }
        Commands::Gensync { repo } => {
            let db = Repository::new(&repo, root, &config);
            let archive = db
                .archive_path()
                .ok_or_else(|| anyhow::anyhow!("Repository '{}' has no sync database", repo))?
                .to_path_buf();
            db.gensync()?;
            info!("Wrote {}", archive.display());
            println!("{}", archive.display());
            Ok(())
        }
        Commands::Inspect { package_path } => {
            let pkg = packages::read_package(&package_path)?;
            println!("{}", serde_json::to_string_pretty(&pkg)?);
            Ok(())
        }
        Commands::Expand { files } => {
            for entry in section::expand_file_list(&files) {
                println!("{}", entry);
            }
            Ok(())
        }
    }
}
