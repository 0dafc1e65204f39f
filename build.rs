// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    let repo = || {
        Arg::new("repo")
            .long("repo")
            .value_name("NAME")
            .default_value("local")
            .help("Repository to read from")
    };

    Command::new("pactest")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Pactest Contributors")
        .about("Regression harness for the pacman-g2 package manager")
        .subcommand_required(true)
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("PATH")
                .default_value(".")
                .global(true)
                .help("Test root the subject operated on"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("TOML file overriding the default pacman-g2 layout"),
        )
        .subcommand(
            Command::new("dump")
                .about("Print a package database entry as JSON")
                .arg(Arg::new("name").required(true).help("Package name"))
                .arg(repo()),
        )
        .subcommand(
            Command::new("list")
                .about("List the packages of a repository")
                .arg(repo()),
        )
        .subcommand(
            Command::new("check")
                .about("Evaluate rules against the test root")
                .arg(
                    Arg::new("retcode")
                        .long("retcode")
                        .required(true)
                        .help("Exit code the subject returned"),
                )
                .arg(
                    Arg::new("snapshot")
                        .long("snapshot")
                        .value_name("FILE")
                        .help("Baseline written by `snapshot` before the subject ran"),
                )
                .arg(
                    Arg::new("rules")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Rules, e.g. PKG_EXIST=dummy"),
                ),
        )
        .subcommand(
            Command::new("snapshot")
                .about("Record the local database and tracked files before the subject runs")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .required(true)
                        .help("Where to write the baseline"),
                )
                .arg(
                    Arg::new("track")
                        .long("track")
                        .value_name("PATH")
                        .action(ArgAction::Append)
                        .help("Files that FILE_MODIFIED rules will query"),
                ),
        )
        .subcommand(
            Command::new("gensync")
                .about("Build the compressed database of a sync repository")
                .arg(Arg::new("repo").required(true).help("Repository name")),
        )
        .subcommand(
            Command::new("inspect")
                .about("Print the metadata of a package archive as JSON")
                .arg(Arg::new("package_path").required(true).help("Path to the package archive")),
        )
        .subcommand(
            Command::new("expand")
                .about("Print a file manifest with all leading directories")
                .arg(Arg::new("files").action(ArgAction::Append).help("Manifest entries")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("pactest.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
