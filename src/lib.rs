// src/lib.rs

//! pactest
//!
//! Regression harness for the pacman-g2 package manager. The subject is
//! treated as a black box: a test case builds package archives, databases
//! and filesystem fixtures under a scratch root, runs the subject, and then
//! checks rules against what it left behind.
//!
//! # Architecture
//!
//! - `db`: the text database format (`desc`, `files`, `depends`, `install`)
//!   with per-section snapshots for change detection
//! - `rule`: the `[!]KIND_CASE=KEY[|VALUE]` assertion language
//! - `fixture`, `packages`: inputs handed to the subject
//! - `baseline`: pre-run state persisted between setup and checking
//! - `config`: paths and extensions of the subject's on-disk layout

pub mod baseline;
pub mod config;
pub mod db;
mod error;
pub mod fixture;
pub mod hash;
pub mod packages;
pub mod rule;

pub use config::Config;
pub use error::{Error, Result};
