// src/packages/mod.rs

//! Package archive support for pactest
//!
//! Test cases describe packages as `PackageRecord`s; this module turns them
//! into the archives handed to the subject under test.

pub mod fpm;

pub use fpm::{make_package, read_package};
