//! virtdb - virtual package provider cache
//!
//! Resolves virtual packages to the concrete packages providing them and
//! keeps the result in a per-category mtime cache, so a warm run only
//! rescans categories that changed.

pub mod atom;
pub mod cli;
pub mod config;
pub mod depset;
pub mod error;
pub mod fsutil;
pub mod repo;
pub mod virtuals;

pub use error::{VirtdbError, VirtdbResult};
