//! Tooling & Integration Layer
//!
//! Command-line access to the hierarchy index: apply record files, print the
//! tree, resolve paths, and show the effective configuration.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
