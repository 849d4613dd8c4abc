// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for the label tools.
//!
//! This module contains the command-line interface logic, including argument parsing
//! and the `skeleton`, `dataset`, `convert` and `export` command implementations.

// Modules
/// CLI arguments.
pub mod args;

/// Command implementations.
pub mod commands;
