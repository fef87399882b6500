// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface.
//!
//! Argument parsing, console logging and the `predict`, `models` and
//! `entropy` command implementations.

// Modules
/// CLI arguments.
pub mod args;

/// Console logging macros and the verbosity switch.
pub mod logging;

/// Command implementations.
pub mod predict;
