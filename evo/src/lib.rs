//! Evo host library.
//!
//! Wraps the `evo-rebase-ledger` accounting core with everything needed to
//! run it: TOML configuration, a thread-safe shared ledger driven by a
//! clock, scripted scenario replay, JSON snapshots and logging.

#![deny(clippy::print_stdout)]

pub mod clock;
pub mod config;
pub mod ledger;
pub mod scenario;
pub mod telemetry;

// Re-export commands module for CLI binary
pub mod commands;
