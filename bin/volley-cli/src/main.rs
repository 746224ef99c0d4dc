//! `volley` CLI tool for deterministic multi-sender deployments
//!
//! Loads a sender configuration, runs deployment plans against an in-memory chain and
//! prints the resulting events, broadcasts and batches as JSON.

use clap::Parser;

mod cmd;
pub use cmd::*;

/// Shared arguments, errors and the address book
pub mod common;

/// Address prediction
pub mod predict;

/// Plan execution
pub mod run;

fn main() -> Result<(), common::CliError> {
    MainCmd::parse().run().inspect_err(|e| eprintln!("Error: {e}"))
}
