use clap::Parser;

use crate::common::Result;

/// Main command enumeration for the volley CLI tool
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version = "0.1")]
pub enum MainCmd {
    /// Predict the address of a deterministic deployment
    Predict(crate::predict::Cmd),
    /// Execute a deployment plan and broadcast it
    Run(crate::run::Cmd),
}

impl MainCmd {
    /// Execute the main command
    pub fn run(&self) -> Result<()> {
        match self {
            Self::Predict(cmd) => cmd.run(),
            Self::Run(cmd) => cmd.run(),
        }
    }
}
