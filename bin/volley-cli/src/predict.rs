//! Address prediction without deploying.

use alloy_primitives::{Address, Bytes, B256};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use volley::DeployStrategy;

use crate::common::{LogArgs, Result, SendersArgs};

/// Factory entry point, as a CLI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Address depends on the salt and the init code
    Create2,
    /// Address depends on the salt only
    Create3,
}

impl From<Strategy> for DeployStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Create2 => Self::Create2,
            Strategy::Create3 => Self::Create3,
        }
    }
}

/// Predict the address of a deterministic deployment
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Sender the deployment goes through
    #[arg(long = "sender")]
    pub sender: String,

    /// Artifact identifier, part of the default entropy
    #[arg(long = "artifact")]
    pub artifact: Option<String>,

    /// Label appended to the default entropy
    #[arg(long = "label", conflicts_with = "entropy")]
    pub label: Option<String>,

    /// Custom entropy replacing `namespace/artifact[:label]`
    #[arg(long = "entropy")]
    pub entropy: Option<String>,

    /// Creation bytecode as hex string
    #[arg(long = "bytecode")]
    pub bytecode: Bytes,

    /// ABI-encoded constructor arguments as hex string
    #[arg(long = "args", default_value = "0x")]
    pub constructor_args: Bytes,

    /// Factory entry point
    #[arg(long = "strategy", value_enum, default_value_t = Strategy::Create3)]
    pub strategy: Strategy,

    /// Sender configuration
    #[command(flatten)]
    pub senders: SendersArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log: LogArgs,
}

/// Result of a prediction.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    sender: String,
    strategy: DeployStrategy,
    entropy: String,
    salt: B256,
    address: Address,
}

impl Cmd {
    /// Execute the predict command
    pub fn run(&self) -> Result<()> {
        self.log.init().map_err(crate::common::CliError::Logging)?;

        let mut coordinator = self.senders.coordinator(true)?;
        let strategy = DeployStrategy::from(self.strategy);
        let mut deployment = match strategy {
            DeployStrategy::Create2 => coordinator.create2(&self.sender, self.bytecode.clone()),
            DeployStrategy::Create3 => coordinator.create3(&self.sender, self.bytecode.clone()),
        };
        if let Some(artifact) = &self.artifact {
            deployment = deployment.with_artifact(artifact);
        }
        if let Some(label) = &self.label {
            deployment = deployment.with_label(label)?;
        }
        if let Some(entropy) = &self.entropy {
            deployment = deployment.with_entropy(entropy)?;
        }

        let prediction = Prediction {
            sender: self.sender.clone(),
            strategy,
            entropy: deployment.entropy()?,
            salt: deployment.salt()?,
            address: deployment.predict(&self.constructor_args)?,
        };
        println!("{}", serde_json::to_string_pretty(&prediction)?);
        Ok(())
    }
}
