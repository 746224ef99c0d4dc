use std::path::PathBuf;

use clap::Parser;
use volley::{constants::DEFAULT_CHAIN_ID, Coordinator, MemoryVm, SendersConfig};

use super::Result;

/// Sender configuration arguments.
#[derive(Parser, Debug, Clone)]
pub struct SendersArgs {
    /// Sender configuration file
    #[arg(long = "senders", value_name = "FILE")]
    pub senders: PathBuf,

    /// Deployment namespace, overrides the namespace of the configuration file
    #[arg(long = "namespace", env = "VOLLEY_NAMESPACE")]
    pub namespace: Option<String>,

    /// Chain id of the in-memory chain
    #[arg(long = "chain-id", default_value_t = DEFAULT_CHAIN_ID)]
    pub chain_id: u64,
}

impl SendersArgs {
    /// Loads the sender configuration and builds a coordinator over a fresh in-memory chain.
    ///
    /// Safe nonces from the configuration are applied once the registry is initialized.
    pub fn coordinator(&self, dry_run: bool) -> Result<Coordinator<MemoryVm>> {
        let config = SendersConfig::load(&self.senders)?;
        let mut coordinator_config = config.coordinator_config(self.namespace.as_deref())?;
        coordinator_config.dry_run |= dry_run;

        let mut coordinator = Coordinator::new(MemoryVm::new(self.chain_id), coordinator_config);
        let senders = coordinator.senders_mut()?;
        for (name, nonce) in config.safe_nonces()? {
            senders.set_safe_nonce(&name, nonce)?;
        }
        Ok(coordinator)
    }
}
