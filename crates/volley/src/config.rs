//! JSON sender configuration.
//!
//! ```json
//! {
//!   "namespace": "staging",
//!   "senders": {
//!     "deployer": { "type": "privateKey", "privateKey": "0x…" },
//!     "cold": { "type": "ledger", "address": "0x…", "derivationPath": "m/44'/60'/0'/0/0" },
//!     "safe": { "type": "safe", "safe": "0x…", "proposer": "deployer" },
//!     "dao": { "type": "governor", "governor": "0x…", "timelock": "0x…", "proposer": "cold" }
//!   }
//! }
//! ```
//!
//! Senders are initialized in declaration order.

use std::path::{Path, PathBuf};

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    constants::DEFAULT_NAMESPACE,
    coordinator::CoordinatorConfig,
    error::SenderError,
    sender::SenderInitConfig,
};

/// Errors raised while loading a sender configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid JSON or does not match the expected shape.
    #[error("invalid sender config: {0}")]
    Json(#[from] serde_json::Error),

    /// A sender entry is invalid.
    #[error(transparent)]
    Sender(#[from] SenderError),
}

/// Backend specific part of a sender entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SenderSpec {
    /// Raw private key.
    PrivateKey {
        /// The key.
        private_key: B256,
    },
    /// Ledger device.
    Ledger {
        /// Account on the device.
        address: Address,
        /// Derivation path of the account.
        derivation_path: String,
    },
    /// Trezor device.
    Trezor {
        /// Account on the device.
        address: Address,
        /// Derivation path of the account.
        derivation_path: String,
    },
    /// Safe multisig.
    Safe {
        /// The Safe.
        safe: Address,
        /// Name of the proposing sender.
        proposer: String,
        /// Nonce the first batch is built for.
        #[serde(default)]
        nonce: Option<U256>,
    },
    /// OpenZeppelin Governor.
    Governor {
        /// The governor.
        governor: Address,
        /// The timelock, if any.
        #[serde(default)]
        timelock: Option<Address>,
        /// Name of the proposing sender.
        proposer: String,
    },
    /// Transactions are handed back to the caller.
    Custom {
        /// Account the transactions are simulated as.
        address: Address,
    },
}

/// A sender entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderEntry {
    /// Backend.
    #[serde(flatten)]
    pub spec: SenderSpec,
    /// Whether the sender may submit transactions.
    #[serde(default = "default_can_broadcast")]
    pub can_broadcast: bool,
}

const fn default_can_broadcast() -> bool {
    true
}

impl SenderEntry {
    /// Converts the entry into the registry's init record.
    pub fn to_init_config(&self, name: &str) -> Result<SenderInitConfig, SenderError> {
        let config = match &self.spec {
            SenderSpec::PrivateKey { private_key } => {
                SenderInitConfig::private_key(name, *private_key)?
            }
            SenderSpec::Ledger { address, derivation_path } => {
                SenderInitConfig::ledger(name, *address, derivation_path)
            }
            SenderSpec::Trezor { address, derivation_path } => {
                SenderInitConfig::trezor(name, *address, derivation_path)
            }
            SenderSpec::Safe { safe, proposer, .. } => SenderInitConfig::safe(name, *safe, proposer),
            SenderSpec::Governor { governor, timelock, proposer } => {
                SenderInitConfig::governor(name, *governor, timelock.unwrap_or_default(), proposer)
            }
            SenderSpec::Custom { address } => SenderInitConfig::custom(name, *address),
        };
        Ok(config.with_can_broadcast(self.can_broadcast))
    }
}

/// A sender configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendersConfig {
    /// Deployment namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Skip the broadcast and only simulate.
    #[serde(default)]
    pub dry_run: bool,
    /// Suppress events.
    #[serde(default)]
    pub quiet: bool,
    /// Senders by name, in declaration order.
    pub senders: serde_json::Map<String, serde_json::Value>,
}

impl SendersConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&json)
    }

    /// Sender entries in declaration order.
    pub fn entries(&self) -> Result<Vec<(String, SenderEntry)>, ConfigError> {
        self.senders
            .iter()
            .map(|(name, value)| Ok((name.clone(), serde_json::from_value(value.clone())?)))
            .collect()
    }

    /// Initial Safe nonces configured for Safe senders.
    pub fn safe_nonces(&self) -> Result<Vec<(String, U256)>, ConfigError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter_map(|(name, entry)| match entry.spec {
                SenderSpec::Safe { nonce: Some(nonce), .. } => Some((name, nonce)),
                _ => None,
            })
            .collect())
    }

    /// Builds the coordinator settings. `namespace` overrides the namespace of the file.
    pub fn coordinator_config(
        &self,
        namespace: Option<&str>,
    ) -> Result<CoordinatorConfig, ConfigError> {
        let senders = self
            .entries()?
            .iter()
            .map(|(name, entry)| entry.to_init_config(name))
            .collect::<Result<Vec<_>, _>>()?;
        let namespace = namespace
            .or(self.namespace.as_deref())
            .unwrap_or(DEFAULT_NAMESPACE);
        Ok(CoordinatorConfig::new(senders)
            .with_namespace(namespace)
            .with_dry_run(self.dry_run)
            .with_quiet(self.quiet))
    }
}
