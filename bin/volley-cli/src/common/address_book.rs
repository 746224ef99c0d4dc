//! A JSON address book of deployed contracts.
//!
//! Entries are keyed `{chainId}/{namespace}/{identifier}`, where the identifier is the
//! artifact name optionally followed by `:label`. A deployment may additionally be recorded
//! under a short id in the same chain and namespace. The book is only used for lookups and
//! never influences where anything is deployed.

use std::{collections::BTreeMap, path::Path};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use volley::{DeploymentDetails, Event};

use super::{read_file, CliError, Result};

/// Deployed addresses by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressBook {
    entries: BTreeMap<String, Address>,
}

impl AddressBook {
    /// Loads the book at `path`. A missing file is an empty book.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&read_file(path)?)?)
    }

    /// Writes the book to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| CliError::File { path: path.to_path_buf(), source })
    }

    /// Key of `identifier` in `namespace` on `chain_id`.
    pub fn key(chain_id: u64, namespace: &str, identifier: &str) -> String {
        format!("{chain_id}/{namespace}/{identifier}")
    }

    /// Looks up `identifier`.
    pub fn get(&self, chain_id: u64, namespace: &str, identifier: &str) -> Option<Address> {
        self.entries.get(&Self::key(chain_id, namespace, identifier)).copied()
    }

    /// Records `address` under `identifier`.
    pub fn insert(&mut self, chain_id: u64, namespace: &str, identifier: &str, address: Address) {
        self.entries.insert(Self::key(chain_id, namespace, identifier), address);
    }

    /// Records every deployment in `events`. Collisions are recorded too, they point at the
    /// contract that is already there. `short_ids` maps identifiers to their alias.
    pub fn record_events(
        &mut self,
        chain_id: u64,
        namespace: &str,
        events: &[Event],
        short_ids: &BTreeMap<String, String>,
    ) -> usize {
        let mut recorded = 0;
        for event in events {
            let (address, deployment) = match event {
                Event::ContractDeployed { location, deployment, .. } => (*location, deployment),
                Event::DeploymentCollision { existing_contract, deployment } => {
                    (*existing_contract, deployment)
                }
                _ => continue,
            };
            let Some(identifier) = identifier(deployment) else { continue };
            self.insert(chain_id, namespace, &identifier, address);
            if let Some(short_id) = short_ids.get(&identifier) {
                self.insert(chain_id, namespace, short_id, address);
            }
            recorded += 1;
        }
        recorded
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the book has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identifier of a deployment, `artifact[:label]`. Deployments without an artifact have none.
pub fn identifier(deployment: &DeploymentDetails) -> Option<String> {
    if deployment.artifact.is_empty() {
        return None;
    }
    Some(match &deployment.label {
        Some(label) => format!("{}:{label}", deployment.artifact),
        None => deployment.artifact.clone(),
    })
}
