use std::{collections::BTreeMap, path::Path};

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use tracing::info;
use volley::{Coordinator, DeployStrategy, Transaction, Vm};

use crate::common::{read_file, AddressBook, CliError, Result};

const fn default_strategy() -> DeployStrategy {
    DeployStrategy::Create3
}

/// A single plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Step {
    /// Deploy a contract through the CreateX factory.
    Deploy {
        /// Deploying sender.
        sender: String,
        /// Artifact identifier.
        artifact: String,
        /// Creation bytecode.
        bytecode: Bytes,
        /// Factory entry point.
        #[serde(default = "default_strategy")]
        strategy: DeployStrategy,
        /// Label appended to the default entropy.
        #[serde(default)]
        label: Option<String>,
        /// Custom entropy.
        #[serde(default)]
        entropy: Option<String>,
        /// ABI-encoded constructor arguments.
        #[serde(default)]
        constructor_args: Bytes,
        /// Alias recorded in the address book.
        #[serde(default)]
        short_id: Option<String>,
    },
    /// Submit a call through a sender.
    Call {
        /// Submitting sender.
        sender: String,
        /// An address, or the identifier of a contract deployed earlier in the plan or
        /// recorded in the address book.
        to: String,
        /// Calldata.
        #[serde(default)]
        data: Bytes,
        /// Native value.
        #[serde(default)]
        value: U256,
        /// Transaction label.
        #[serde(default)]
        label: Option<String>,
    },
    /// Set the proposal description of a governor sender.
    Describe {
        /// Governor sender.
        sender: String,
        /// Proposal description.
        description: String,
    },
}

/// An ordered list of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Steps, executed in order.
    pub steps: Vec<Step>,
}

/// What executing a plan left behind for the address book.
#[derive(Debug, Default)]
pub struct PlanState {
    /// Deployed addresses by identifier.
    pub deployed: BTreeMap<String, Address>,
    /// Short id aliases by identifier.
    pub short_ids: BTreeMap<String, String>,
}

impl Plan {
    /// Loads a plan from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&read_file(path)?)?)
    }

    /// Executes every step. Stops at the first failing step.
    pub fn execute<V: Vm>(
        &self,
        coordinator: &mut Coordinator<V>,
        book: &AddressBook,
    ) -> Result<PlanState> {
        let mut state = PlanState::default();
        for (index, step) in self.steps.iter().enumerate() {
            info!(index, "Executing plan step");
            match step {
                Step::Deploy {
                    sender,
                    artifact,
                    bytecode,
                    strategy,
                    label,
                    entropy,
                    constructor_args,
                    short_id,
                } => {
                    let mut deployment = match strategy {
                        DeployStrategy::Create2 => coordinator.create2(sender, bytecode.clone()),
                        DeployStrategy::Create3 => coordinator.create3(sender, bytecode.clone()),
                    }
                    .with_artifact(artifact);
                    if let Some(label) = label {
                        deployment = deployment.with_label(label)?;
                    }
                    if let Some(entropy) = entropy {
                        deployment = deployment.with_entropy(entropy)?;
                    }
                    let address = deployment.deploy(constructor_args)?;

                    let identifier = match label {
                        Some(label) => format!("{artifact}:{label}"),
                        None => artifact.clone(),
                    };
                    if let Some(short_id) = short_id {
                        state.short_ids.insert(identifier.clone(), short_id.clone());
                    }
                    state.deployed.insert(identifier, address);
                }
                Step::Call { sender, to, data, value, label } => {
                    let chain_id = coordinator.vm().chain_id();
                    let to = resolve_target(to, &state.deployed, || {
                        book.get(chain_id, coordinator.namespace(), to)
                    })?;
                    let mut transaction = Transaction::new(to, data.clone()).with_value(*value);
                    if let Some(label) = label {
                        transaction = transaction.with_label(label);
                    }
                    coordinator.execute(sender, vec![transaction])?;
                }
                Step::Describe { sender, description } => {
                    coordinator.set_proposal_description(sender, description)?;
                }
            }
        }
        Ok(state)
    }
}

/// Resolves a call target: a literal address, then a deployment of this plan, then the
/// address book.
fn resolve_target(
    target: &str,
    deployed: &BTreeMap<String, Address>,
    lookup: impl FnOnce() -> Option<Address>,
) -> Result<Address> {
    if let Ok(address) = target.parse::<Address>() {
        return Ok(address);
    }
    deployed
        .get(target)
        .copied()
        .or_else(lookup)
        .ok_or_else(|| CliError::UnknownTarget(target.to_string()))
}
