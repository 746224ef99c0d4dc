//! Deterministic CREATE2/CREATE3 deployments through the CreateX factory.
//!
//! A [`Deployment`] resolves to an entropy string, `namespace/artifact[:label]` unless a
//! custom entropy is given, which is folded into a salt scoped to the deploying sender. The
//! address is predicted before anything is executed. If that address already holds code the
//! deployment is skipped and reported as a collision, which makes deploy scripts re-runnable.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::{SolCall, SolValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    constants::CREATEX_ADDRESS,
    coordinator::Coordinator,
    error::{DeployError, DeployResult, SenderError},
    event::{DeploymentDetails, Event},
    salt::{init_code, predict_create2, predict_create3, sender_salt},
    types::Transaction,
    vm::{ICreateX, Vm},
};

/// Factory entry point a deployment goes through.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeployStrategy {
    /// Address depends on the salt and the init code.
    #[display("CREATE2")]
    Create2,
    /// Address depends on the salt only.
    #[display("CREATE3")]
    Create3,
}

/// Everything known about a deployment before it is executed.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Plan {
    deployer: Address,
    predicted: Address,
    init_code: Bytes,
    details: DeploymentDetails,
}

/// Builder of a single deployment.
#[derive(Debug)]
pub struct Deployment<'a, V> {
    coordinator: &'a mut Coordinator<V>,
    sender: String,
    strategy: DeployStrategy,
    bytecode: Bytes,
    artifact: Option<String>,
    label: Option<String>,
    entropy: Option<String>,
}

impl<'a, V: Vm> Deployment<'a, V> {
    pub(crate) fn new(
        coordinator: &'a mut Coordinator<V>,
        sender: &str,
        strategy: DeployStrategy,
        bytecode: Bytes,
    ) -> Self {
        Self {
            coordinator,
            sender: sender.to_string(),
            strategy,
            bytecode,
            artifact: None,
            label: None,
            entropy: None,
        }
    }

    /// Sets the artifact identifier used in events and in the default entropy.
    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    /// Sets the label appended to the default entropy. Conflicts with a custom entropy.
    pub fn with_label(mut self, label: impl Into<String>) -> DeployResult<Self> {
        if self.entropy.is_some() {
            return Err(DeployError::LabelEntropyConflict);
        }
        self.label = Some(label.into());
        Ok(self)
    }

    /// Replaces the default entropy. Conflicts with a label.
    pub fn with_entropy(mut self, entropy: impl Into<String>) -> DeployResult<Self> {
        if self.label.is_some() {
            return Err(DeployError::LabelEntropyConflict);
        }
        self.entropy = Some(entropy.into());
        Ok(self)
    }

    /// Factory entry point.
    pub const fn strategy(&self) -> DeployStrategy {
        self.strategy
    }

    /// The resolved entropy.
    pub fn entropy(&self) -> DeployResult<String> {
        if let Some(entropy) = &self.entropy {
            return Ok(entropy.clone());
        }
        let artifact = self.artifact.as_deref().ok_or(DeployError::MissingArtifact)?;
        let namespace = self.coordinator.namespace();
        Ok(match &self.label {
            Some(label) => format!("{namespace}/{artifact}:{label}"),
            None => format!("{namespace}/{artifact}"),
        })
    }

    /// Salt the deployment is submitted with.
    pub fn salt(&mut self) -> DeployResult<B256> {
        let account = self.coordinator.sender(&self.sender)?.account();
        Ok(sender_salt(account, &self.entropy()?))
    }

    /// Predicts the deployment address for `constructor_args`.
    pub fn predict(&mut self, constructor_args: &[u8]) -> DeployResult<Address> {
        Ok(self.plan(constructor_args)?.predicted)
    }

    /// Deploys with `constructor_args`, or returns the existing contract if the predicted
    /// address already holds code.
    pub fn deploy(&mut self, constructor_args: &[u8]) -> DeployResult<Address> {
        let plan = self.plan(constructor_args)?;

        if !self.coordinator.vm().code(plan.predicted).is_empty() {
            info!(
                address = %plan.predicted,
                entropy = %plan.details.entropy,
                strategy = %self.strategy,
                "Deployment collision, reusing existing contract"
            );
            self.coordinator.emit(Event::DeploymentCollision {
                existing_contract: plan.predicted,
                deployment: plan.details,
            });
            return Ok(plan.predicted);
        }

        let salt = plan.details.salt;
        let data = match self.strategy {
            DeployStrategy::Create2 => {
                ICreateX::deployCreate2Call { salt, initCode: plan.init_code.clone() }.abi_encode()
            }
            DeployStrategy::Create3 => {
                ICreateX::deployCreate3Call { salt, initCode: plan.init_code.clone() }.abi_encode()
            }
        };
        let transaction = Transaction::new(CREATEX_ADDRESS, data)
            .with_label(format!("{} {}", self.strategy, plan.details.entropy));
        let simulated = self
            .coordinator
            .execute(&self.sender, vec![transaction])?
            .pop()
            .ok_or(SenderError::EmptyTransactionArray)?;

        let actual = Address::abi_decode(&simulated.return_data, true)
            .map_err(|_| DeployError::InvalidFactoryOutput(simulated.return_data.clone()))?;
        if actual != plan.predicted {
            return Err(DeployError::PredictedAddressMismatch {
                predicted: plan.predicted,
                actual,
            });
        }

        info!(
            address = %actual,
            entropy = %plan.details.entropy,
            strategy = %self.strategy,
            transaction_id = %simulated.transaction_id,
            "Deployed contract"
        );
        self.coordinator.emit(Event::ContractDeployed {
            deployer: plan.deployer,
            location: actual,
            transaction_id: simulated.transaction_id,
            deployment: plan.details,
        });
        Ok(actual)
    }

    fn plan(&mut self, constructor_args: &[u8]) -> DeployResult<Plan> {
        let entropy = self.entropy()?;
        if self.bytecode.is_empty() {
            return Err(DeployError::EmptyBytecode(self.artifact.clone().unwrap_or(entropy)));
        }

        let deployer = self.coordinator.sender(&self.sender)?.account();
        let chain_id = self.coordinator.vm().chain_id();
        let salt = sender_salt(deployer, &entropy);
        let init_code: Bytes = init_code(&self.bytecode, constructor_args).into();
        let predicted = match self.strategy {
            DeployStrategy::Create2 => predict_create2(deployer, chain_id, salt, &init_code),
            DeployStrategy::Create3 => predict_create3(deployer, chain_id, salt),
        };
        debug!(%deployer, %salt, %predicted, strategy = %self.strategy, "Planned deployment");

        Ok(Plan {
            deployer,
            predicted,
            details: DeploymentDetails {
                artifact: self.artifact.clone().unwrap_or_default(),
                label: self.label.clone(),
                entropy,
                salt,
                bytecode_hash: keccak256(&self.bytecode),
                init_code_hash: keccak256(&init_code),
                constructor_args: Bytes::copy_from_slice(constructor_args),
                create_strategy: self.strategy.to_string(),
            },
            init_code,
        })
    }
}
