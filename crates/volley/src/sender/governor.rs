//! OpenZeppelin Governor sender.
//!
//! Transactions are simulated as the account that will eventually execute them: the timelock
//! when there is one, the governor otherwise. On broadcast the queued calls become a single
//! `propose` transaction sent by the proposer.

use alloy_primitives::{keccak256, map::HashMap, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use serde::{Deserialize, Serialize};

use super::{check_proposer, SenderInitConfig};
use crate::{
    error::{SenderError, SenderResult},
    types::{SenderId, SimulatedTransaction, TransactionId},
};

sol! {
    /// Proposal entry point of an OpenZeppelin Governor.
    interface IGovernor {
        function propose(
            address[] targets,
            uint256[] values,
            bytes[] calldatas,
            string description
        ) external returns (uint256 proposalId);
    }
}

/// A governance proposal built from queued transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorProposal {
    /// The governor.
    pub governor: Address,
    /// Account that submitted the proposal.
    pub proposer: Address,
    /// Governor proposal id.
    pub proposal_id: U256,
    /// Proposal description.
    pub description: String,
    /// Call targets.
    pub targets: Vec<Address>,
    /// Call values.
    pub values: Vec<U256>,
    /// Calldata.
    pub calldatas: Vec<Bytes>,
    /// Proposed transactions, in queue order.
    pub transaction_ids: Vec<TransactionId>,
}

impl GovernorProposal {
    /// Calldata of the `propose` transaction.
    pub fn propose_calldata(&self) -> Bytes {
        IGovernor::proposeCall {
            targets: self.targets.clone(),
            values: self.values.clone(),
            calldatas: self.calldatas.clone(),
            description: self.description.clone(),
        }
        .abi_encode()
        .into()
    }
}

/// Proposal id as computed by `Governor.hashProposal`.
pub fn proposal_id(
    targets: &[Address],
    values: &[U256],
    calldatas: &[Bytes],
    description: &str,
) -> U256 {
    let encoded = (targets.to_vec(), values.to_vec(), calldatas.to_vec(), keccak256(description))
        .abi_encode_params();
    U256::from_be_bytes(keccak256(encoded).0)
}

/// A governor whose proposals are submitted by another sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GovernorSender {
    governor: Address,
    timelock: Address,
    proposer: String,
    description: Option<String>,
}

impl GovernorSender {
    /// Decodes `abi.encode(address governor, address timelock, string proposer)`.
    pub(crate) fn initialize(
        config: &SenderInitConfig,
        configs: &HashMap<SenderId, &SenderInitConfig>,
    ) -> SenderResult<Self> {
        let invalid = |reason: String| SenderError::InvalidGovernorConfig {
            name: config.name.clone(),
            reason,
        };

        let (governor, timelock, proposer) =
            <(Address, Address, String)>::abi_decode_params(&config.config, true)
                .map_err(|_| invalid("malformed governor config".to_string()))?;
        if governor.is_zero() {
            return Err(invalid("zero governor".to_string()));
        }
        check_proposer(&proposer, configs).map_err(invalid)?;
        Ok(Self { governor, timelock, proposer, description: None })
    }

    /// The governor.
    pub const fn governor(&self) -> Address {
        self.governor
    }

    /// The timelock, zero when the governor executes directly.
    pub const fn timelock(&self) -> Address {
        self.timelock
    }

    /// Account proposals are executed by.
    pub fn effective_account(&self) -> Address {
        if self.timelock.is_zero() {
            self.governor
        } else {
            self.timelock
        }
    }

    /// Name of the proposing sender.
    pub fn proposer(&self) -> &str {
        &self.proposer
    }

    /// Proposal description, once set.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Sets the proposal description. It can be set once.
    pub(crate) fn set_description(&mut self, name: &str, description: String) -> SenderResult<()> {
        if self.description.is_some() {
            return Err(SenderError::ProposalDescriptionAlreadySet(name.to_string()));
        }
        self.description = Some(description);
        Ok(())
    }

    /// Builds the proposal for `transactions`.
    pub(crate) fn build_proposal(
        &self,
        name: &str,
        proposer: Address,
        transactions: &[&SimulatedTransaction],
    ) -> SenderResult<GovernorProposal> {
        let description = self
            .description
            .clone()
            .ok_or_else(|| SenderError::ProposalDescriptionNotSet(name.to_string()))?;

        let targets: Vec<Address> = transactions.iter().map(|tx| tx.to).collect();
        let values: Vec<U256> = transactions.iter().map(|tx| tx.value).collect();
        let calldatas: Vec<Bytes> = transactions.iter().map(|tx| tx.data.clone()).collect();
        Ok(GovernorProposal {
            governor: self.governor,
            proposer,
            proposal_id: proposal_id(&targets, &values, &calldatas, &description),
            description,
            targets,
            values,
            calldatas,
            transaction_ids: transactions.iter().map(|tx| tx.transaction_id).collect(),
        })
    }
}
