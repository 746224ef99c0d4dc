//! Notifications emitted for CLIs and indexers. Nothing inside the crate consumes them.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::types::{SenderId, SimulatedTransaction, Transaction, TransactionId};

/// Provenance of a deterministic deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetails {
    /// Artifact identifier.
    pub artifact: String,
    /// Label, if any.
    pub label: Option<String>,
    /// Resolved entropy.
    pub entropy: String,
    /// Sender-scoped salt submitted to the factory.
    pub salt: B256,
    /// keccak256 of the creation bytecode.
    pub bytecode_hash: B256,
    /// keccak256 of bytecode and constructor arguments.
    pub init_code_hash: B256,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
    /// `CREATE2` or `CREATE3`.
    pub create_strategy: String,
}

/// A notification emitted by the registry or the deployer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    /// A transaction was simulated successfully.
    TransactionSimulated {
        /// Name of the submitting sender.
        sender: String,
        /// The simulated transaction.
        transaction: SimulatedTransaction,
    },
    /// A transaction failed during simulation.
    TransactionFailed {
        /// Id assigned to the failed transaction.
        transaction_id: TransactionId,
        /// Submitting sender.
        sender_id: SenderId,
        /// Name of the submitting sender.
        sender: String,
        /// The failed transaction.
        transaction: Transaction,
        /// Failure payload of the target.
        revert_data: Bytes,
    },
    /// A queued transaction was replayed on the real backend.
    TransactionBroadcast {
        /// Id of the replayed transaction.
        transaction_id: TransactionId,
        /// Name of the owning sender.
        sender: String,
        /// Account the transaction was sent from.
        from: Address,
        /// Target of the transaction.
        to: Address,
        /// Output of the replay.
        return_data: Bytes,
    },
    /// A contract was deployed.
    ContractDeployed {
        /// Account that submitted the deployment.
        deployer: Address,
        /// Address of the new contract.
        location: Address,
        /// Transaction that deployed it.
        transaction_id: TransactionId,
        /// Deployment provenance.
        deployment: DeploymentDetails,
    },
    /// A deployment was skipped because its address already holds code.
    DeploymentCollision {
        /// The occupied address.
        existing_contract: Address,
        /// Deployment provenance.
        deployment: DeploymentDetails,
    },
    /// A multisig batch was queued for signatures.
    SafeTransactionQueued {
        /// EIP-712 hash of the Safe transaction.
        safe_tx_hash: B256,
        /// The Safe.
        safe: Address,
        /// Account proposing the batch.
        proposer: Address,
        /// Proposer signature over `safe_tx_hash`, when the proposer holds its key.
        signature: Option<Bytes>,
        /// Batched transactions.
        transaction_ids: Vec<TransactionId>,
    },
    /// A governance proposal was created.
    GovernorProposalCreated {
        /// Governor proposal id.
        proposal_id: U256,
        /// The governor.
        governor: Address,
        /// Account that submitted the proposal.
        proposer: Address,
        /// Proposed transactions.
        transaction_ids: Vec<TransactionId>,
    },
}

impl Event {
    /// Short name of the event.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TransactionSimulated { .. } => "TransactionSimulated",
            Self::TransactionFailed { .. } => "TransactionFailed",
            Self::TransactionBroadcast { .. } => "TransactionBroadcast",
            Self::ContractDeployed { .. } => "ContractDeployed",
            Self::DeploymentCollision { .. } => "DeploymentCollision",
            Self::SafeTransactionQueued { .. } => "SafeTransactionQueued",
            Self::GovernorProposalCreated { .. } => "GovernorProposalCreated",
        }
    }
}
