use alloy_primitives::{Address, Bytes};

use crate::{sender::SenderType, types::TransactionId, vm::CallFailure};

/// Errors raised by the sender registry and the sender variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SenderError {
    /// The registry was initialized without senders.
    #[error("no senders configured")]
    NoSenders,

    /// The registry was initialized twice.
    #[error("sender registry already initialized")]
    RegistryAlreadyInitialized,

    /// The registry was used before it was initialized.
    #[error("sender registry not initialized")]
    RegistryNotInitialized,

    /// Two senders share a name.
    #[error("duplicate sender '{0}'")]
    DuplicateSender(String),

    /// The sender is unknown or was never set up.
    #[error("sender '{0}' is not initialized")]
    SenderNotInitialized(String),

    /// The sender is not allowed to broadcast.
    #[error("sender '{0}' cannot broadcast")]
    CannotBroadcast(String),

    /// `execute` was called without transactions.
    #[error("empty transaction array")]
    EmptyTransactionArray,

    /// A transaction targets the zero address.
    #[error("transaction {index} of sender '{name}' targets the zero address")]
    InvalidTargetAddress {
        /// Sender name.
        name: String,
        /// Position of the transaction in the submitted batch.
        index: usize,
    },

    /// The target failed. The payload is the target's own, unmodified.
    #[error(transparent)]
    Reverted(#[from] CallFailure),

    /// `broadcast` was called on a registry that already broadcast.
    #[error("broadcast already called")]
    BroadcastAlreadyCalled,

    /// A queued transaction belongs to a sender type without a broadcast strategy.
    #[error("unexpected broadcast for sender '{name}' of type {sender_type:?}")]
    UnexpectedSenderBroadcast {
        /// Sender name.
        name: String,
        /// Type tag of the sender.
        sender_type: SenderType,
    },

    /// A sender was used as a variant it is not.
    #[error("sender '{name}' is a {actual} sender, not a {expected} sender")]
    InvalidCast {
        /// Sender name.
        name: String,
        /// Requested variant.
        expected: &'static str,
        /// Actual variant.
        actual: &'static str,
    },

    /// The type tag carries no known category.
    #[error("sender '{name}' has an unsupported type {sender_type:?}")]
    InvalidSenderType {
        /// Sender name.
        name: String,
        /// Type tag of the sender.
        sender_type: SenderType,
    },

    /// The account of a sender is the zero address.
    #[error("sender '{0}' has no account")]
    ZeroAccount(String),

    /// Invalid private key sender configuration.
    #[error("invalid private key config for sender '{name}': {reason}")]
    InvalidPrivateKeyConfig {
        /// Sender name.
        name: String,
        /// What is wrong.
        reason: String,
    },

    /// Invalid hardware wallet sender configuration.
    #[error("invalid hardware wallet config for sender '{name}': {reason}")]
    InvalidHardwareWalletConfig {
        /// Sender name.
        name: String,
        /// What is wrong.
        reason: String,
    },

    /// Invalid multisig sender configuration.
    #[error("invalid multisig config for sender '{name}': {reason}")]
    InvalidMultisigConfig {
        /// Sender name.
        name: String,
        /// What is wrong.
        reason: String,
    },

    /// Invalid governor sender configuration.
    #[error("invalid governor config for sender '{name}': {reason}")]
    InvalidGovernorConfig {
        /// Sender name.
        name: String,
        /// What is wrong.
        reason: String,
    },

    /// A governor sender has queued transactions but no proposal description.
    #[error("proposal description not set for sender '{0}'")]
    ProposalDescriptionNotSet(String),

    /// The proposal description of a governor sender was already set.
    #[error("proposal description already set for sender '{0}'")]
    ProposalDescriptionAlreadySet(String),

    /// Multisig batches only carry zero-value calls.
    #[error("multisig sender '{name}' cannot batch transaction {transaction_id} with value")]
    MultisigNonZeroValue {
        /// Sender name.
        name: String,
        /// The offending transaction.
        transaction_id: TransactionId,
    },

    /// The proposer failed to sign a proposal.
    #[error("sender '{name}' failed to sign: {reason}")]
    SigningFailed {
        /// Sender name.
        name: String,
        /// Signer error.
        reason: String,
    },
}

impl SenderError {
    /// Returns the failure payload if this is a target failure.
    pub const fn failure(&self) -> Option<&CallFailure> {
        match self {
            Self::Reverted(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Errors raised while configuring or executing a deployment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    /// `label` and `entropy` were both set.
    #[error("label and entropy are mutually exclusive")]
    LabelEntropyConflict,

    /// No entropy was set and no artifact is known to derive it from.
    #[error("deployment has neither entropy nor artifact")]
    MissingArtifact,

    /// The deployment has no bytecode.
    #[error("deployment of '{0}' has no bytecode")]
    EmptyBytecode(String),

    /// The factory deployed somewhere else than predicted.
    #[error("predicted address {predicted} but the factory deployed at {actual}")]
    PredictedAddressMismatch {
        /// Predicted address.
        predicted: Address,
        /// Address returned by the factory.
        actual: Address,
    },

    /// The factory returned data that is not an address.
    #[error("invalid factory output {0}")]
    InvalidFactoryOutput(Bytes),

    /// The owning sender failed.
    #[error(transparent)]
    Sender(#[from] SenderError),
}

impl From<CallFailure> for DeployError {
    fn from(failure: CallFailure) -> Self {
        Self::Sender(SenderError::Reverted(failure))
    }
}

/// Result type of sender operations.
pub type SenderResult<T> = Result<T, SenderError>;

/// Result type of deployer operations.
pub type DeployResult<T> = Result<T, DeployError>;
