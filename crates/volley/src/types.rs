use core::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// Submissions made in this process, across all registries.
static SUBMISSIONS: AtomicU64 = AtomicU64::new(0);

/// Stable identifier of a sender, the keccak256 hash of its name.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct SenderId(pub B256);

impl SenderId {
    /// Derives the id of the sender registered under `name`.
    pub fn from_name(name: &str) -> Self {
        Self(keccak256(name.as_bytes()))
    }
}

/// Unique identifier of a simulated transaction.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct TransactionId(pub B256);

impl TransactionId {
    /// Derives a transaction id from the chain id, the block timestamp and a counter that is
    /// incremented for every submission.
    pub fn derive(chain_id: u64, timestamp: u64, counter: u64) -> Self {
        let encoded = (U256::from(chain_id), U256::from(timestamp), U256::from(counter))
            .abi_encode_params();
        Self(keccak256(encoded))
    }

    /// Derives the id of the next submission in this process.
    pub fn next(chain_id: u64, timestamp: u64) -> Self {
        Self::derive(chain_id, timestamp, SUBMISSIONS.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// A minimal action request submitted through a sender.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Target of the call.
    pub to: Address,
    /// Calldata.
    pub data: Bytes,
    /// Native value transferred with the call.
    pub value: U256,
    /// Optional human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Transaction {
    /// Creates a zero-value transaction.
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self { to, data: data.into(), value: U256::ZERO, label: None }
    }

    /// Sets the value transferred with the call.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the label of the transaction.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A transaction together with the provenance recorded when it was simulated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, derive_more::Deref)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedTransaction {
    /// Unique id assigned at simulation time.
    pub transaction_id: TransactionId,
    /// Sender that submitted the transaction.
    pub sender_id: SenderId,
    /// The submitted transaction.
    #[deref]
    pub transaction: Transaction,
    /// Return data observed during simulation.
    pub return_data: Bytes,
    /// Return data observed when the transaction was replayed during broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_return_data: Option<Bytes>,
}
