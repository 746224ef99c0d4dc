use alloy_primitives::{hex, Bytes, U256};
use alloy_sol_types::{decode_revert_reason, Panic, Revert, SolError};
use serde::{Deserialize, Serialize};

/// The raw failure payload of a call, exactly as the target produced it.
///
/// An empty payload is meaningful: it is what a call observes when it attempts to mutate
/// state inside a static frame, and the harness relies on that to detect read-only calls.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallFailure(Bytes);

impl CallFailure {
    /// Wraps a raw failure payload.
    pub fn new(output: impl Into<Bytes>) -> Self {
        Self(output.into())
    }

    /// A failure without any payload.
    pub const fn empty() -> Self {
        Self(Bytes::new())
    }

    /// The failure produced by a state change inside a static frame.
    pub const fn state_change_during_static_call() -> Self {
        Self::empty()
    }

    /// Encodes `Error(string)` with `reason`.
    pub fn revert(reason: impl Into<String>) -> Self {
        Self::from_error(&Revert { reason: reason.into() })
    }

    /// Encodes `Panic(uint256)` with `code`.
    pub fn panic(code: u64) -> Self {
        Self::from_error(&Panic { code: U256::from(code) })
    }

    /// Encodes any Solidity custom error.
    pub fn from_error<E: SolError>(error: &E) -> Self {
        Self(error.abi_encode().into())
    }

    /// Returns `true` if the failure carries no payload.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw payload.
    pub const fn output(&self) -> &Bytes {
        &self.0
    }

    /// Consumes the failure and returns the raw payload.
    pub fn into_output(self) -> Bytes {
        self.0
    }

    /// Attempts to decode the payload as the custom error `E`.
    pub fn decode<E: SolError>(&self) -> Option<E> {
        E::abi_decode(&self.0, true).ok()
    }
}

impl core::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "call failed without data");
        }
        match decode_revert_reason(&self.0) {
            Some(reason) => write!(f, "{reason}"),
            None => write!(f, "call failed with data {}", hex::encode_prefixed(&self.0)),
        }
    }
}

impl core::error::Error for CallFailure {}
