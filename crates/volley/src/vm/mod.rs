//! Execution backend the registry simulates and broadcasts against.
//!
//! The registry only needs a handful of capabilities from the chain it talks to: run a call as
//! an arbitrary account, run a read-only call, perform and record a real broadcast, and take
//! and restore snapshots of the world state. [`Vm`] captures exactly that, and
//! [`MemoryVm`] implements it in-process.
//!
//! Contracts reach the registry through harness routes: a call to a routed harness address
//! during simulation runs against the target as the sender's account and is reported back as
//! a [`Submission`], which the registry queues like any other transaction.

mod createx;
mod failure;
mod memory;
mod program;

pub use createx::*;
pub use failure::*;
pub use memory::*;
pub use program::*;

use alloy_primitives::{Address, Bytes, U256};
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

/// Handle of a world state snapshot.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
pub struct SnapshotId(pub u64);

/// A call issued against the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Account the call is executed as.
    pub from: Address,
    /// Target of the call.
    pub to: Address,
    /// Native value transferred with the call.
    pub value: U256,
    /// Calldata.
    pub data: Bytes,
}

impl CallRequest {
    /// Creates a zero-value call request.
    pub fn new(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self { from, to, value: U256::ZERO, data: data.into() }
    }

    /// Sets the value transferred with the call.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// A transaction that was really broadcast, in broadcast order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRecord {
    /// The broadcast call.
    #[serde(flatten)]
    pub request: CallRequest,
    /// Output of the call.
    pub output: Bytes,
}

/// A call a contract made through a harness route while being simulated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Harness the call went through.
    pub harness: Address,
    /// The call as executed, from the sender's account to the target.
    pub request: CallRequest,
    /// Output of the call.
    pub output: Bytes,
}

/// Capabilities of the execution environment backing simulation and broadcast.
#[auto_impl(&mut, Box)]
pub trait Vm {
    /// Chain id of the environment.
    fn chain_id(&self) -> u64;

    /// Current block timestamp.
    fn timestamp(&self) -> u64;

    /// Code deployed at `address`.
    fn code(&self, address: Address) -> Bytes;

    /// Native balance of `address`.
    fn balance(&self, address: Address) -> U256;

    /// Executes `request` as `request.from` without broadcasting it. State changes persist on
    /// success and are rolled back on failure.
    fn call(&mut self, request: &CallRequest) -> Result<Bytes, CallFailure>;

    /// Executes `request` in a static frame. Any state change fails with an empty payload.
    fn static_call(&mut self, request: &CallRequest) -> Result<Bytes, CallFailure>;

    /// Executes `request` as a real transaction from `request.from` and records it.
    fn broadcast(&mut self, request: &CallRequest) -> Result<Bytes, CallFailure>;

    /// Snapshots the current world state.
    fn snapshot(&mut self) -> SnapshotId;

    /// Restores the world state captured by `id`. Returns `false` if `id` is unknown.
    /// The snapshot stays valid and can be reverted to again.
    fn revert_to(&mut self, id: SnapshotId) -> bool;

    /// Releases the snapshot `id`. Returns `false` if `id` is unknown.
    fn discard_snapshot(&mut self, id: SnapshotId) -> bool;

    /// Routes simulated calls to `harness` to `target`, executed as `account`. Calls made
    /// during a broadcast are never routed.
    fn route_harness(&mut self, harness: Address, account: Address, target: Address) {
        let _ = (harness, account, target);
    }

    /// Drains the submissions made through harness routes since the last drain.
    fn take_submissions(&mut self) -> Vec<Submission> {
        Vec::new()
    }

    /// Enters a static frame. Frames nest.
    fn enter_static(&mut self);

    /// Leaves the innermost static frame.
    fn exit_static(&mut self);

    /// Returns `true` inside a static frame.
    fn is_static(&self) -> bool;

    /// Fails with an empty payload if state may not be mutated in the current frame.
    fn ensure_mutable(&self) -> Result<(), CallFailure> {
        if self.is_static() {
            return Err(CallFailure::state_change_during_static_call());
        }
        Ok(())
    }
}
