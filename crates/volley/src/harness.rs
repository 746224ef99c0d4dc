//! Per (sender, target) forwarding shims.
//!
//! A [`Harness`] lets a script call a contract as if it were calling it directly while the
//! call is actually queued through a sender. When the registry refuses to simulate because
//! the surrounding frame is static, which it signals with a failure that carries no payload,
//! the call is forwarded to the target as a plain static call instead. A failure that
//! carries a payload is the target's own and is returned untouched.

use alloy_primitives::{Address, Bytes};
use tracing::trace;

use crate::{
    coordinator::Coordinator,
    error::{SenderError, SenderResult},
    types::{SenderId, Transaction},
    vm::{CallRequest, Vm},
};

/// How an attempt to route a call through the sender ended.
#[derive(Debug)]
enum Routed {
    /// The call was simulated and queued.
    Queued(Bytes),
    /// The frame is static and nothing was queued.
    Blocked,
    /// The call failed for real.
    Failed(SenderError),
}

impl From<SenderResult<Bytes>> for Routed {
    fn from(result: SenderResult<Bytes>) -> Self {
        match result {
            Ok(output) => Self::Queued(output),
            Err(err) if err.failure().is_some_and(|failure| failure.is_empty()) => Self::Blocked,
            Err(err) => Self::Failed(err),
        }
    }
}

/// Routes calls to `target` through the queue of one sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Harness {
    sender: SenderId,
    target: Address,
    address: Address,
}

impl Harness {
    pub(crate) const fn new(sender: SenderId, target: Address, address: Address) -> Self {
        Self { sender, target, address }
    }

    /// Sender the calls are queued through.
    pub const fn sender(&self) -> SenderId {
        self.sender
    }

    /// Contract the calls are meant for.
    pub const fn target(&self) -> Address {
        self.target
    }

    /// Address of the harness itself.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Calls the target with `data`.
    ///
    /// Mutating calls are simulated and queued. In a static frame the call is forwarded as a
    /// static call and its result returned.
    pub fn call<V: Vm>(
        &self,
        coordinator: &mut Coordinator<V>,
        data: impl Into<Bytes>,
    ) -> SenderResult<Bytes> {
        let data = data.into();
        let attempt = coordinator
            .execute_by_id(self.sender, vec![Transaction::new(self.target, data.clone())])
            .and_then(|mut simulated| {
                simulated.pop().map(|tx| tx.return_data).ok_or(SenderError::EmptyTransactionArray)
            });

        match Routed::from(attempt) {
            Routed::Queued(output) => Ok(output),
            Routed::Blocked => {
                trace!(target = %self.target, harness = %self.address, "Forwarding read-only call");
                let request = CallRequest::new(self.address, self.target, data);
                Ok(coordinator.vm_mut().static_call(&request)?)
            }
            Routed::Failed(err) => Err(err),
        }
    }

    /// Calls the target with `data` inside a static frame.
    pub fn static_call<V: Vm>(
        &self,
        coordinator: &mut Coordinator<V>,
        data: impl Into<Bytes>,
    ) -> SenderResult<Bytes> {
        coordinator.vm_mut().enter_static();
        let result = self.call(coordinator, data);
        coordinator.vm_mut().exit_static();
        result
    }
}
