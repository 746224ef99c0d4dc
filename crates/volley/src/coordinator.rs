//! Scoped broadcast regions over a lazily initialized registry.

use alloy_primitives::{Address, Bytes, U256};
use delegate::delegate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    constants::DEFAULT_NAMESPACE,
    deployer::{DeployStrategy, Deployment},
    error::{SenderError, SenderResult},
    event::Event,
    harness::Harness,
    registry::{BroadcastOutcome, Senders},
    sender::{Sender, SenderInitConfig},
    types::{SenderId, SimulatedTransaction, Transaction},
    vm::Vm,
};

/// Settings the registry is initialized with on first use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    /// Senders, in initialization order.
    pub senders: Vec<SenderInitConfig>,
    /// Deployment namespace.
    pub namespace: String,
    /// Skip the broadcast and only simulate.
    pub dry_run: bool,
    /// Suppress events.
    pub quiet: bool,
}

impl CoordinatorConfig {
    /// Creates a config for `senders` in the default namespace.
    pub fn new(senders: Vec<SenderInitConfig>) -> Self {
        Self { senders, namespace: DEFAULT_NAMESPACE.to_string(), dry_run: false, quiet: false }
    }

    /// Sets the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the dry-run flag.
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the quiet flag.
    pub const fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

/// Owns the execution backend and the sender registry, and runs broadcast scopes.
///
/// Scopes nest. Transactions submitted in any scope join the same queue, and only the
/// outermost scope broadcasts when it ends.
#[derive(Debug)]
pub struct Coordinator<V> {
    vm: V,
    senders: Senders,
    config: CoordinatorConfig,
    broadcast_depth: usize,
    last_broadcast: Option<BroadcastOutcome>,
}

impl<V: Vm> Coordinator<V> {
    /// Creates a coordinator. The registry is initialized on first use.
    pub fn new(vm: V, config: CoordinatorConfig) -> Self {
        Self { vm, senders: Senders::new(), config, broadcast_depth: 0, last_broadcast: None }
    }

    /// The execution backend.
    pub const fn vm(&self) -> &V {
        &self.vm
    }

    /// The execution backend.
    pub fn vm_mut(&mut self) -> &mut V {
        &mut self.vm
    }

    /// Consumes the coordinator and returns the execution backend.
    pub fn into_vm(self) -> V {
        self.vm
    }

    /// The registry, possibly not yet initialized.
    pub const fn senders(&self) -> &Senders {
        &self.senders
    }

    /// The configuration.
    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    delegate! {
        to self.senders {
            /// Events emitted so far.
            pub fn events(&self) -> &[Event];
            /// Drains the emitted events.
            pub fn take_events(&mut self) -> Vec<Event>;
            /// The global queue, in submission order.
            pub fn queue(&self) -> &[SimulatedTransaction];
            /// Returns `true` once the registry broadcast.
            pub fn is_broadcasted(&self) -> bool;
            pub(crate) fn emit(&mut self, event: Event);
        }
    }

    /// Deployment namespace.
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Initializes the registry if it was not initialized yet.
    pub fn ensure_initialized(&mut self) -> SenderResult<()> {
        if self.senders.is_initialized() {
            return Ok(());
        }
        self.senders.initialize(
            &mut self.vm,
            self.config.senders.clone(),
            self.config.namespace.clone(),
            self.config.quiet,
        )?;
        self.senders.set_dry_run(self.config.dry_run);
        Ok(())
    }

    /// The registry, initialized.
    pub fn senders_mut(&mut self) -> SenderResult<&mut Senders> {
        self.ensure_initialized()?;
        Ok(&mut self.senders)
    }

    /// Looks up a sender by name.
    pub fn sender(&mut self, name: &str) -> SenderResult<&Sender> {
        self.ensure_initialized()?;
        self.senders.get(name)
    }

    /// Simulates and queues `transactions` through the sender `name`.
    pub fn execute(
        &mut self,
        name: &str,
        transactions: Vec<Transaction>,
    ) -> SenderResult<Vec<SimulatedTransaction>> {
        self.ensure_initialized()?;
        let id = self.senders.get(name)?.id();
        self.senders.execute(&mut self.vm, id, transactions)
    }

    /// Simulates and queues `transactions` through the sender `id`.
    pub fn execute_by_id(
        &mut self,
        id: SenderId,
        transactions: Vec<Transaction>,
    ) -> SenderResult<Vec<SimulatedTransaction>> {
        self.ensure_initialized()?;
        self.senders.execute(&mut self.vm, id, transactions)
    }

    /// Simulates and queues a single call through the sender `name`.
    pub fn call(
        &mut self,
        name: &str,
        to: Address,
        data: impl Into<Bytes>,
        value: U256,
    ) -> SenderResult<SimulatedTransaction> {
        let transaction = Transaction::new(to, data).with_value(value);
        let mut simulated = self.execute(name, vec![transaction])?;
        simulated.pop().ok_or(SenderError::EmptyTransactionArray)
    }

    /// Sets the proposal description of the governor sender `name`.
    pub fn set_proposal_description(
        &mut self,
        name: &str,
        description: impl Into<String>,
    ) -> SenderResult<()> {
        self.senders_mut()?.set_proposal_description(name, description)
    }

    /// Returns the harness routing calls from the sender `name` to `target`.
    pub fn harness(&mut self, name: &str, target: Address) -> SenderResult<Harness> {
        let sender = self.sender(name)?.id();
        let address = self.senders.harness(&mut self.vm, sender, target)?;
        Ok(Harness::new(sender, target, address))
    }

    /// Starts a CREATE2 deployment of `bytecode` through the sender `name`.
    pub fn create2(&mut self, name: &str, bytecode: impl Into<Bytes>) -> Deployment<'_, V> {
        Deployment::new(self, name, DeployStrategy::Create2, bytecode.into())
    }

    /// Starts a CREATE3 deployment of `bytecode` through the sender `name`.
    pub fn create3(&mut self, name: &str, bytecode: impl Into<Bytes>) -> Deployment<'_, V> {
        Deployment::new(self, name, DeployStrategy::Create3, bytecode.into())
    }

    /// Current nesting depth of broadcast scopes.
    pub const fn broadcast_depth(&self) -> usize {
        self.broadcast_depth
    }

    /// Outcome of the broadcast triggered by the outermost scope, once it ran.
    pub const fn last_broadcast(&self) -> Option<&BroadcastOutcome> {
        self.last_broadcast.as_ref()
    }

    /// Runs `f` in a broadcast scope.
    ///
    /// When the outermost scope returns successfully the registry broadcasts. Inner scopes
    /// only accumulate transactions. The depth is restored before `f`'s result is looked at,
    /// so a failing scope never leaves the coordinator nested.
    pub fn broadcast_scope<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<SenderError>,
    {
        self.ensure_initialized()?;

        self.broadcast_depth += 1;
        debug!(depth = self.broadcast_depth, "Entered broadcast scope");
        let result = f(self);
        self.broadcast_depth -= 1;

        let value = result?;
        if self.broadcast_depth == 0 {
            let outcome = self.senders.broadcast(&mut self.vm)?;
            self.last_broadcast = Some(outcome);
        }
        Ok(value)
    }
}
