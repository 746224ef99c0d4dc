//! The sender registry: named senders, the global transaction queue and the
//! simulate/broadcast protocol.
//!
//! Transactions are simulated the moment they are submitted, as the sender's account, so a
//! script sees their effects immediately. Every simulated transaction lands on one global
//! queue, and that queue's order is the only ordering that broadcast honours: it replays the
//! queue front to back, batching entries for senders that cannot execute directly and
//! flushing those batches once, in sender initialization order, after the pass.
//!
//! Contracts may submit further transactions while they are simulated by calling a harness.
//! Those nested submissions complete before the call that made them, so they are queued ahead
//! of it. Broadcast replays them directly, and the harness is an empty account on the real
//! chain.
//!
//! Broadcast always runs against the state captured right after initialization, and restores
//! the simulated state once it is done. A broadcast registry is closed and refuses further
//! submissions.

use alloy_primitives::{keccak256, map::HashMap, Address, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::{
    error::{SenderError, SenderResult},
    event::Event,
    sender::{GovernorProposal, SafeBatch, Sender, SenderInitConfig, SenderKind},
    types::{SenderId, SimulatedTransaction, Transaction, TransactionId},
    vm::{CallRequest, SnapshotId, Submission, Vm},
};

/// What a broadcast produced besides the transactions it replayed directly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastOutcome {
    /// Transactions of custom senders, left for the caller to submit.
    pub custom: Vec<SimulatedTransaction>,
    /// Safe batches awaiting signatures.
    pub safe_batches: Vec<SafeBatch>,
    /// Governor proposals that were submitted.
    pub proposals: Vec<GovernorProposal>,
}

/// Registry of senders and their queued transactions.
#[derive(Debug, Default)]
pub struct Senders {
    senders: HashMap<SenderId, Sender>,
    order: Vec<SenderId>,
    queue: Vec<SimulatedTransaction>,
    harnesses: HashMap<(SenderId, Address), Address>,
    namespace: String,
    snapshot: Option<SnapshotId>,
    broadcasted: bool,
    dry_run: bool,
    quiet: bool,
    events: Vec<Event>,
}

impl Senders {
    /// Creates an empty, uninitialized registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `configs` and takes the baseline snapshot broadcast later reverts to.
    ///
    /// All base records are validated before any variant initializer runs, so proposer
    /// references may point at senders declared later. Nothing is registered on failure.
    pub fn initialize<V: Vm>(
        &mut self,
        vm: &mut V,
        configs: Vec<SenderInitConfig>,
        namespace: impl Into<String>,
        quiet: bool,
    ) -> SenderResult<()> {
        if self.is_initialized() {
            return Err(SenderError::RegistryAlreadyInitialized);
        }
        if configs.is_empty() {
            return Err(SenderError::NoSenders);
        }

        let mut by_id = HashMap::default();
        for config in &configs {
            if by_id.insert(SenderId::from_name(&config.name), config).is_some() {
                return Err(SenderError::DuplicateSender(config.name.clone()));
            }
        }

        let mut kinds = Vec::with_capacity(configs.len());
        for config in &configs {
            kinds.push(SenderKind::initialize(config, &by_id)?);
        }

        let mut senders = HashMap::default();
        let mut order = Vec::with_capacity(configs.len());
        for (config, kind) in configs.into_iter().zip(kinds) {
            let sender = Sender::new(config, kind)?;
            debug!(
                name = sender.name(),
                id = %sender.id(),
                account = %sender.account(),
                kind = sender.kind().name(),
                "Initialized sender"
            );
            order.push(sender.id());
            senders.insert(sender.id(), sender);
        }

        self.senders = senders;
        self.order = order;
        self.namespace = namespace.into();
        self.quiet = quiet;
        self.snapshot = Some(vm.snapshot());
        info!(senders = self.order.len(), namespace = %self.namespace, "Initialized sender registry");
        Ok(())
    }

    /// Returns `true` once [`Self::initialize`] succeeded.
    pub const fn is_initialized(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Returns `true` once [`Self::broadcast`] was called.
    pub const fn is_broadcasted(&self) -> bool {
        self.broadcasted
    }

    /// Deployment namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Turns broadcast into a no-op that only closes the registry.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Whether broadcast is a no-op.
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Looks up a sender by name.
    pub fn get(&self, name: &str) -> SenderResult<&Sender> {
        self.senders
            .get(&SenderId::from_name(name))
            .ok_or_else(|| SenderError::SenderNotInitialized(name.to_string()))
    }

    /// Looks up a sender by id.
    pub fn get_by_id(&self, id: SenderId) -> SenderResult<&Sender> {
        self.senders.get(&id).ok_or_else(|| SenderError::SenderNotInitialized(id.to_string()))
    }

    fn get_mut(&mut self, id: SenderId) -> SenderResult<&mut Sender> {
        self.senders.get_mut(&id).ok_or_else(|| SenderError::SenderNotInitialized(id.to_string()))
    }

    fn get_mut_by_name(&mut self, name: &str) -> SenderResult<&mut Sender> {
        self.senders
            .get_mut(&SenderId::from_name(name))
            .ok_or_else(|| SenderError::SenderNotInitialized(name.to_string()))
    }

    /// Senders in initialization order.
    pub fn iter(&self) -> impl Iterator<Item = &Sender> + '_ {
        self.order.iter().filter_map(|id| self.senders.get(id))
    }

    /// The global queue, in submission order.
    pub fn queue(&self) -> &[SimulatedTransaction] {
        &self.queue
    }

    /// Looks up a queued transaction.
    pub fn transaction(&self, id: TransactionId) -> Option<&SimulatedTransaction> {
        self.queue.iter().find(|tx| tx.transaction_id == id)
    }

    /// Events emitted so far.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drains the emitted events.
    pub fn take_events(&mut self) -> Vec<Event> {
        core::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: Event) {
        if self.quiet {
            trace!(event = event.name(), "Suppressed event");
            return;
        }
        info!(event = event.name(), "{event:?}");
        self.events.push(event);
    }

    /// Sets the proposal description of the governor sender `name`.
    pub fn set_proposal_description(
        &mut self,
        name: &str,
        description: impl Into<String>,
    ) -> SenderResult<()> {
        let sender = self.get_mut_by_name(name)?;
        sender.as_governor_mut()?.set_description(name, description.into())
    }

    /// Sets the nonce the next batch of the Safe sender `name` is built for.
    pub fn set_safe_nonce(&mut self, name: &str, nonce: U256) -> SenderResult<()> {
        let sender = self.get_mut_by_name(name)?;
        sender.as_multisig_mut()?.set_nonce(nonce);
        Ok(())
    }

    /// Returns the harness address routing calls from `sender` to `target`, registering it
    /// and its route in `vm` on first use.
    pub fn harness<V: Vm>(
        &mut self,
        vm: &mut V,
        sender: SenderId,
        target: Address,
    ) -> SenderResult<Address> {
        let account = self.get_by_id(sender)?.account();
        let address = *self
            .harnesses
            .entry((sender, target))
            .or_insert_with(|| harness_address(sender, target));
        vm.route_harness(address, account, target);
        Ok(address)
    }

    /// Returns the (sender, target) pair served by the harness at `address`.
    pub fn harness_route(&self, address: Address) -> Option<(SenderId, Address)> {
        self.harnesses.iter().find(|(_, harness)| **harness == address).map(|(key, _)| *key)
    }

    /// Simulates `transactions` as `sender` and appends them to the global queue.
    ///
    /// The batch is atomic: if any transaction fails, the state changes of the batch are
    /// rolled back and nothing is queued. Transactions contracts submitted through a harness
    /// while the batch ran are queued with it.
    pub fn execute<V: Vm>(
        &mut self,
        vm: &mut V,
        sender: SenderId,
        transactions: Vec<Transaction>,
    ) -> SenderResult<Vec<SimulatedTransaction>> {
        self.ensure_open()?;
        let name = {
            let record = self.get_by_id(sender)?;
            if !record.can_broadcast() {
                return Err(SenderError::CannotBroadcast(record.name().to_string()));
            }
            record.name().to_string()
        };
        if transactions.is_empty() {
            return Err(SenderError::EmptyTransactionArray);
        }
        if let Some(index) = transactions.iter().position(|tx| tx.to.is_zero()) {
            return Err(SenderError::InvalidTargetAddress { name, index });
        }

        let checkpoint = vm.snapshot();
        let result = self.simulate_batch(vm, sender, transactions);
        if result.is_err() {
            vm.revert_to(checkpoint);
        }
        vm.discard_snapshot(checkpoint);
        let simulated = result?;

        for tx in &simulated {
            self.get_mut(tx.sender_id)?.record(tx.transaction_id);
        }
        self.queue.extend(simulated.iter().cloned());
        self.emit_simulated(&simulated)?;
        Ok(simulated)
    }

    /// Simulates `transactions` as `sender` against the current state without queueing them.
    ///
    /// Inside a static frame nothing is simulated and the call fails with an empty payload.
    /// Otherwise a failing target surfaces its own failure payload unchanged.
    pub fn simulate<V: Vm>(
        &mut self,
        vm: &mut V,
        sender: SenderId,
        transactions: Vec<Transaction>,
    ) -> SenderResult<Vec<SimulatedTransaction>> {
        self.ensure_open()?;
        let simulated = self.simulate_batch(vm, sender, transactions)?;
        self.emit_simulated(&simulated)?;
        Ok(simulated)
    }

    fn ensure_open(&self) -> SenderResult<()> {
        if !self.is_initialized() {
            return Err(SenderError::RegistryNotInitialized);
        }
        if self.broadcasted {
            return Err(SenderError::BroadcastAlreadyCalled);
        }
        Ok(())
    }

    /// Runs the batch without emitting success events, so a batch that fails halfway leaves
    /// none behind.
    fn simulate_batch<V: Vm>(
        &mut self,
        vm: &mut V,
        sender: SenderId,
        transactions: Vec<Transaction>,
    ) -> SenderResult<Vec<SimulatedTransaction>> {
        let (name, account) = {
            let record = self.get_by_id(sender)?;
            (record.name().to_string(), record.account())
        };

        let mut simulated = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            vm.ensure_mutable()?;

            let request = CallRequest::new(account, transaction.to, transaction.data.clone())
                .with_value(transaction.value);
            // stale submissions from calls made outside the registry
            vm.take_submissions();
            let result = vm.call(&request);
            let nested = vm.take_submissions();

            match result {
                Ok(return_data) => {
                    for submission in nested {
                        simulated.push(self.nested(vm, submission)?);
                    }
                    let transaction_id = TransactionId::next(vm.chain_id(), vm.timestamp());
                    trace!(%transaction_id, sender = %name, to = %transaction.to, "Simulated transaction");
                    simulated.push(SimulatedTransaction {
                        transaction_id,
                        sender_id: sender,
                        transaction,
                        return_data,
                        broadcast_return_data: None,
                    });
                }
                Err(failure) => {
                    let transaction_id = TransactionId::next(vm.chain_id(), vm.timestamp());
                    warn!(%transaction_id, sender = %name, to = %transaction.to, %failure, "Simulation failed");
                    self.emit(Event::TransactionFailed {
                        transaction_id,
                        sender_id: sender,
                        sender: name,
                        transaction,
                        revert_data: failure.output().clone(),
                    });
                    return Err(failure.into());
                }
            }
        }
        Ok(simulated)
    }

    /// Turns a call a contract made through a harness into a simulated transaction of the
    /// harness's sender.
    fn nested<V: Vm>(
        &self,
        vm: &V,
        submission: Submission,
    ) -> SenderResult<SimulatedTransaction> {
        let (sender_id, target) = self
            .harness_route(submission.harness)
            .ok_or_else(|| SenderError::SenderNotInitialized(submission.harness.to_string()))?;
        let record = self.get_by_id(sender_id)?;
        if !record.can_broadcast() {
            return Err(SenderError::CannotBroadcast(record.name().to_string()));
        }

        let transaction_id = TransactionId::next(vm.chain_id(), vm.timestamp());
        trace!(%transaction_id, sender = record.name(), to = %target, harness = %submission.harness, "Simulated nested transaction");
        let request = submission.request;
        Ok(SimulatedTransaction {
            transaction_id,
            sender_id,
            transaction: Transaction::new(target, request.data).with_value(request.value),
            return_data: submission.output,
            broadcast_return_data: None,
        })
    }

    fn emit_simulated(&mut self, simulated: &[SimulatedTransaction]) -> SenderResult<()> {
        for tx in simulated {
            let sender = self.get_by_id(tx.sender_id)?.name().to_string();
            self.emit(Event::TransactionSimulated { sender, transaction: tx.clone() });
        }
        Ok(())
    }

    /// Replays the global queue for real, once.
    ///
    /// Key based senders replay their transactions immediately, multisig and governance
    /// senders collect theirs into one batch each, and custom senders hand theirs back in the
    /// returned outcome. The simulated state is restored afterwards, whether or not the
    /// replay succeeded.
    pub fn broadcast<V: Vm>(&mut self, vm: &mut V) -> SenderResult<BroadcastOutcome> {
        let baseline = self.snapshot.ok_or(SenderError::RegistryNotInitialized)?;
        if self.broadcasted {
            return Err(SenderError::BroadcastAlreadyCalled);
        }
        self.broadcasted = true;

        if self.dry_run {
            info!(queued = self.queue.len(), "Dry run, skipping broadcast");
            return Ok(BroadcastOutcome::default());
        }

        let post = vm.snapshot();
        vm.revert_to(baseline);
        let result = self.replay(vm);
        vm.revert_to(post);
        vm.discard_snapshot(post);
        vm.discard_snapshot(baseline);

        if let Ok(outcome) = &result {
            info!(
                queued = self.queue.len(),
                custom = outcome.custom.len(),
                safe_batches = outcome.safe_batches.len(),
                proposals = outcome.proposals.len(),
                "Broadcast complete"
            );
        }
        result
    }

    fn replay<V: Vm>(&mut self, vm: &mut V) -> SenderResult<BroadcastOutcome> {
        let mut outcome = BroadcastOutcome::default();
        let mut batches: HashMap<SenderId, Vec<usize>> = HashMap::default();

        for index in 0..self.queue.len() {
            let sender_id = self.queue[index].sender_id;
            let sender = self.get_by_id(sender_id)?;
            match sender.kind() {
                SenderKind::PrivateKey(_) | SenderKind::HardwareWallet(_) => {
                    let (name, account) = (sender.name().to_string(), sender.account());
                    let tx = &self.queue[index];
                    let request =
                        CallRequest::new(account, tx.to, tx.data.clone()).with_value(tx.value);
                    let output = vm.broadcast(&request)?;

                    let tx = &mut self.queue[index];
                    tx.broadcast_return_data = Some(output.clone());
                    let event = Event::TransactionBroadcast {
                        transaction_id: tx.transaction_id,
                        sender: name,
                        from: account,
                        to: tx.to,
                        return_data: output,
                    };
                    self.emit(event);
                }
                SenderKind::Multisig(_) | SenderKind::Governor(_) => {
                    batches.entry(sender_id).or_default().push(index);
                }
                SenderKind::Custom => outcome.custom.push(self.queue[index].clone()),
                SenderKind::Unsupported => {
                    return Err(SenderError::UnexpectedSenderBroadcast {
                        name: sender.name().to_string(),
                        sender_type: sender.sender_type(),
                    })
                }
            }
        }

        for id in self.order.clone() {
            let Some(indices) = batches.remove(&id) else { continue };
            let is_multisig = matches!(self.get_by_id(id)?.kind(), SenderKind::Multisig(_));
            if is_multisig {
                outcome.safe_batches.push(self.flush_multisig(vm, id, &indices)?);
            } else {
                outcome.proposals.push(self.flush_governor(vm, id, &indices)?);
            }
        }
        Ok(outcome)
    }

    fn flush_multisig<V: Vm>(
        &mut self,
        vm: &mut V,
        id: SenderId,
        indices: &[usize],
    ) -> SenderResult<SafeBatch> {
        let chain_id = vm.chain_id();
        let (name, safe, proposer_name) = {
            let sender = self.get_by_id(id)?;
            let multisig = sender.as_multisig()?;
            (sender.name().to_string(), sender.account(), multisig.proposer().to_string())
        };
        let proposer = self.get(&proposer_name)?;
        let proposer_account = proposer.account();
        let signer = match proposer.kind() {
            SenderKind::PrivateKey(signer) => Some(signer.clone()),
            _ => None,
        };

        let transactions: Vec<&SimulatedTransaction> =
            indices.iter().map(|index| &self.queue[*index]).collect();
        let mut batch = {
            let sender = self
                .senders
                .get_mut(&id)
                .ok_or_else(|| SenderError::SenderNotInitialized(name.clone()))?;
            sender.as_multisig_mut()?.build_batch(
                &name,
                safe,
                proposer_account,
                chain_id,
                &transactions,
            )?
        };

        if let Some(signer) = signer {
            let signature = signer
                .sign_hash(&batch.safe_tx_hash)
                .map_err(|reason| SenderError::SigningFailed { name: proposer_name, reason })?;
            batch.signature = Some(signature);
        }

        debug!(safe = %safe, safe_tx_hash = %batch.safe_tx_hash, transactions = indices.len(), "Queued Safe batch");
        self.emit(Event::SafeTransactionQueued {
            safe_tx_hash: batch.safe_tx_hash,
            safe,
            proposer: proposer_account,
            signature: batch.signature.clone(),
            transaction_ids: batch.transaction_ids.clone(),
        });
        Ok(batch)
    }

    fn flush_governor<V: Vm>(
        &mut self,
        vm: &mut V,
        id: SenderId,
        indices: &[usize],
    ) -> SenderResult<GovernorProposal> {
        let sender = self.get_by_id(id)?;
        let governor = sender.as_governor()?;
        let proposer = self.get(governor.proposer())?.account();

        let transactions: Vec<&SimulatedTransaction> =
            indices.iter().map(|index| &self.queue[*index]).collect();
        let proposal = governor.build_proposal(sender.name(), proposer, &transactions)?;

        let request = CallRequest::new(proposer, proposal.governor, proposal.propose_calldata());
        vm.broadcast(&request)?;

        debug!(governor = %proposal.governor, proposal_id = %proposal.proposal_id, "Submitted governor proposal");
        self.emit(Event::GovernorProposalCreated {
            proposal_id: proposal.proposal_id,
            governor: proposal.governor,
            proposer,
            transaction_ids: proposal.transaction_ids.clone(),
        });
        Ok(proposal)
    }
}

/// Derives the deterministic address of a harness.
pub fn harness_address(sender: SenderId, target: Address) -> Address {
    Address::from_word(keccak256((sender.0, target).abi_encode_params()))
}
