//! In-memory execution backend.
//!
//! [`MemoryVm`] keeps the whole world state in a map of accounts and gives contracts behaviour
//! through native [`Program`]s bound to creation bytecode. Every call frame checkpoints the
//! state and restores it on failure, so failed calls leave no trace. Snapshots are full copies
//! of the world state and stay valid after being reverted to, until they are discarded.
//!
//! Static frames follow EVM semantics: storage writes, value transfers and contract creations
//! inside a static frame fail with an empty payload.
//!
//! A call to a routed harness address runs against the route's target as the sender's
//! account. Outside a static frame it is also recorded as a [`Submission`]. Recorded
//! submissions live in the world state, so a frame that fails drops the ones it made.

use std::sync::Arc;

use alloy_primitives::{keccak256, map::HashMap, Address, Bytes, B256, U256};
use tracing::trace;

use super::{
    BroadcastRecord, CallFailure, CallRequest, CreateXProgram, Create3ProxyProgram, Program,
    ProgramRegistry, SnapshotId, Submission, Vm, CREATEX_CODE,
};
use crate::constants::{
    CREATE3_PROXY_BYTECODE, CREATEX_ADDRESS, DEFAULT_CHAIN_ID, DEFAULT_TIMESTAMP,
};

/// Maximum call depth, as in the EVM.
const MAX_CALL_DEPTH: usize = 1024;

/// State of a single account.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    /// Native balance.
    pub balance: U256,
    /// Nonce. Contracts start at 1.
    pub nonce: u64,
    /// Deployed code.
    pub code: Bytes,
    /// Storage slots.
    pub storage: HashMap<U256, U256>,
}

/// The complete world state of the in-memory backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    accounts: HashMap<Address, AccountState>,
    submissions: Vec<Submission>,
}

impl WorldState {
    /// Returns the account at `address`, if it was ever touched.
    pub fn account(&self, address: Address) -> Option<&AccountState> {
        self.accounts.get(&address)
    }

    fn account_mut(&mut self, address: Address) -> &mut AccountState {
        self.accounts.entry(address).or_default()
    }

    fn code(&self, address: Address) -> Bytes {
        self.accounts.get(&address).map(|account| account.code.clone()).unwrap_or_default()
    }

    fn balance(&self, address: Address) -> U256 {
        self.accounts.get(&address).map(|account| account.balance).unwrap_or_default()
    }

    fn nonce(&self, address: Address) -> u64 {
        self.accounts.get(&address).map(|account| account.nonce).unwrap_or_default()
    }

    fn sload(&self, address: Address, slot: U256) -> U256 {
        self.accounts
            .get(&address)
            .and_then(|account| account.storage.get(&slot).copied())
            .unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), CallFailure> {
        if value.is_zero() {
            return Ok(());
        }
        let from_account = self.account_mut(from);
        from_account.balance =
            from_account.balance.checked_sub(value).ok_or_else(CallFailure::empty)?;
        let to_account = self.account_mut(to);
        to_account.balance = to_account.balance.saturating_add(value);
        Ok(())
    }
}

/// Block level values visible to programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BlockEnv {
    chain_id: u64,
    timestamp: u64,
}

/// Where calls to a harness address go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct HarnessRoute {
    account: Address,
    target: Address,
}

/// Everything a call needs besides the state it mutates.
#[derive(Clone, Copy, Debug)]
struct Runtime<'a> {
    programs: &'a ProgramRegistry,
    routes: Option<&'a HashMap<Address, HarnessRoute>>,
    env: BlockEnv,
}

impl Runtime<'_> {
    fn route(&self, address: Address) -> Option<HarnessRoute> {
        self.routes.and_then(|routes| routes.get(&address).copied())
    }
}

/// The frame a program executes in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Frame {
    address: Address,
    caller: Address,
    value: U256,
    is_static: bool,
    depth: usize,
}

/// How a contract address is derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CreateScheme {
    Create,
    Create2(B256),
}

/// Execution context handed to a [`Program`].
#[derive(Debug)]
pub struct CallContext<'a> {
    state: &'a mut WorldState,
    runtime: Runtime<'a>,
    frame: Frame,
}

impl CallContext<'_> {
    /// Address of the executing contract.
    pub const fn address(&self) -> Address {
        self.frame.address
    }

    /// Caller of the current frame.
    pub const fn caller(&self) -> Address {
        self.frame.caller
    }

    /// Value sent with the current frame.
    pub const fn value(&self) -> U256 {
        self.frame.value
    }

    /// Returns `true` if the current frame is static.
    pub const fn is_static(&self) -> bool {
        self.frame.is_static
    }

    /// Chain id.
    pub const fn chain_id(&self) -> u64 {
        self.runtime.env.chain_id
    }

    /// Block timestamp.
    pub const fn timestamp(&self) -> u64 {
        self.runtime.env.timestamp
    }

    /// Code at `address`.
    pub fn code(&self, address: Address) -> Bytes {
        self.state.code(address)
    }

    /// Balance of `address`.
    pub fn balance(&self, address: Address) -> U256 {
        self.state.balance(address)
    }

    /// Reads a storage slot of the executing contract.
    pub fn sload(&self, slot: U256) -> U256 {
        self.state.sload(self.frame.address, slot)
    }

    /// Writes a storage slot of the executing contract.
    pub fn sstore(&mut self, slot: U256, value: U256) -> Result<(), CallFailure> {
        if self.frame.is_static {
            return Err(CallFailure::state_change_during_static_call());
        }
        let account = self.state.account_mut(self.frame.address);
        if value.is_zero() {
            account.storage.remove(&slot);
        } else {
            account.storage.insert(slot, value);
        }
        Ok(())
    }

    /// Calls `to` from the executing contract.
    pub fn call(&mut self, to: Address, data: &[u8], value: U256) -> Result<Bytes, CallFailure> {
        let frame = Frame {
            address: to,
            caller: self.frame.address,
            value,
            is_static: self.frame.is_static,
            depth: self.frame.depth + 1,
        };
        execute_call(self.state, self.runtime, frame, data)
    }

    /// Calls `to` from the executing contract in a static frame.
    pub fn static_call(&mut self, to: Address, data: &[u8]) -> Result<Bytes, CallFailure> {
        let frame = Frame {
            address: to,
            caller: self.frame.address,
            value: U256::ZERO,
            is_static: true,
            depth: self.frame.depth + 1,
        };
        execute_call(self.state, self.runtime, frame, data)
    }

    /// Deploys `init_code` with CREATE from the executing contract.
    pub fn create(&mut self, init_code: &[u8], value: U256) -> Result<Address, CallFailure> {
        execute_create(
            self.state,
            self.runtime,
            self.frame,
            CreateScheme::Create,
            init_code,
            value,
        )
    }

    /// Deploys `init_code` with CREATE2 from the executing contract.
    pub fn create2(
        &mut self,
        salt: B256,
        init_code: &[u8],
        value: U256,
    ) -> Result<Address, CallFailure> {
        execute_create(
            self.state,
            self.runtime,
            self.frame,
            CreateScheme::Create2(salt),
            init_code,
            value,
        )
    }
}

fn execute_call(
    state: &mut WorldState,
    runtime: Runtime<'_>,
    frame: Frame,
    data: &[u8],
) -> Result<Bytes, CallFailure> {
    if frame.depth > MAX_CALL_DEPTH || (frame.is_static && !frame.value.is_zero()) {
        return Err(CallFailure::empty());
    }
    if let Some(route) = runtime.route(frame.address) {
        return execute_routed(state, runtime, frame, route, data);
    }

    let checkpoint = state.clone();
    let result = (|| -> Result<Bytes, CallFailure> {
        state.transfer(frame.caller, frame.address, frame.value)?;
        let code = state.code(frame.address);
        let Some(program) = runtime.programs.get(&code) else {
            // Accounts without code and inert code both succeed without output.
            return Ok(Bytes::new());
        };
        let mut ctx = CallContext { state: &mut *state, runtime, frame };
        program.call(&mut ctx, data)
    })();

    if result.is_err() {
        *state = checkpoint;
    }
    trace!(to = %frame.address, caller = %frame.caller, depth = frame.depth, ok = result.is_ok(), "call");
    result
}

/// Runs a call to a harness against its target as the routed account.
fn execute_routed(
    state: &mut WorldState,
    runtime: Runtime<'_>,
    frame: Frame,
    route: HarnessRoute,
    data: &[u8],
) -> Result<Bytes, CallFailure> {
    let inner = Frame {
        address: route.target,
        caller: route.account,
        value: frame.value,
        is_static: frame.is_static,
        depth: frame.depth + 1,
    };
    let output = execute_call(state, runtime, inner, data)?;
    if !frame.is_static {
        let request = CallRequest::new(route.account, route.target, Bytes::copy_from_slice(data))
            .with_value(frame.value);
        state.submissions.push(Submission {
            harness: frame.address,
            request,
            output: output.clone(),
        });
    }
    trace!(harness = %frame.address, target = %route.target, account = %route.account, "routed call");
    Ok(output)
}

fn execute_create(
    state: &mut WorldState,
    runtime: Runtime<'_>,
    creator: Frame,
    scheme: CreateScheme,
    init_code: &[u8],
    value: U256,
) -> Result<Address, CallFailure> {
    if creator.is_static || creator.depth >= MAX_CALL_DEPTH {
        return Err(CallFailure::state_change_during_static_call());
    }

    let creator_account = state.account_mut(creator.address);
    let nonce = creator_account.nonce;
    creator_account.nonce += 1;
    let address = match scheme {
        CreateScheme::Create => creator.address.create(nonce),
        CreateScheme::Create2(salt) => creator.address.create2(salt, keccak256(init_code)),
    };

    let checkpoint = state.clone();
    let result = (|| -> Result<Address, CallFailure> {
        if state.nonce(address) != 0 || !state.code(address).is_empty() {
            return Err(CallFailure::empty());
        }
        state.transfer(creator.address, address, value)?;
        state.account_mut(address).nonce = 1;

        let code = match runtime.programs.resolve(init_code) {
            Some((bytecode, args)) => {
                let program = runtime.programs.get(&bytecode).ok_or_else(CallFailure::empty)?;
                let frame = Frame {
                    address,
                    caller: creator.address,
                    value,
                    is_static: false,
                    depth: creator.depth + 1,
                };
                let mut ctx = CallContext { state: &mut *state, runtime, frame };
                program.construct(&mut ctx, args)?;
                bytecode
            }
            None => Bytes::copy_from_slice(init_code),
        };
        state.account_mut(address).code = code;
        Ok(address)
    })();

    if result.is_err() {
        *state = checkpoint;
    }
    trace!(%address, creator = %creator.address, ok = result.is_ok(), "create");
    result
}

/// An in-process [`Vm`] with snapshots, static frames and a broadcast log.
#[derive(Debug, Clone)]
pub struct MemoryVm {
    chain_id: u64,
    timestamp: u64,
    state: WorldState,
    programs: ProgramRegistry,
    routes: HashMap<Address, HarnessRoute>,
    snapshots: HashMap<u64, WorldState>,
    next_snapshot: u64,
    static_depth: usize,
    broadcasts: Vec<BroadcastRecord>,
}

impl Default for MemoryVm {
    fn default() -> Self {
        Self::new(DEFAULT_CHAIN_ID)
    }
}

impl MemoryVm {
    /// Creates a backend for `chain_id` with the CreateX factory installed.
    pub fn new(chain_id: u64) -> Self {
        let mut vm = Self {
            chain_id,
            timestamp: DEFAULT_TIMESTAMP,
            state: WorldState::default(),
            programs: ProgramRegistry::default(),
            routes: HashMap::default(),
            snapshots: HashMap::default(),
            next_snapshot: 0,
            static_depth: 0,
            broadcasts: Vec::new(),
        };
        vm.register_program(CREATEX_CODE, Arc::new(CreateXProgram));
        vm.register_program(CREATE3_PROXY_BYTECODE, Arc::new(Create3ProxyProgram));
        vm.set_code(CREATEX_ADDRESS, CREATEX_CODE);
        vm
    }

    /// Binds `program` to the creation bytecode `bytecode`.
    pub fn register_program(&mut self, bytecode: Bytes, program: Arc<dyn Program>) {
        self.programs.register(bytecode, program);
    }

    /// Binds `program` to the creation bytecode `bytecode`.
    pub fn with_program(mut self, bytecode: Bytes, program: Arc<dyn Program>) -> Self {
        self.register_program(bytecode, program);
        self
    }

    /// Places `code` at `address` without running a constructor.
    pub fn set_code(&mut self, address: Address, code: Bytes) {
        let account = self.state.account_mut(address);
        account.code = code;
        if account.nonce == 0 {
            account.nonce = 1;
        }
    }

    /// Places `code` at `address` without running a constructor.
    pub fn with_code(mut self, address: Address, code: Bytes) -> Self {
        self.set_code(address, code);
        self
    }

    /// Sets the balance of `address`.
    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.state.account_mut(address).balance = balance;
    }

    /// Sets the balance of `address`.
    pub fn with_balance(mut self, address: Address, balance: U256) -> Self {
        self.set_balance(address, balance);
        self
    }

    /// Sets a storage slot of `address`.
    pub fn set_storage(&mut self, address: Address, slot: U256, value: U256) {
        self.state.account_mut(address).storage.insert(slot, value);
    }

    /// Sets the block timestamp.
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Reads a storage slot of `address`.
    pub fn storage(&self, address: Address, slot: U256) -> U256 {
        self.state.sload(address, slot)
    }

    /// Nonce of `address`.
    pub fn nonce(&self, address: Address) -> u64 {
        self.state.nonce(address)
    }

    /// The current world state.
    pub const fn state(&self) -> &WorldState {
        &self.state
    }

    /// Transactions broadcast so far, in order.
    pub fn broadcasts(&self) -> &[BroadcastRecord] {
        &self.broadcasts
    }

    /// Drains the broadcast log.
    pub fn take_broadcasts(&mut self) -> Vec<BroadcastRecord> {
        core::mem::take(&mut self.broadcasts)
    }

    /// Re-broadcasts `records` in order, stopping at the first failure.
    pub fn replay(&mut self, records: &[BroadcastRecord]) -> Result<(), CallFailure> {
        for record in records {
            self.broadcast(&record.request)?;
        }
        Ok(())
    }

    /// Number of live snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    fn execute(
        &mut self,
        request: &CallRequest,
        is_static: bool,
        routed: bool,
    ) -> Result<Bytes, CallFailure> {
        let runtime = Runtime {
            programs: &self.programs,
            routes: routed.then_some(&self.routes),
            env: BlockEnv { chain_id: self.chain_id, timestamp: self.timestamp },
        };
        let frame = Frame {
            address: request.to,
            caller: request.from,
            value: request.value,
            is_static,
            depth: 0,
        };
        execute_call(&mut self.state, runtime, frame, &request.data)
    }
}

impl Vm for MemoryVm {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn code(&self, address: Address) -> Bytes {
        self.state.code(address)
    }

    fn balance(&self, address: Address) -> U256 {
        self.state.balance(address)
    }

    fn call(&mut self, request: &CallRequest) -> Result<Bytes, CallFailure> {
        let is_static = self.is_static();
        self.execute(request, is_static, true)
    }

    fn static_call(&mut self, request: &CallRequest) -> Result<Bytes, CallFailure> {
        self.execute(request, true, true)
    }

    fn broadcast(&mut self, request: &CallRequest) -> Result<Bytes, CallFailure> {
        self.ensure_mutable()?;
        let output = self.execute(request, false, false)?;
        let sender = self.state.account_mut(request.from);
        sender.nonce += 1;
        self.broadcasts.push(BroadcastRecord { request: request.clone(), output: output.clone() });
        Ok(output)
    }

    fn snapshot(&mut self) -> SnapshotId {
        let id = self.next_snapshot;
        self.next_snapshot += 1;
        self.snapshots.insert(id, self.state.clone());
        SnapshotId(id)
    }

    fn revert_to(&mut self, id: SnapshotId) -> bool {
        match self.snapshots.get(&id.0) {
            Some(snapshot) => {
                self.state = snapshot.clone();
                true
            }
            None => false,
        }
    }

    fn discard_snapshot(&mut self, id: SnapshotId) -> bool {
        self.snapshots.remove(&id.0).is_some()
    }

    fn route_harness(&mut self, harness: Address, account: Address, target: Address) {
        self.routes.insert(harness, HarnessRoute { account, target });
    }

    fn take_submissions(&mut self) -> Vec<Submission> {
        core::mem::take(&mut self.state.submissions)
    }

    fn enter_static(&mut self) {
        self.static_depth += 1;
    }

    fn exit_static(&mut self) {
        self.static_depth = self.static_depth.saturating_sub(1);
    }

    fn is_static(&self) -> bool {
        self.static_depth > 0
    }
}
