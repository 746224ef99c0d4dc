use std::sync::Arc;

use alloy_primitives::{address, b256, Address, B256};

use super::{CounterProgram, COUNTER_BYTECODE};
use crate::{
    coordinator::{Coordinator, CoordinatorConfig},
    sender::SenderInitConfig,
    vm::MemoryVm,
};

/// First well-known development key.
pub const DEPLOYER_KEY: B256 =
    b256!("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");

/// Second well-known development key.
pub const OPERATOR_KEY: B256 =
    b256!("59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d");

/// Account of [`DEPLOYER_KEY`].
pub const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// Account of [`OPERATOR_KEY`].
pub const OPERATOR: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

/// Account held on a hardware wallet.
pub const COLD_WALLET: Address = address!("00000000000000000000000000000000000c01d0");

/// A Safe.
pub const SAFE: Address = address!("0000000000000000000000000000000000005afe");

/// A Governor.
pub const GOVERNOR: Address = address!("00000000000000000000000000000000000060e7");

/// The Governor's timelock.
pub const TIMELOCK: Address = address!("0000000000000000000000000000000000071e10");

/// Derivation path used by hardware wallet fixtures.
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// In-memory backend with the counter program registered.
pub fn memory_vm() -> MemoryVm {
    MemoryVm::default().with_program(COUNTER_BYTECODE, Arc::new(CounterProgram))
}

/// Private key sender `deployer`.
pub fn deployer() -> SenderInitConfig {
    SenderInitConfig::private_key("deployer", DEPLOYER_KEY).unwrap()
}

/// Private key sender `operator`.
pub fn operator() -> SenderInitConfig {
    SenderInitConfig::private_key("operator", OPERATOR_KEY).unwrap()
}

/// Ledger sender `cold`.
pub fn cold_wallet() -> SenderInitConfig {
    SenderInitConfig::ledger("cold", COLD_WALLET, DERIVATION_PATH)
}

/// Safe sender `safe` proposed to by `deployer`.
pub fn safe() -> SenderInitConfig {
    SenderInitConfig::safe("safe", SAFE, "deployer")
}

/// Governor sender `dao` behind a timelock, proposed to by `cold`.
pub fn dao() -> SenderInitConfig {
    SenderInitConfig::governor("dao", GOVERNOR, TIMELOCK, "cold")
}

/// Custom sender `relayer`.
pub fn relayer() -> SenderInitConfig {
    SenderInitConfig::custom("relayer", Address::repeat_byte(0x42))
}

/// Every fixture sender.
pub fn all_senders() -> Vec<SenderInitConfig> {
    vec![deployer(), operator(), cold_wallet(), safe(), dao(), relayer()]
}

/// A coordinator over [`memory_vm`] for `senders`.
pub fn coordinator(senders: Vec<SenderInitConfig>) -> Coordinator<MemoryVm> {
    Coordinator::new(memory_vm(), CoordinatorConfig::new(senders))
}
