//! Well-known addresses and bytecode shared by the deployer and the execution backend.

use alloy_primitives::{address, bytes, Address, Bytes};

/// Address of the CreateX factory used for CREATE2/CREATE3 deployments.
pub const CREATEX_ADDRESS: Address = address!("ba5Ed099633D3B313e4D5F7bdc1305d3c28ba5Ed");

/// Creation code of the minimal proxy that CreateX deploys with CREATE2 before issuing the
/// CREATE of a CREATE3 deployment. The proxy forwards its calldata as init code.
pub const CREATE3_PROXY_BYTECODE: Bytes = bytes!("67363d3d37363d34f03d5260086018f3");

/// Address of the Safe `MultiSendCallOnly` contract (v1.3.0), used to batch multisig calls.
pub const MULTI_SEND_CALL_ONLY_ADDRESS: Address =
    address!("40A2aCCbd92BCA938b02010E17A5b8929b49130D");

/// Flag byte selecting the sender-bound salt derivation.
pub const SALT_FLAG_SENDER_BOUND: u8 = 0x00;

/// Flag byte selecting the sender-and-chain-bound salt derivation.
pub const SALT_FLAG_CHAIN_BOUND: u8 = 0x01;

/// Default chain id of the in-memory backend.
pub const DEFAULT_CHAIN_ID: u64 = 31337;

/// Default block timestamp of the in-memory backend.
pub const DEFAULT_TIMESTAMP: u64 = 1;

/// Default namespace of a registry.
pub const DEFAULT_NAMESPACE: &str = "default";
