//! Deterministic salt derivation and CREATE2/CREATE3 address prediction.
//!
//! A sender salt packs the sender's account, a flag byte and a truncated entropy hash:
//!
//! ```text
//! | account (20 bytes) | flag (1 byte) | keccak256(entropy)[0..11] |
//! ```
//!
//! The factory does not use this salt directly. It first "guards" it with
//! [`derive_salt`], binding it to the calling account (and optionally the chain id) when the
//! embedded account matches the caller. Predictions and the factory share these functions so
//! they agree bit-for-bit.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;

use crate::constants::{
    CREATE3_PROXY_BYTECODE, CREATEX_ADDRESS, SALT_FLAG_CHAIN_BOUND, SALT_FLAG_SENDER_BOUND,
};

/// Builds the sender-scoped salt for `entropy`.
pub fn sender_salt(account: Address, entropy: &str) -> B256 {
    let entropy_hash = keccak256(entropy.as_bytes());
    let mut salt = [0u8; 32];
    salt[..20].copy_from_slice(account.as_slice());
    salt[20] = SALT_FLAG_SENDER_BOUND;
    salt[21..].copy_from_slice(&entropy_hash[..11]);
    B256::from(salt)
}

/// Returns the account embedded in the first 20 bytes of `salt`.
pub fn salt_account(salt: B256) -> Address {
    Address::from_slice(&salt[..20])
}

/// Returns the flag byte of `salt`.
pub const fn salt_flag(salt: B256) -> u8 {
    salt.0[20]
}

/// Derives the salt the factory actually deploys with.
///
/// - embedded account is `caller`, flag `0x00`: `keccak256(caller as bytes32 ++ salt)`
/// - embedded account is `caller`, flag `0x01`: `keccak256(abi.encode(caller, chainId, salt))`
/// - anything else: `keccak256(abi.encode(salt))`
pub fn derive_salt(caller: Address, chain_id: u64, salt: B256) -> B256 {
    if salt_account(salt) == caller {
        match salt_flag(salt) {
            SALT_FLAG_SENDER_BOUND => {
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(caller.into_word().as_slice());
                buf[32..].copy_from_slice(salt.as_slice());
                return keccak256(buf);
            }
            SALT_FLAG_CHAIN_BOUND => {
                return keccak256((caller, U256::from(chain_id), salt).abi_encode_params());
            }
            _ => {}
        }
    }
    keccak256(salt.abi_encode())
}

/// Concatenates creation bytecode and ABI-encoded constructor arguments.
pub fn init_code(bytecode: &[u8], constructor_args: &[u8]) -> Vec<u8> {
    let mut code = Vec::with_capacity(bytecode.len() + constructor_args.len());
    code.extend_from_slice(bytecode);
    code.extend_from_slice(constructor_args);
    code
}

/// Address produced by a CREATE2 from `deployer` with an already-derived salt.
pub fn create2_address(deployer: Address, derived_salt: B256, init_code: &[u8]) -> Address {
    deployer.create2(derived_salt, keccak256(init_code))
}

/// Address of the CREATE3 proxy deployed by `deployer` for a derived salt.
pub fn create3_proxy_address(deployer: Address, derived_salt: B256) -> Address {
    deployer.create2(derived_salt, keccak256(&CREATE3_PROXY_BYTECODE))
}

/// Address produced by a CREATE3 from `deployer` with an already-derived salt.
///
/// The proxy is a fresh contract, so its first CREATE uses nonce 1.
pub fn create3_address(deployer: Address, derived_salt: B256) -> Address {
    create3_proxy_address(deployer, derived_salt).create(1)
}

/// Predicts the CREATE2 address the factory yields for `caller` submitting `salt`.
pub fn predict_create2(caller: Address, chain_id: u64, salt: B256, init_code: &[u8]) -> Address {
    create2_address(CREATEX_ADDRESS, derive_salt(caller, chain_id, salt), init_code)
}

/// Predicts the CREATE3 address the factory yields for `caller` submitting `salt`.
pub fn predict_create3(caller: Address, chain_id: u64, salt: B256) -> Address {
    create3_address(CREATEX_ADDRESS, derive_salt(caller, chain_id, salt))
}
