//! A CreateX compatible factory for the in-memory backend.
//!
//! Only the entry points used for deterministic deployments are provided. Salts are guarded
//! with [`derive_salt`] before use, so a deployment submitted by an account through the
//! factory lands exactly where [`crate::salt::predict_create2`] and
//! [`crate::salt::predict_create3`] say it will.

use alloy_primitives::{bytes, Address, Bytes, U256};
use alloy_sol_types::{sol, SolInterface, SolValue};

use super::{CallContext, CallFailure, Program};
use crate::{
    constants::CREATE3_PROXY_BYTECODE,
    salt::{create3_address, derive_salt},
};

sol! {
    /// Deterministic deployment entry points of the CreateX factory.
    interface ICreateX {
        function deployCreate2(bytes32 salt, bytes initCode) external payable returns (address newContract);
        function deployCreate3(bytes32 salt, bytes initCode) external payable returns (address newContract);
        function computeCreate2Address(bytes32 salt, bytes32 initCodeHash) external view returns (address computedAddress);
        function computeCreate3Address(bytes32 salt) external view returns (address computedAddress);

        error FailedContractCreation(address emitter);
        error FailedContractInitialisation(address emitter, bytes revertData);
    }
}

/// Code placed at the factory address. It is never interpreted, it only selects
/// [`CreateXProgram`].
pub const CREATEX_CODE: Bytes = bytes!("fe437265617465580000");

/// The factory program.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateXProgram;

impl Program for CreateXProgram {
    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, CallFailure> {
        let call = ICreateX::ICreateXCalls::abi_decode(input, true)
            .map_err(|_| CallFailure::empty())?;
        let emitter = ctx.address();

        let address = match call {
            ICreateX::ICreateXCalls::deployCreate2(call) => {
                let salt = derive_salt(ctx.caller(), ctx.chain_id(), call.salt);
                let value = ctx.value();
                let address = ctx
                    .create2(salt, &call.initCode, value)
                    .map_err(|_| failed_creation(emitter))?;
                if ctx.code(address).is_empty() {
                    return Err(failed_creation(emitter));
                }
                address
            }
            ICreateX::ICreateXCalls::deployCreate3(call) => {
                let salt = derive_salt(ctx.caller(), ctx.chain_id(), call.salt);
                let proxy = ctx
                    .create2(salt, &CREATE3_PROXY_BYTECODE, U256::ZERO)
                    .map_err(|_| failed_creation(emitter))?;
                let value = ctx.value();
                let output = ctx.call(proxy, &call.initCode, value).map_err(|failure| {
                    failed_initialisation(emitter, failure.into_output())
                })?;
                let address = create3_address(emitter, salt);
                if ctx.code(address).is_empty() {
                    return Err(failed_initialisation(emitter, output));
                }
                address
            }
            ICreateX::ICreateXCalls::computeCreate2Address(call) => {
                emitter.create2(call.salt, call.initCodeHash)
            }
            ICreateX::ICreateXCalls::computeCreate3Address(call) => {
                create3_address(emitter, call.salt)
            }
        };
        Ok(address.abi_encode().into())
    }
}

fn failed_creation(emitter: Address) -> CallFailure {
    CallFailure::from_error(&ICreateX::FailedContractCreation { emitter })
}

fn failed_initialisation(emitter: Address, revert_data: Bytes) -> CallFailure {
    CallFailure::from_error(&ICreateX::FailedContractInitialisation {
        emitter,
        revertData: revert_data,
    })
}

/// The CREATE3 proxy: deploys its calldata as init code with CREATE.
#[derive(Debug, Clone, Copy, Default)]
pub struct Create3ProxyProgram;

impl Program for Create3ProxyProgram {
    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, CallFailure> {
        let value = ctx.value();
        ctx.create(input, value)?;
        Ok(Bytes::new())
    }
}
