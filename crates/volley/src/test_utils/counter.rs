use alloy_primitives::{bytes, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolInterface, SolValue};

use crate::vm::{CallContext, CallFailure, Program};

sol! {
    /// A counter that remembers who incremented it last.
    interface ICounter {
        function number() external view returns (uint256);
        function lastCaller() external view returns (address);
        function increment() external;
        function setNumber(uint256 newNumber) external;
        function fail() external;
        function assertZero() external view;

        error CounterFailure(uint256 number);
    }
}

/// Creation bytecode the [`CounterProgram`] is bound to.
pub const COUNTER_BYTECODE: Bytes = bytes!("fe436f756e746572");

const NUMBER_SLOT: U256 = U256::ZERO;
const CALLER_SLOT: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Native implementation of [`ICounter`]. The optional constructor argument is the initial
/// number.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterProgram;

impl Program for CounterProgram {
    fn construct(&self, ctx: &mut CallContext<'_>, args: &[u8]) -> Result<(), CallFailure> {
        if args.is_empty() {
            return Ok(());
        }
        let initial = U256::abi_decode(args, true).map_err(|_| CallFailure::empty())?;
        ctx.sstore(NUMBER_SLOT, initial)
    }

    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, CallFailure> {
        let call = ICounter::ICounterCalls::abi_decode(input, true)
            .map_err(|_| CallFailure::revert("unknown selector"))?;
        let number = ctx.sload(NUMBER_SLOT);

        match call {
            ICounter::ICounterCalls::number(_) => Ok(number.abi_encode().into()),
            ICounter::ICounterCalls::lastCaller(_) => {
                let caller = Address::from_word(B256::from(ctx.sload(CALLER_SLOT).to_be_bytes::<32>()));
                Ok(caller.abi_encode().into())
            }
            ICounter::ICounterCalls::increment(_) => {
                let next =
                    number.checked_add(U256::from(1)).ok_or_else(|| CallFailure::panic(0x11))?;
                ctx.sstore(NUMBER_SLOT, next)?;
                let caller = U256::from_be_slice(ctx.caller().into_word().as_slice());
                ctx.sstore(CALLER_SLOT, caller)?;
                Ok(Bytes::new())
            }
            ICounter::ICounterCalls::setNumber(call) => {
                ctx.sstore(NUMBER_SLOT, call.newNumber)?;
                Ok(Bytes::new())
            }
            ICounter::ICounterCalls::fail(_) => {
                Err(CallFailure::from_error(&ICounter::CounterFailure { number }))
            }
            ICounter::ICounterCalls::assertZero(_) => {
                if number.is_zero() {
                    Ok(Bytes::new())
                } else {
                    Err(CallFailure::panic(0x01))
                }
            }
        }
    }
}
