//! Tests for harness routing and nested broadcast scopes.

use std::sync::Arc;

use alloy_primitives::{address, bytes, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use volley::{
    harness_address,
    test_utils::{
        cold_wallet, coordinator, deployer, memory_vm, ICounter, COLD_WALLET, COUNTER_BYTECODE,
        DEPLOYER,
    },
    vm::{CallContext, CallRequest, Program},
    CallFailure, Coordinator, CoordinatorConfig, DeployError, MemoryVm, SenderError, SenderId, Vm,
};

sol! {
    interface IRelay {
        function relay(address harness, bytes data) external returns (bytes);
    }
}

const RELAY_CODE: Bytes = bytes!("fe52656c6179");
const RELAY: Address = address!("00000000000000000000000000000000000e1a70");

/// Calls a harness with the given data and returns its raw output.
#[derive(Debug)]
struct RelayProgram;

impl Program for RelayProgram {
    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, CallFailure> {
        let call = IRelay::relayCall::abi_decode(input, true).map_err(|_| CallFailure::empty())?;
        ctx.call(call.harness, &call.data, U256::ZERO)
    }
}

fn relay(harness: Address, data: Vec<u8>) -> Bytes {
    IRelay::relayCall { harness, data: data.into() }.abi_encode().into()
}

fn relay_setup() -> (Coordinator<MemoryVm>, Address) {
    let vm = memory_vm().with_program(RELAY_CODE, Arc::new(RelayProgram)).with_code(RELAY, RELAY_CODE);
    let mut coordinator =
        Coordinator::new(vm, CoordinatorConfig::new(vec![deployer(), cold_wallet()]));
    let counter = coordinator
        .create3("deployer", COUNTER_BYTECODE)
        .with_artifact("Counter")
        .deploy(&[])
        .unwrap();
    (coordinator, counter)
}

fn setup() -> (Coordinator<MemoryVm>, Address) {
    let mut coordinator = coordinator(vec![deployer()]);
    let counter = coordinator
        .create3("deployer", COUNTER_BYTECODE)
        .with_artifact("Counter")
        .deploy(&[])
        .unwrap();
    (coordinator, counter)
}

fn decode_number(output: &[u8]) -> U256 {
    ICounter::numberCall::abi_decode_returns(output, true).unwrap()._0
}

#[test]
fn test_harness_address_is_deterministic() {
    let (mut coordinator, counter) = setup();
    let harness = coordinator.harness("deployer", counter).unwrap();
    let id = SenderId::from_name("deployer");

    assert_eq!(harness.sender(), id);
    assert_eq!(harness.target(), counter);
    assert_eq!(harness.address(), harness_address(id, counter));
    assert_eq!(coordinator.harness("deployer", counter).unwrap(), harness);
    assert_eq!(coordinator.senders().harness_route(harness.address()), Some((id, counter)));
    assert_ne!(harness_address(id, Address::repeat_byte(1)), harness.address());
}

#[test]
fn test_harness_queues_mutating_calls() {
    let (mut coordinator, counter) = setup();
    let harness = coordinator.harness("deployer", counter).unwrap();

    harness.call(&mut coordinator, ICounter::incrementCall {}.abi_encode()).unwrap();
    let output = harness.call(&mut coordinator, ICounter::lastCallerCall {}.abi_encode()).unwrap();

    assert_eq!(coordinator.queue().len(), 3);
    assert_eq!(coordinator.queue()[1].to, counter);
    assert_eq!(
        ICounter::lastCallerCall::abi_decode_returns(&output, true).unwrap()._0,
        DEPLOYER
    );
}

#[test]
fn test_harness_forwards_reads_in_static_frame() {
    let (mut coordinator, counter) = setup();
    let harness = coordinator.harness("deployer", counter).unwrap();
    harness.call(&mut coordinator, ICounter::incrementCall {}.abi_encode()).unwrap();
    let queued = coordinator.queue().len();

    let output =
        harness.static_call(&mut coordinator, ICounter::numberCall {}.abi_encode()).unwrap();
    assert_eq!(decode_number(&output), U256::from(1));
    assert_eq!(coordinator.queue().len(), queued);
    assert!(!volley::Vm::is_static(coordinator.vm()));
}

#[test]
fn test_harness_keeps_target_failures() {
    let (mut coordinator, counter) = setup();
    let harness = coordinator.harness("deployer", counter).unwrap();
    let expected = CallFailure::from_error(&ICounter::CounterFailure { number: U256::ZERO });

    let err = harness.call(&mut coordinator, ICounter::failCall {}.abi_encode()).unwrap_err();
    assert_eq!(err, SenderError::Reverted(expected.clone()));

    // a read that fails in a static frame keeps its payload too
    let err = harness.static_call(&mut coordinator, ICounter::failCall {}.abi_encode()).unwrap_err();
    assert_eq!(err, SenderError::Reverted(expected));
}

#[test]
fn test_harness_write_in_static_frame_fails_empty() {
    let (mut coordinator, counter) = setup();
    let harness = coordinator.harness("deployer", counter).unwrap();
    let err =
        harness.static_call(&mut coordinator, ICounter::incrementCall {}.abi_encode()).unwrap_err();
    assert!(err.failure().unwrap().is_empty());
    assert_eq!(coordinator.queue().len(), 1);
}

#[test]
fn test_nested_scopes_broadcast_once() {
    let (mut coordinator, counter) = setup();
    let increment = Bytes::from(ICounter::incrementCall {}.abi_encode());

    coordinator
        .broadcast_scope(|outer| -> Result<_, SenderError> {
            outer.call("deployer", counter, increment.clone(), U256::ZERO)?;
            outer.broadcast_scope(|inner| -> Result<_, SenderError> {
                assert_eq!(inner.broadcast_depth(), 2);
                inner.call("deployer", counter, increment.clone(), U256::ZERO)?;
                Ok(())
            })?;
            assert!(!outer.is_broadcasted());
            assert_eq!(outer.broadcast_depth(), 1);
            outer.call("deployer", counter, increment.clone(), U256::ZERO)?;
            Ok(())
        })
        .unwrap();

    assert_eq!(coordinator.broadcast_depth(), 0);
    assert!(coordinator.is_broadcasted());
    assert_eq!(coordinator.vm().broadcasts().len(), 4);
}

#[test]
fn test_failing_scope_restores_depth_without_broadcast() {
    let (mut coordinator, counter) = setup();
    let err = coordinator
        .broadcast_scope(|outer| -> Result<(), SenderError> {
            outer.broadcast_scope(|inner| -> Result<(), SenderError> {
                inner.call("deployer", counter, ICounter::failCall {}.abi_encode(), U256::ZERO)?;
                Ok(())
            })
        })
        .unwrap_err();

    assert!(err.failure().is_some());
    assert_eq!(coordinator.broadcast_depth(), 0);
    assert!(!coordinator.is_broadcasted());
    assert!(coordinator.vm().broadcasts().is_empty());
}

#[test]
fn test_second_scope_cannot_broadcast_again() {
    let (mut coordinator, _) = setup();
    coordinator.broadcast_scope(|_| -> Result<_, SenderError> { Ok(()) }).unwrap();
    assert_eq!(
        coordinator.broadcast_scope(|_| -> Result<_, SenderError> { Ok(()) }),
        Err(SenderError::BroadcastAlreadyCalled)
    );
}

#[test]
fn test_contract_submits_through_harness_during_simulation() {
    let (mut coordinator, counter) = relay_setup();
    let cold = SenderId::from_name("cold");

    coordinator
        .broadcast_scope(|coordinator| -> Result<_, DeployError> {
            let harness = coordinator.harness("cold", counter)?;
            let outer = coordinator.call(
                "deployer",
                RELAY,
                relay(harness.address(), ICounter::incrementCall {}.abi_encode()),
                U256::ZERO,
            )?;

            // the nested submission completes first and is queued ahead of the relay call
            let queue = coordinator.queue();
            assert_eq!(queue.len(), 3);
            assert_eq!(queue[1].sender_id, cold);
            assert_eq!(queue[1].to, counter);
            assert_eq!(queue[2].transaction_id, outer.transaction_id);

            let request =
                CallRequest::new(DEPLOYER, counter, ICounter::lastCallerCall {}.abi_encode());
            let output = coordinator.vm_mut().static_call(&request).unwrap();
            let caller = ICounter::lastCallerCall::abi_decode_returns(&output, true).unwrap()._0;
            assert_eq!(caller, COLD_WALLET);
            Ok(())
        })
        .unwrap();

    let nested = coordinator.queue()[1].transaction_id;
    assert_eq!(coordinator.sender("cold").unwrap().transactions(), [nested].as_slice());

    let records = coordinator.vm().broadcasts();
    let senders: Vec<_> = records.iter().map(|record| record.request.from).collect();
    assert_eq!(senders, [DEPLOYER, COLD_WALLET, DEPLOYER]);
    assert_eq!(records[1].request.to, counter);
    assert_eq!(records[2].request.to, RELAY);

    let request = CallRequest::new(DEPLOYER, counter, ICounter::numberCall {}.abi_encode());
    let output = coordinator.vm_mut().static_call(&request).unwrap();
    assert_eq!(decode_number(&output), U256::from(1));
}

#[test]
fn test_failing_nested_submission_fails_the_outer_call() {
    let (mut coordinator, counter) = relay_setup();
    let harness = coordinator.harness("cold", counter).unwrap();
    let expected = CallFailure::from_error(&ICounter::CounterFailure { number: U256::ZERO });

    let err = coordinator
        .call("deployer", RELAY, relay(harness.address(), ICounter::failCall {}.abi_encode()), U256::ZERO)
        .unwrap_err();
    assert_eq!(err, SenderError::Reverted(expected));
    assert_eq!(coordinator.queue().len(), 1);
    assert!(coordinator.sender("cold").unwrap().transactions().is_empty());
}
