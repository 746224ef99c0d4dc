//! Tests for the broadcast strategies of the sender variants.

use alloy_primitives::{Address, Bytes, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use volley::{
    constants::MULTI_SEND_CALL_ONLY_ADDRESS,
    sender::{proposal_id, IGovernor, SafeOperation},
    test_utils::{
        cold_wallet, coordinator, dao, deployer, memory_vm, safe, ICounter, COLD_WALLET,
        COUNTER_BYTECODE, DEPLOYER, DEPLOYER_KEY, GOVERNOR, SAFE, TIMELOCK,
    },
    Coordinator, CoordinatorConfig, Event, MemoryVm, SenderError,
};

fn increment() -> Bytes {
    ICounter::incrementCall {}.abi_encode().into()
}

fn setup(senders: Vec<volley::SenderInitConfig>) -> (Coordinator<MemoryVm>, Address) {
    let mut coordinator = coordinator(senders);
    let counter = coordinator
        .create3("deployer", COUNTER_BYTECODE)
        .with_artifact("Counter")
        .deploy(&[])
        .unwrap();
    (coordinator, counter)
}

#[test]
fn test_hardware_wallet_replays_as_its_account() {
    let (mut coordinator, counter) = setup(vec![deployer(), cold_wallet()]);
    coordinator
        .broadcast_scope(|coordinator| -> Result<_, SenderError> {
            coordinator.call("cold", counter, increment(), U256::ZERO)?;
            Ok(())
        })
        .unwrap();

    let record = &coordinator.vm().broadcasts()[1];
    assert_eq!(record.request.from, COLD_WALLET);
    assert_eq!(record.request.to, counter);
    assert_eq!(coordinator.vm().nonce(COLD_WALLET), 1);
}

#[test]
fn test_safe_batches_multiple_calls_into_multisend() {
    let (mut coordinator, counter) = setup(vec![deployer(), safe()]);
    coordinator
        .broadcast_scope(|coordinator| -> Result<_, SenderError> {
            coordinator.call("safe", counter, increment(), U256::ZERO)?;
            coordinator.call("deployer", counter, increment(), U256::ZERO)?;
            coordinator.call("safe", counter, increment(), U256::ZERO)?;
            Ok(())
        })
        .unwrap();

    // the Safe's calls are not executed, only the deployer's
    let senders: Vec<_> =
        coordinator.vm().broadcasts().iter().map(|record| record.request.from).collect();
    assert_eq!(senders, [DEPLOYER, DEPLOYER]);

    let outcome = coordinator.last_broadcast().unwrap();
    assert_eq!(outcome.safe_batches.len(), 1);
    let batch = &outcome.safe_batches[0];
    assert_eq!(batch.safe, SAFE);
    assert_eq!(batch.proposer, DEPLOYER);
    assert_eq!(batch.to, MULTI_SEND_CALL_ONLY_ADDRESS);
    assert_eq!(batch.operation, SafeOperation::DelegateCall);
    assert_eq!(batch.nonce, U256::ZERO);

    let queue = coordinator.queue();
    assert_eq!(batch.transaction_ids, [queue[1].transaction_id, queue[3].transaction_id]);

    let signer = PrivateKeySigner::from_bytes(&DEPLOYER_KEY).unwrap();
    let expected = signer.sign_hash_sync(&batch.safe_tx_hash).unwrap();
    assert_eq!(batch.signature.as_deref().map(|b| &b[..]), Some(expected.as_bytes().as_slice()));

    assert!(coordinator.events().iter().any(|event| matches!(
        event,
        Event::SafeTransactionQueued { safe_tx_hash, .. } if *safe_tx_hash == batch.safe_tx_hash
    )));
}

#[test]
fn test_safe_single_call_uses_configured_nonce() {
    let (mut coordinator, counter) = setup(vec![deployer(), safe()]);
    coordinator.senders_mut().unwrap().set_safe_nonce("safe", U256::from(7)).unwrap();
    coordinator
        .broadcast_scope(|coordinator| -> Result<_, SenderError> {
            coordinator.call("safe", counter, increment(), U256::ZERO)?;
            Ok(())
        })
        .unwrap();

    let batch = &coordinator.last_broadcast().unwrap().safe_batches[0];
    assert_eq!(batch.to, counter);
    assert_eq!(batch.data, increment());
    assert_eq!(batch.operation, SafeOperation::Call);
    assert_eq!(batch.nonce, U256::from(7));
    assert_eq!(coordinator.sender("safe").unwrap().as_multisig().unwrap().nonce(), U256::from(8));
}

#[test]
fn test_safe_rejects_value() {
    let vm = memory_vm().with_balance(SAFE, U256::from(10));
    let mut coordinator = Coordinator::new(vm, CoordinatorConfig::new(vec![deployer(), safe()]));
    let err = coordinator
        .broadcast_scope(|coordinator| -> Result<_, SenderError> {
            coordinator.call("safe", Address::repeat_byte(0x55), Bytes::new(), U256::from(1))?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, SenderError::MultisigNonZeroValue { name, .. } if name == "safe"));
    assert!(coordinator.is_broadcasted());
}

#[test]
fn test_governor_submits_one_proposal() {
    let (mut coordinator, counter) = setup(vec![deployer(), cold_wallet(), dao()]);
    coordinator.set_proposal_description("dao", "Bump the counter").unwrap();
    assert_eq!(
        coordinator.set_proposal_description("dao", "again"),
        Err(SenderError::ProposalDescriptionAlreadySet("dao".to_string()))
    );

    let set_number = Bytes::from(ICounter::setNumberCall { newNumber: U256::from(9) }.abi_encode());
    coordinator
        .broadcast_scope(|coordinator| -> Result<_, SenderError> {
            coordinator.call("dao", counter, increment(), U256::ZERO)?;
            coordinator.call("dao", counter, set_number.clone(), U256::ZERO)?;
            Ok(())
        })
        .unwrap();

    let proposal = coordinator.last_broadcast().unwrap().proposals[0].clone();
    assert_eq!(proposal.governor, GOVERNOR);
    assert_eq!(proposal.proposer, COLD_WALLET);
    assert_eq!(proposal.targets, [counter, counter]);
    assert_eq!(proposal.calldatas, [increment(), set_number.clone()]);
    assert_eq!(
        proposal.proposal_id,
        proposal_id(
            &[counter, counter],
            &[U256::ZERO, U256::ZERO],
            &[increment(), set_number],
            "Bump the counter"
        )
    );

    let record = coordinator.vm().broadcasts().last().unwrap();
    assert_eq!(record.request.from, COLD_WALLET);
    assert_eq!(record.request.to, GOVERNOR);
    let call = IGovernor::proposeCall::abi_decode(&record.request.data, true).unwrap();
    assert_eq!(call.description, "Bump the counter");
    assert_eq!(call.targets, proposal.targets);

    // the timelock executed the calls during simulation
    assert_ne!(coordinator.sender("dao").unwrap().account(), GOVERNOR);
    assert_eq!(coordinator.sender("dao").unwrap().account(), TIMELOCK);
    assert!(coordinator.events().iter().any(|event| matches!(
        event,
        Event::GovernorProposalCreated { proposal_id, .. } if *proposal_id == proposal.proposal_id
    )));
}

#[test]
fn test_governor_requires_description() {
    let (mut coordinator, counter) = setup(vec![deployer(), cold_wallet(), dao()]);
    let err = coordinator
        .broadcast_scope(|coordinator| -> Result<_, SenderError> {
            coordinator.call("dao", counter, increment(), U256::ZERO)?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err, SenderError::ProposalDescriptionNotSet("dao".to_string()));
}

#[test]
fn test_description_needs_governor() {
    let mut coordinator = coordinator(vec![deployer()]);
    let err = coordinator.set_proposal_description("deployer", "nope").unwrap_err();
    assert!(matches!(err, SenderError::InvalidCast { expected: "governor", .. }));
}
