//! Tests for deterministic deployments through the CreateX factory.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, SolValue};
use rstest::rstest;
use volley::{
    constants::CREATEX_ADDRESS,
    salt::{predict_create3, sender_salt},
    test_utils::{coordinator, deployer, memory_vm, operator, ICounter, COUNTER_BYTECODE, DEPLOYER},
    vm::CallRequest,
    CoordinatorConfig, Coordinator, DeployError, DeployStrategy, Event, MemoryVm, SenderError, Vm,
};

fn number(vm: &mut MemoryVm, counter: Address) -> U256 {
    let request = CallRequest::new(DEPLOYER, counter, ICounter::numberCall {}.abi_encode());
    let output = vm.static_call(&request).unwrap();
    ICounter::numberCall::abi_decode_returns(&output, true).unwrap()._0
}

fn deployed(coordinator: &Coordinator<MemoryVm>) -> usize {
    coordinator.events().iter().filter(|event| matches!(event, Event::ContractDeployed { .. })).count()
}

#[test]
fn test_counter_deploys_and_replays_deterministically() {
    let mut coordinator = coordinator(vec![deployer()]);
    let counter = coordinator
        .broadcast_scope(|coordinator| -> Result<_, DeployError> {
            let counter =
                coordinator.create3("deployer", COUNTER_BYTECODE).with_artifact("Counter").deploy(&[])?;
            coordinator.call("deployer", counter, ICounter::incrementCall {}.abi_encode(), U256::ZERO)?;
            assert_eq!(number(coordinator.vm_mut(), counter), U256::from(1));
            Ok(counter)
        })
        .unwrap();

    let salt = sender_salt(DEPLOYER, "default/Counter");
    assert_eq!(counter, predict_create3(DEPLOYER, 31337, salt));
    assert_eq!(number(coordinator.vm_mut(), counter), U256::from(1));

    let records = coordinator.vm_mut().take_broadcasts();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].request.to, CREATEX_ADDRESS);
    assert_eq!(Address::abi_decode(&records[0].output, true).unwrap(), counter);

    // the broadcast log rebuilds the same state on a fresh chain
    let mut fresh = memory_vm();
    fresh.replay(&records).unwrap();
    assert_eq!(fresh.code(counter), COUNTER_BYTECODE);
    assert_eq!(number(&mut fresh, counter), U256::from(1));
}

#[test]
fn test_deployed_event_carries_details() {
    let mut coordinator = coordinator(vec![deployer()]);
    let counter = coordinator
        .create2("deployer", COUNTER_BYTECODE)
        .with_artifact("Counter")
        .with_label("v1")
        .unwrap()
        .deploy(&U256::from(5).abi_encode())
        .unwrap();
    assert_eq!(number(coordinator.vm_mut(), counter), U256::from(5));

    let Some(Event::ContractDeployed { deployer, location, transaction_id, deployment }) =
        coordinator.events().last()
    else {
        panic!("expected a deployment event");
    };
    assert_eq!(*deployer, DEPLOYER);
    assert_eq!(*location, counter);
    assert_eq!(*transaction_id, coordinator.queue()[0].transaction_id);
    assert_eq!(deployment.entropy, "default/Counter:v1");
    assert_eq!(deployment.label.as_deref(), Some("v1"));
    assert_eq!(deployment.create_strategy, "CREATE2");
    assert_eq!(deployment.salt, sender_salt(DEPLOYER, "default/Counter:v1"));
    assert_eq!(coordinator.queue()[0].label.as_deref(), Some("CREATE2 default/Counter:v1"));
}

#[test]
fn test_redeploy_is_reported_as_collision() {
    let mut coordinator = coordinator(vec![deployer()]);
    let first =
        coordinator.create3("deployer", COUNTER_BYTECODE).with_artifact("Counter").deploy(&[]).unwrap();
    let second =
        coordinator.create3("deployer", COUNTER_BYTECODE).with_artifact("Counter").deploy(&[]).unwrap();

    assert_eq!(first, second);
    assert_eq!(deployed(&coordinator), 1);
    assert_eq!(coordinator.queue().len(), 1);
    assert!(matches!(
        coordinator.events().last(),
        Some(Event::DeploymentCollision { existing_contract, .. }) if *existing_contract == first
    ));
}

#[test]
fn test_labels_select_distinct_addresses() {
    let mut coordinator = coordinator(vec![deployer()]);
    let mut deploy = |label: &str| {
        coordinator
            .create3("deployer", COUNTER_BYTECODE)
            .with_artifact("Counter")
            .with_label(label)
            .unwrap()
            .deploy(&[])
            .unwrap()
    };
    let v1 = deploy("v1");
    let v2 = deploy("v2");
    let v1_again = deploy("v1");

    assert_ne!(v1, v2);
    assert_eq!(v1, v1_again);
    assert_eq!(deployed(&coordinator), 2);
}

#[rstest]
#[case::create2(DeployStrategy::Create2, false)]
#[case::create3(DeployStrategy::Create3, true)]
fn test_constructor_args_and_address(#[case] strategy: DeployStrategy, #[case] same: bool) {
    let mut coordinator = coordinator(vec![deployer()]);
    let mut predict = |args: U256| {
        let deployment = match strategy {
            DeployStrategy::Create2 => coordinator.create2("deployer", COUNTER_BYTECODE),
            DeployStrategy::Create3 => coordinator.create3("deployer", COUNTER_BYTECODE),
        };
        deployment.with_artifact("Counter").predict(&args.abi_encode()).unwrap()
    };
    let one = predict(U256::from(1));
    let two = predict(U256::from(2));
    assert_eq!(one == two, same);
}

#[test]
fn test_address_is_scoped_to_namespace_and_sender() {
    let predict = |namespace: &str, sender: &str| {
        let mut coordinator = Coordinator::new(
            memory_vm(),
            CoordinatorConfig::new(vec![deployer(), operator()]).with_namespace(namespace),
        );
        coordinator.create3(sender, COUNTER_BYTECODE).with_artifact("Counter").predict(&[]).unwrap()
    };

    let base = predict("default", "deployer");
    assert_eq!(base, predict("default", "deployer"));
    assert_ne!(base, predict("staging", "deployer"));
    assert_ne!(base, predict("default", "operator"));
}

#[test]
fn test_custom_entropy() {
    let mut coordinator = coordinator(vec![deployer()]);
    let mut deployment =
        coordinator.create3("deployer", COUNTER_BYTECODE).with_entropy("my-entropy").unwrap();
    assert_eq!(deployment.entropy().unwrap(), "my-entropy");
    assert_eq!(deployment.salt().unwrap(), sender_salt(DEPLOYER, "my-entropy"));
    let address = deployment.deploy(&[]).unwrap();
    assert_eq!(address, predict_create3(DEPLOYER, 31337, sender_salt(DEPLOYER, "my-entropy")));
}

#[test]
fn test_label_and_entropy_conflict() {
    let mut coordinator = coordinator(vec![deployer()]);
    let err = coordinator
        .create3("deployer", COUNTER_BYTECODE)
        .with_label("v1")
        .unwrap()
        .with_entropy("x")
        .unwrap_err();
    assert_eq!(err, DeployError::LabelEntropyConflict);

    let err = coordinator
        .create3("deployer", COUNTER_BYTECODE)
        .with_entropy("x")
        .unwrap()
        .with_label("v1")
        .unwrap_err();
    assert_eq!(err, DeployError::LabelEntropyConflict);
}

#[test]
fn test_missing_artifact_and_bytecode() {
    let mut coordinator = coordinator(vec![deployer()]);
    assert_eq!(
        coordinator.create3("deployer", COUNTER_BYTECODE).deploy(&[]),
        Err(DeployError::MissingArtifact)
    );
    assert_eq!(
        coordinator.create2("deployer", Vec::<u8>::new()).with_artifact("Empty").deploy(&[]),
        Err(DeployError::EmptyBytecode("Empty".to_string()))
    );
    assert_eq!(
        coordinator.create3("ghost", COUNTER_BYTECODE).with_artifact("Counter").deploy(&[]),
        Err(DeployError::Sender(SenderError::SenderNotInitialized("ghost".to_string())))
    );
    assert!(coordinator.queue().is_empty());
}

#[test]
fn test_failing_constructor_surfaces_factory_error() {
    let mut coordinator = coordinator(vec![deployer()]);
    // not a valid uint256 argument
    let err = coordinator
        .create2("deployer", COUNTER_BYTECODE)
        .with_artifact("Counter")
        .deploy(&[0x01])
        .unwrap_err();
    let DeployError::Sender(err) = err else { panic!("expected a sender error") };
    let failure = err.failure().unwrap();
    assert!(!failure.is_empty());
    assert!(coordinator.queue().is_empty());
}
