//! Safe multisig sender.
//!
//! Transactions queued for a Safe are not executed by this process. They are folded into a
//! single Safe transaction (a direct call for one entry, a `MultiSendCallOnly` delegatecall for
//! several) whose EIP-712 hash identifies the batch. The proposer signs that hash when it
//! holds its key in memory, and the batch is handed to the caller for submission to the
//! Safe's signers.

use alloy_primitives::{map::HashMap, Address, Bytes, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolCall, SolStruct, SolValue};
use serde::{Deserialize, Serialize};

use super::{check_proposer, SenderInitConfig};
use crate::{
    constants::MULTI_SEND_CALL_ONLY_ADDRESS,
    error::{SenderError, SenderResult},
    types::{SenderId, SimulatedTransaction, TransactionId},
};

sol! {
    /// The EIP-712 message a Safe owner signs.
    #[derive(Debug, PartialEq, Eq)]
    struct SafeTx {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 safeTxGas;
        uint256 baseGas;
        uint256 gasPrice;
        address gasToken;
        address refundReceiver;
        uint256 nonce;
    }

    /// Batching helper the Safe delegatecalls into.
    interface IMultiSend {
        function multiSend(bytes transactions) external payable;
    }
}

/// How a Safe executes its transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum SafeOperation {
    /// Plain call.
    Call = 0,
    /// Delegatecall.
    DelegateCall = 1,
}

/// A Safe transaction ready to be collected by the Safe's signers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeBatch {
    /// The Safe.
    pub safe: Address,
    /// Account of the proposer.
    pub proposer: Address,
    /// EIP-712 hash of the Safe transaction.
    pub safe_tx_hash: B256,
    /// Target of the Safe transaction.
    pub to: Address,
    /// Value of the Safe transaction. Always zero.
    pub value: U256,
    /// Calldata of the Safe transaction.
    pub data: Bytes,
    /// Call or delegatecall.
    pub operation: SafeOperation,
    /// Safe nonce the transaction was built for.
    pub nonce: U256,
    /// Proposer signature over `safe_tx_hash`, if the proposer could sign in process.
    pub signature: Option<Bytes>,
    /// Batched transactions, in queue order.
    pub transaction_ids: Vec<TransactionId>,
}

/// A Safe whose batches are proposed by another sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigSender {
    proposer: String,
    nonce: U256,
}

impl MultisigSender {
    /// Decodes `abi.encode(string proposer)` and checks that the proposer is a key based
    /// sender.
    pub(crate) fn initialize(
        config: &SenderInitConfig,
        configs: &HashMap<SenderId, &SenderInitConfig>,
    ) -> SenderResult<Self> {
        let invalid = |reason: String| SenderError::InvalidMultisigConfig {
            name: config.name.clone(),
            reason,
        };

        let proposer = String::abi_decode(&config.config, true)
            .map_err(|_| invalid("malformed proposer name".to_string()))?;
        check_proposer(&proposer, configs).map_err(invalid)?;
        Ok(Self { proposer, nonce: U256::ZERO })
    }

    /// Name of the proposing sender.
    pub fn proposer(&self) -> &str {
        &self.proposer
    }

    /// Nonce the next batch is built for.
    pub const fn nonce(&self) -> U256 {
        self.nonce
    }

    /// Sets the nonce the next batch is built for, usually the Safe's on-chain nonce.
    pub fn set_nonce(&mut self, nonce: U256) {
        self.nonce = nonce;
    }

    /// Folds `transactions` into one Safe transaction and advances the nonce.
    pub(crate) fn build_batch(
        &mut self,
        name: &str,
        safe: Address,
        proposer: Address,
        chain_id: u64,
        transactions: &[&SimulatedTransaction],
    ) -> SenderResult<SafeBatch> {
        if let Some(tx) = transactions.iter().find(|tx| !tx.value.is_zero()) {
            return Err(SenderError::MultisigNonZeroValue {
                name: name.to_string(),
                transaction_id: tx.transaction_id,
            });
        }

        let (to, data, operation) = match transactions {
            [] => return Err(SenderError::EmptyTransactionArray),
            [single] => (single.to, single.data.clone(), SafeOperation::Call),
            batch => {
                let call = IMultiSend::multiSendCall { transactions: encode_multi_send(batch) };
                (MULTI_SEND_CALL_ONLY_ADDRESS, call.abi_encode().into(), SafeOperation::DelegateCall)
            }
        };

        let safe_tx = SafeTx {
            to,
            value: U256::ZERO,
            data: data.clone(),
            operation: operation as u8,
            safeTxGas: U256::ZERO,
            baseGas: U256::ZERO,
            gasPrice: U256::ZERO,
            gasToken: Address::ZERO,
            refundReceiver: Address::ZERO,
            nonce: self.nonce,
        };
        let safe_tx_hash = safe_tx.eip712_signing_hash(&safe_domain(chain_id, safe));

        let batch = SafeBatch {
            safe,
            proposer,
            safe_tx_hash,
            to,
            value: U256::ZERO,
            data,
            operation,
            nonce: self.nonce,
            signature: None,
            transaction_ids: transactions.iter().map(|tx| tx.transaction_id).collect(),
        };
        self.nonce += U256::from(1);
        Ok(batch)
    }
}

/// EIP-712 domain of a Safe: chain id and the Safe address.
pub fn safe_domain(chain_id: u64, safe: Address) -> Eip712Domain {
    Eip712Domain::new(None, None, Some(U256::from(chain_id)), Some(safe), None)
}

/// Packs calls as `MultiSend` expects: `operation (1) | to (20) | value (32) | length (32) |
/// data` per call.
fn encode_multi_send(transactions: &[&SimulatedTransaction]) -> Bytes {
    let mut encoded = Vec::new();
    for tx in transactions {
        encoded.push(SafeOperation::Call as u8);
        encoded.extend_from_slice(tx.to.as_slice());
        encoded.extend_from_slice(&tx.value.to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(tx.data.len()).to_be_bytes::<32>());
        encoded.extend_from_slice(&tx.data);
    }
    encoded.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use alloy_primitives::{address, bytes, keccak256};

    const SAFE: Address = address!("0000000000000000000000000000000000005afe");
    const TARGET: Address = address!("00000000000000000000000000000000000000aa");

    fn simulated(counter: u64, value: U256, data: Bytes) -> SimulatedTransaction {
        SimulatedTransaction {
            transaction_id: TransactionId::derive(1, 1, counter),
            sender_id: SenderId::from_name("safe"),
            transaction: Transaction::new(TARGET, data).with_value(value),
            return_data: Bytes::new(),
            broadcast_return_data: None,
        }
    }

    fn multisig() -> MultisigSender {
        MultisigSender { proposer: "deployer".to_string(), nonce: U256::ZERO }
    }

    #[test]
    fn test_single_transaction_is_a_direct_call() {
        let tx = simulated(1, U256::ZERO, bytes!("d09de08a"));
        let batch = multisig().build_batch("safe", SAFE, Address::ZERO, 1, &[&tx]).unwrap();
        assert_eq!(batch.to, TARGET);
        assert_eq!(batch.data, bytes!("d09de08a"));
        assert_eq!(batch.operation, SafeOperation::Call);
        assert_eq!(batch.transaction_ids, vec![tx.transaction_id]);
    }

    #[test]
    fn test_several_transactions_use_multi_send() {
        let first = simulated(1, U256::ZERO, bytes!("01"));
        let second = simulated(2, U256::ZERO, bytes!("0203"));
        let batch =
            multisig().build_batch("safe", SAFE, Address::ZERO, 1, &[&first, &second]).unwrap();
        assert_eq!(batch.to, MULTI_SEND_CALL_ONLY_ADDRESS);
        assert_eq!(batch.operation, SafeOperation::DelegateCall);

        let call = IMultiSend::multiSendCall::abi_decode(&batch.data, true).unwrap();
        // two packed entries of 85 bytes header plus their data
        assert_eq!(call.transactions.len(), 85 + 1 + 85 + 2);
        assert_eq!(&call.transactions[1..21], TARGET.as_slice());
    }

    #[test]
    fn test_nonce_advances_and_changes_hash() {
        let tx = simulated(1, U256::ZERO, bytes!("01"));
        let mut sender = multisig();
        let first = sender.build_batch("safe", SAFE, Address::ZERO, 1, &[&tx]).unwrap();
        let second = sender.build_batch("safe", SAFE, Address::ZERO, 1, &[&tx]).unwrap();
        assert_eq!(first.nonce, U256::ZERO);
        assert_eq!(second.nonce, U256::from(1));
        assert_ne!(first.safe_tx_hash, second.safe_tx_hash);
        assert_eq!(sender.nonce(), U256::from(2));
    }

    #[test]
    fn test_safe_tx_hash_matches_eip712_layout() {
        let tx = simulated(1, U256::ZERO, bytes!("01"));
        let batch = multisig().build_batch("safe", SAFE, Address::ZERO, 1, &[&tx]).unwrap();

        let domain_separator = keccak256(
            (
                keccak256("EIP712Domain(uint256 chainId,address verifyingContract)"),
                U256::from(1),
                SAFE,
            )
                .abi_encode_params(),
        );
        let struct_hash = keccak256(
            (
                keccak256(
                    "SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,\
                     uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,\
                     uint256 nonce)",
                ),
                TARGET,
                U256::ZERO,
                keccak256([0x01u8]),
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                Address::ZERO,
                Address::ZERO,
                U256::ZERO,
            )
                .abi_encode_params(),
        );
        let mut digest = vec![0x19, 0x01];
        digest.extend_from_slice(domain_separator.as_slice());
        digest.extend_from_slice(struct_hash.as_slice());
        assert_eq!(batch.safe_tx_hash, keccak256(digest));
    }

    #[test]
    fn test_value_is_rejected() {
        let tx = simulated(1, U256::from(1), Bytes::new());
        let err = multisig().build_batch("safe", SAFE, Address::ZERO, 1, &[&tx]).unwrap_err();
        assert_eq!(
            err,
            SenderError::MultisigNonZeroValue {
                name: "safe".to_string(),
                transaction_id: tx.transaction_id
            }
        );
    }
}
