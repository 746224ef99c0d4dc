use alloy_primitives::{Address, Bytes, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolValue;

use super::SenderInitConfig;
use crate::error::{SenderError, SenderResult};

/// A sender whose key is held in process memory.
#[derive(Clone, Debug)]
pub struct PrivateKeySender {
    signer: PrivateKeySigner,
}

impl PrivateKeySender {
    /// Decodes `abi.encode(bytes32 key)` and checks that the key controls the configured
    /// account.
    pub(crate) fn initialize(config: &SenderInitConfig) -> SenderResult<Self> {
        let invalid = |reason: &str| SenderError::InvalidPrivateKeyConfig {
            name: config.name.clone(),
            reason: reason.to_string(),
        };

        let key = B256::abi_decode(&config.config, true).map_err(|_| invalid("malformed key"))?;
        if key.is_zero() {
            return Err(invalid("zero key"));
        }
        let signer = PrivateKeySigner::from_bytes(&key).map_err(|err| invalid(&err.to_string()))?;
        if signer.address() != config.account {
            return Err(invalid(&format!(
                "key controls {} instead of {}",
                signer.address(),
                config.account
            )));
        }
        Ok(Self { signer })
    }

    /// Address controlled by the key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Signs a 32 byte digest and returns the 65 byte `r || s || v` signature.
    pub fn sign_hash(&self, hash: &B256) -> Result<Bytes, String> {
        let signature = self.signer.sign_hash_sync(hash).map_err(|err| err.to_string())?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}
