//! Senders: named on-chain identities that transactions are submitted through.
//!
//! Every sender shares a base record (id, name, account, type tag, capability flag, opaque
//! config). The backend specific part lives in [`SenderKind`], a closed set of variants that
//! is selected from the type tag when the registry initializes. Variant access goes through
//! checked casts such as [`Sender::as_private_key`], which fail with
//! [`SenderError::InvalidCast`] when the sender is of another kind.

mod governor;
mod hardware_wallet;
mod multisig;
mod private_key;

pub use governor::*;
pub use hardware_wallet::*;
pub use multisig::*;
pub use private_key::*;

use alloy_primitives::{map::HashMap, Address, Bytes, B256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolValue;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{
    error::{SenderError, SenderResult},
    types::{SenderId, TransactionId},
};

bitflags! {
    /// Type tag of a sender: exactly one base category, optionally combined with a specific
    /// variant bit of that category.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SenderType: u64 {
        /// Key held in process memory.
        const IN_MEMORY = 1 << 0;
        /// Key held on a hardware device.
        const HARDWARE_WALLET = 1 << 1;
        /// Multisig wallet, proposed to by another sender.
        const MULTISIG = 1 << 2;
        /// On-chain governance, proposed to by another sender.
        const GOVERNANCE = 1 << 3;
        /// Broadcast is left to the caller.
        const CUSTOM = 1 << 4;

        /// Raw private key.
        const PRIVATE_KEY = 1 << 8 | Self::IN_MEMORY.bits();
        /// Ledger device.
        const LEDGER = 1 << 9 | Self::HARDWARE_WALLET.bits();
        /// Trezor device.
        const TREZOR = 1 << 10 | Self::HARDWARE_WALLET.bits();
        /// Safe multisig.
        const GNOSIS_SAFE = 1 << 11 | Self::MULTISIG.bits();
        /// OpenZeppelin Governor, optionally behind a timelock.
        const OZ_GOVERNOR = 1 << 12 | Self::GOVERNANCE.bits();
    }
}

impl SenderType {
    /// All base categories.
    pub const CATEGORIES: Self = Self::IN_MEMORY
        .union(Self::HARDWARE_WALLET)
        .union(Self::MULTISIG)
        .union(Self::GOVERNANCE)
        .union(Self::CUSTOM);

    /// Returns the base category bits of the tag.
    pub const fn category(self) -> Self {
        self.intersection(Self::CATEGORIES)
    }

    /// Returns `true` if the tag carries exactly one base category.
    pub const fn has_single_category(self) -> bool {
        self.category().bits().count_ones() == 1
    }
}

impl Default for SenderType {
    fn default() -> Self {
        Self::empty()
    }
}

/// Initialization record of a single sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInitConfig {
    /// Unique name.
    pub name: String,
    /// On-chain account. Governance senders replace it with their effective account.
    pub account: Address,
    /// Type tag.
    pub sender_type: SenderType,
    /// Whether the sender may submit transactions.
    pub can_broadcast: bool,
    /// ABI-encoded backend specific configuration.
    pub config: Bytes,
}

impl SenderInitConfig {
    /// Creates a record with an explicit tag and opaque config.
    pub fn new(
        name: impl Into<String>,
        account: Address,
        sender_type: SenderType,
        config: impl Into<Bytes>,
    ) -> Self {
        Self { name: name.into(), account, sender_type, can_broadcast: true, config: config.into() }
    }

    /// A private key sender. The account is derived from the key.
    pub fn private_key(name: impl Into<String>, key: B256) -> SenderResult<Self> {
        let name = name.into();
        let signer = PrivateKeySigner::from_bytes(&key).map_err(|err| {
            SenderError::InvalidPrivateKeyConfig { name: name.clone(), reason: err.to_string() }
        })?;
        Ok(Self::new(name, signer.address(), SenderType::PRIVATE_KEY, key.abi_encode()))
    }

    /// A Ledger sender using `derivation_path`.
    pub fn ledger(name: impl Into<String>, account: Address, derivation_path: &str) -> Self {
        Self::new(name, account, SenderType::LEDGER, derivation_path.to_string().abi_encode())
    }

    /// A Trezor sender using `derivation_path`.
    pub fn trezor(name: impl Into<String>, account: Address, derivation_path: &str) -> Self {
        Self::new(name, account, SenderType::TREZOR, derivation_path.to_string().abi_encode())
    }

    /// A Safe sender whose batches are proposed by the sender named `proposer`.
    pub fn safe(name: impl Into<String>, safe: Address, proposer: &str) -> Self {
        Self::new(name, safe, SenderType::GNOSIS_SAFE, proposer.to_string().abi_encode())
    }

    /// A Governor sender. Pass [`Address::ZERO`] as `timelock` for a governor without one.
    pub fn governor(
        name: impl Into<String>,
        governor: Address,
        timelock: Address,
        proposer: &str,
    ) -> Self {
        let config = (governor, timelock, proposer.to_string()).abi_encode_params();
        Self::new(name, governor, SenderType::OZ_GOVERNOR, config)
    }

    /// A sender whose transactions are handed back to the caller on broadcast.
    pub fn custom(name: impl Into<String>, account: Address) -> Self {
        Self::new(name, account, SenderType::CUSTOM, Bytes::new())
    }

    /// Sets the capability flag.
    pub const fn with_can_broadcast(mut self, can_broadcast: bool) -> Self {
        self.can_broadcast = can_broadcast;
        self
    }
}

/// Backend specific state of a sender.
#[derive(Clone, Debug)]
pub enum SenderKind {
    /// Raw key in memory.
    PrivateKey(PrivateKeySender),
    /// Hardware wallet.
    HardwareWallet(HardwareWalletSender),
    /// Safe multisig.
    Multisig(MultisigSender),
    /// Governor proposer.
    Governor(GovernorSender),
    /// Transactions are returned to the caller.
    Custom,
    /// A multisig or governance category without a known variant. It simulates normally but
    /// has no broadcast strategy.
    Unsupported,
}

impl SenderKind {
    /// Human readable name of the variant.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PrivateKey(_) => "private key",
            Self::HardwareWallet(_) => "hardware wallet",
            Self::Multisig(_) => "multisig",
            Self::Governor(_) => "governor",
            Self::Custom => "custom",
            Self::Unsupported => "unsupported",
        }
    }

    /// Runs the variant initializer selected by the type tag of `config`.
    ///
    /// `configs` holds every sender of the registry so proposer references can be checked.
    pub(crate) fn initialize(
        config: &SenderInitConfig,
        configs: &HashMap<SenderId, &SenderInitConfig>,
    ) -> SenderResult<Self> {
        let sender_type = config.sender_type;
        if !sender_type.has_single_category() {
            return Err(SenderError::InvalidSenderType { name: config.name.clone(), sender_type });
        }

        let category = sender_type.category();
        let kind = if category == SenderType::IN_MEMORY {
            if !sender_type.contains(SenderType::PRIVATE_KEY) {
                return Err(SenderError::InvalidSenderType {
                    name: config.name.clone(),
                    sender_type,
                });
            }
            Self::PrivateKey(PrivateKeySender::initialize(config)?)
        } else if category == SenderType::HARDWARE_WALLET {
            Self::HardwareWallet(HardwareWalletSender::initialize(config)?)
        } else if category == SenderType::MULTISIG {
            if sender_type.contains(SenderType::GNOSIS_SAFE) {
                Self::Multisig(MultisigSender::initialize(config, configs)?)
            } else {
                Self::Unsupported
            }
        } else if category == SenderType::GOVERNANCE {
            if sender_type.contains(SenderType::OZ_GOVERNOR) {
                Self::Governor(GovernorSender::initialize(config, configs)?)
            } else {
                Self::Unsupported
            }
        } else {
            Self::Custom
        };
        Ok(kind)
    }
}

/// Looks up the sender named `proposer` and checks that it can sign proposals.
pub(crate) fn check_proposer<'a>(
    proposer: &str,
    configs: &HashMap<SenderId, &'a SenderInitConfig>,
) -> Result<&'a SenderInitConfig, String> {
    if proposer.is_empty() {
        return Err("empty proposer name".to_string());
    }
    let config = configs
        .get(&SenderId::from_name(proposer))
        .ok_or_else(|| format!("unknown proposer '{proposer}'"))?;
    let category = config.sender_type.category();
    if category != SenderType::IN_MEMORY && category != SenderType::HARDWARE_WALLET {
        return Err(format!(
            "proposer '{proposer}' must be an in-memory or hardware wallet sender"
        ));
    }
    Ok(config)
}

/// A registered sender.
#[derive(Clone, Debug)]
pub struct Sender {
    id: SenderId,
    name: String,
    account: Address,
    sender_type: SenderType,
    can_broadcast: bool,
    config: Bytes,
    transactions: Vec<TransactionId>,
    kind: SenderKind,
}

impl Sender {
    pub(crate) fn new(config: SenderInitConfig, kind: SenderKind) -> SenderResult<Self> {
        let account = match &kind {
            SenderKind::Governor(governor) => governor.effective_account(),
            _ => config.account,
        };
        if account.is_zero() {
            return Err(SenderError::ZeroAccount(config.name));
        }
        Ok(Self {
            id: SenderId::from_name(&config.name),
            name: config.name,
            account,
            sender_type: config.sender_type,
            can_broadcast: config.can_broadcast,
            config: config.config,
            transactions: Vec::new(),
            kind,
        })
    }

    /// Stable id, the hash of the name.
    pub const fn id(&self) -> SenderId {
        self.id
    }

    /// Name of the sender.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Account transactions are simulated as.
    pub const fn account(&self) -> Address {
        self.account
    }

    /// Type tag.
    pub const fn sender_type(&self) -> SenderType {
        self.sender_type
    }

    /// Whether the sender may submit transactions.
    pub const fn can_broadcast(&self) -> bool {
        self.can_broadcast
    }

    /// Opaque configuration the sender was initialized with.
    pub const fn config(&self) -> &Bytes {
        &self.config
    }

    /// Ids of the transactions submitted through this sender, in order.
    pub fn transactions(&self) -> &[TransactionId] {
        &self.transactions
    }

    /// Backend specific state.
    pub const fn kind(&self) -> &SenderKind {
        &self.kind
    }

    pub(crate) fn record(&mut self, transaction_id: TransactionId) {
        self.transactions.push(transaction_id);
    }

    fn invalid_cast(&self, expected: &'static str) -> SenderError {
        invalid_cast(&self.name, expected, &self.kind)
    }

    /// Casts to a private key sender.
    pub fn as_private_key(&self) -> SenderResult<&PrivateKeySender> {
        match &self.kind {
            SenderKind::PrivateKey(sender) => Ok(sender),
            _ => Err(self.invalid_cast("private key")),
        }
    }

    /// Casts to a hardware wallet sender.
    pub fn as_hardware_wallet(&self) -> SenderResult<&HardwareWalletSender> {
        match &self.kind {
            SenderKind::HardwareWallet(sender) => Ok(sender),
            _ => Err(self.invalid_cast("hardware wallet")),
        }
    }

    /// Casts to a multisig sender.
    pub fn as_multisig(&self) -> SenderResult<&MultisigSender> {
        match &self.kind {
            SenderKind::Multisig(sender) => Ok(sender),
            _ => Err(self.invalid_cast("multisig")),
        }
    }

    /// Casts to a mutable multisig sender.
    pub fn as_multisig_mut(&mut self) -> SenderResult<&mut MultisigSender> {
        match &mut self.kind {
            SenderKind::Multisig(sender) => Ok(sender),
            kind => Err(invalid_cast(&self.name, "multisig", kind)),
        }
    }

    /// Casts to a governor sender.
    pub fn as_governor(&self) -> SenderResult<&GovernorSender> {
        match &self.kind {
            SenderKind::Governor(sender) => Ok(sender),
            _ => Err(self.invalid_cast("governor")),
        }
    }

    /// Casts to a mutable governor sender.
    pub fn as_governor_mut(&mut self) -> SenderResult<&mut GovernorSender> {
        match &mut self.kind {
            SenderKind::Governor(sender) => Ok(sender),
            kind => Err(invalid_cast(&self.name, "governor", kind)),
        }
    }
}

fn invalid_cast(name: &str, expected: &'static str, kind: &SenderKind) -> SenderError {
    SenderError::InvalidCast { name: name.to_string(), expected, actual: kind.name() }
}
