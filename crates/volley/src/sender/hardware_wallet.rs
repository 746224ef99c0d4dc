use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use super::{SenderInitConfig, SenderType};
use crate::error::{SenderError, SenderResult};

/// Supported hardware wallet families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum HardwareWalletDevice {
    /// Ledger.
    #[display("ledger")]
    Ledger,
    /// Trezor.
    #[display("trezor")]
    Trezor,
}

/// A sender whose key lives on a hardware wallet. Broadcasts are replayed as the account, the
/// device does the signing outside of this process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HardwareWalletSender {
    derivation_path: String,
    device: HardwareWalletDevice,
}

impl HardwareWalletSender {
    pub(crate) fn initialize(config: &SenderInitConfig) -> SenderResult<Self> {
        let invalid = |reason: &str| SenderError::InvalidHardwareWalletConfig {
            name: config.name.clone(),
            reason: reason.to_string(),
        };

        let derivation_path = String::abi_decode(&config.config, true)
            .map_err(|_| invalid("malformed derivation path"))?;
        if derivation_path.is_empty() {
            return Err(invalid("empty derivation path"));
        }

        let ledger = config.sender_type.contains(SenderType::LEDGER);
        let trezor = config.sender_type.contains(SenderType::TREZOR);
        let device = match (ledger, trezor) {
            (true, false) => HardwareWalletDevice::Ledger,
            (false, true) => HardwareWalletDevice::Trezor,
            _ => return Err(invalid("type must select exactly one of ledger or trezor")),
        };
        Ok(Self { derivation_path, device })
    }

    /// Derivation path of the account on the device.
    pub fn derivation_path(&self) -> &str {
        &self.derivation_path
    }

    /// Device family.
    pub const fn device(&self) -> HardwareWalletDevice {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use rstest::rstest;

    const PATH: &str = "m/44'/60'/0'/0/0";

    #[rstest]
    #[case(SenderType::LEDGER, HardwareWalletDevice::Ledger)]
    #[case(SenderType::TREZOR, HardwareWalletDevice::Trezor)]
    fn test_device_from_type(#[case] sender_type: SenderType, #[case] device: HardwareWalletDevice) {
        let config = SenderInitConfig::new(
            "cold",
            Address::repeat_byte(1),
            sender_type,
            PATH.to_string().abi_encode(),
        );
        let sender = HardwareWalletSender::initialize(&config).unwrap();
        assert_eq!(sender.device(), device);
        assert_eq!(sender.derivation_path(), PATH);
    }

    #[rstest]
    #[case(SenderType::HARDWARE_WALLET, PATH)]
    #[case(SenderType::LEDGER | SenderType::TREZOR, PATH)]
    #[case(SenderType::LEDGER, "")]
    fn test_invalid_config(#[case] sender_type: SenderType, #[case] path: &str) {
        let config = SenderInitConfig::new(
            "cold",
            Address::repeat_byte(1),
            sender_type,
            path.to_string().abi_encode(),
        );
        assert!(matches!(
            HardwareWalletSender::initialize(&config),
            Err(SenderError::InvalidHardwareWalletConfig { .. })
        ));
    }
}
