//! Wallet configuration.

use everscale_types::cell::Cell;
use serde::{Deserialize, Serialize};

use crate::models::BASECHAIN;
use crate::wallet::WalletVersion;

/// Subwallet id used by most wallet applications for the basechain.
pub const DEFAULT_SUBWALLET_ID: u32 = 698983191;

/// Subwallet id used for high-load v3 wallets.
pub const DEFAULT_HIGHLOAD_V3_SUBWALLET_ID: u32 = 0x10ad;

/// Regular wallet settings.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Contract generation.
    pub version: WalletVersion,
    /// Workchain of the wallet address.
    pub workchain: i8,
    /// Subwallet id stored in the contract data.
    pub subwallet_id: u32,
    /// Lifetime of a signed message in seconds.
    pub message_ttl: u32,
    /// Contract code, as a base64 encoded BOC.
    #[serde(with = "crate::util::serde_boc")]
    pub code: Cell,
}

impl WalletConfig {
    /// Creates a basechain config with the default subwallet id.
    pub fn new(version: WalletVersion, code: Cell, message_ttl: u32) -> Self {
        Self {
            version,
            workchain: BASECHAIN,
            subwallet_id: DEFAULT_SUBWALLET_ID,
            message_ttl,
            code,
        }
    }

    /// Returns the `valid_until` of a message signed at `now`.
    #[inline]
    pub fn valid_until(&self, now: u32) -> u32 {
        now.saturating_add(self.message_ttl)
    }
}

/// High-load wallet settings.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HighloadConfig {
    /// Workchain of the wallet address.
    pub workchain: i8,
    /// Subwallet id stored in the contract data.
    pub subwallet_id: u32,
    /// Lifetime of a query id in seconds.
    pub query_timeout: u32,
    /// Contract code, as a base64 encoded BOC.
    #[serde(with = "crate::util::serde_boc")]
    pub code: Cell,
}

/// High-load wallet v3 settings.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HighloadV3Config {
    /// Workchain of the wallet address.
    pub workchain: i8,
    /// Subwallet id stored in the contract data.
    pub subwallet_id: u32,
    /// Lifetime of a query in seconds, stored in the contract data.
    pub timeout: u32,
    /// Contract code, as a base64 encoded BOC.
    #[serde(with = "crate::util::serde_boc")]
    pub code: Cell,
}
