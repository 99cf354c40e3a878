use serde::Deserialize;

use crate::{address::Address, ledger::Amount};

/// Largest decimal precision accepted for either asset.
pub const MAX_DECIMALS: u32 = 36;

/// Initialization parameters of a [`crate::vault::Vault`]. Caps are in the
/// accounting unit's smallest denomination, i.e. the stable asset's.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    pub global_cap: Amount,
    pub withdrawal_cap: Amount,
    pub stable_token: Address,
    /// Principal allowed to replace the price source, the initializer when absent.
    #[serde(default)]
    pub admin: Option<Address>,
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u32,
    #[serde(default = "default_stable_decimals")]
    pub stable_decimals: u32,
}

fn default_native_decimals() -> u32 {
    18
}

fn default_stable_decimals() -> u32 {
    6
}

impl VaultConfig {
    pub fn new(global_cap: Amount, withdrawal_cap: Amount, stable_token: Address) -> Self {
        Self {
            global_cap,
            withdrawal_cap,
            stable_token,
            admin: None,
            native_decimals: default_native_decimals(),
            stable_decimals: default_stable_decimals(),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}
