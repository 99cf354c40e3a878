//! Scenario runner around [`crate::vault::Vault`]: reads a TOML scenario and a CSV
//! list of operations, runs them against a simulated world and prints the
//! resulting balances. Shared by the binary and the integration tests.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use crate::{
    address::Address,
    command::{OperationKind, to_units},
    config::VaultConfig,
    processor::{
        OperationError, OperationProcessor, in_memory_processor::InMemoryOperationProcessor,
    },
    transfer::in_memory_custody::InMemoryCustody,
    valuation::ManualPriceFeed,
};
use anyhow::{Context, Result};
use csv_parser::CsvOperationParser;
use csv_printer::print_balances;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub address: Address,
    /// Whole accounting units per whole native unit.
    pub price: Decimal,
    #[serde(default = "default_price_decimals")]
    pub decimals: u32,
}

fn default_price_decimals() -> u32 {
    8
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalletConfig {
    pub address: Address,
    #[serde(default)]
    pub native: Decimal,
    #[serde(default)]
    pub stable: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub initializer: Address,
    pub vault_address: Address,
    pub vault: VaultConfig,
    pub price_feed: FeedConfig,
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
}

impl ScenarioConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Invalid scenario config")
    }

    /// Builds the vault, its price feed and the seeded wallets.
    pub fn build(self) -> Result<InMemoryOperationProcessor> {
        let vault = &self.vault;
        let answer = to_units(
            OperationKind::SetPrice,
            Some(self.price_feed.price),
            self.price_feed.decimals,
        )?;
        let feed = Arc::new(ManualPriceFeed::new(
            self.price_feed.address,
            i128::try_from(answer).context("Initial price is out of range")?,
            self.price_feed.decimals,
        ));

        let mut custody = InMemoryCustody::new(self.vault_address);
        for wallet in &self.wallets {
            let native = to_units(
                OperationKind::DepositNative,
                Some(wallet.native),
                vault.native_decimals,
            )?;
            let stable = to_units(
                OperationKind::DepositStable,
                Some(wallet.stable),
                vault.stable_decimals,
            )?;
            custody.fund_native(wallet.address, native);
            custody.fund_stable(vault.stable_token, wallet.address, stable);
        }

        Ok(InMemoryOperationProcessor::new(
            self.vault,
            self.initializer,
            feed,
            custody,
        )?)
    }
}

pub struct Service<'w, R, W: 'w> {
    pub config: ScenarioConfig,
    pub input: R,
    pub output: &'w mut W,
    pub error_printer: Box<dyn FnMut(u64, OperationError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    pub fn run(mut self) -> Result<()> {
        let parser = CsvOperationParser::new(self.input);
        let mut processor = self.config.build()?;

        for (line, row) in parser {
            let result = row.map_err(OperationError::from).and_then(|row| {
                processor.process_operation(row.kind, row.caller, row.token, row.amount)
            });
            if let Err(err) = result {
                (self.error_printer)(line, err);
            }
        }

        let vault = &processor.vault;
        let scales = processor.scales();
        info!(
            total_deposited = vault.total_deposited(),
            deposits = vault.deposit_count(),
            withdrawals = vault.withdrawal_count(),
            "scenario finished"
        );

        print_balances(self.output, vault.balances(), scales)
    }
}
