use std::{collections::HashMap, sync::Arc};

use rust_decimal::Decimal;

use crate::{
    address::Address,
    command::{OperationKind, UnitScales, VaultCommand},
    config::VaultConfig,
    ledger::LedgerError,
    transfer::in_memory_custody::InMemoryCustody,
    valuation::{ManualPriceFeed, PriceSource},
    vault::Vault,
};

use super::{OperationError, OperationProcessor};

/// Drives a [`Vault`] against a simulated world. A failed operation leaves
/// the world as it found it, the vault takes care of its own state.
pub struct InMemoryOperationProcessor {
    pub vault: Vault,
    pub custody: InMemoryCustody,
    feeds: HashMap<Address, Arc<ManualPriceFeed>>,
    scales: UnitScales,
}

impl InMemoryOperationProcessor {
    pub fn new(
        config: VaultConfig,
        initializer: Address,
        feed: Arc<ManualPriceFeed>,
        custody: InMemoryCustody,
    ) -> Result<Self, LedgerError> {
        let scales = UnitScales {
            native_decimals: config.native_decimals,
            stable_decimals: config.stable_decimals,
            price_decimals: feed.latest().decimals,
        };
        let vault = Vault::new(config, initializer, feed.clone())?;
        Ok(Self {
            vault,
            custody,
            feeds: HashMap::from([(feed.address(), feed)]),
            scales,
        })
    }

    pub fn scales(&self) -> UnitScales {
        self.scales
    }

    fn execute(&mut self, command: VaultCommand) -> Result<(), OperationError> {
        match command {
            VaultCommand::DepositNative { caller, amount } => {
                self.custody.send_to_vault(caller, amount)?;
                self.vault.deposit_native(caller, amount)?;
            }
            VaultCommand::Receive { caller, amount } => {
                self.custody.send_to_vault(caller, amount)?;
                self.vault.receive(caller, amount)?;
            }
            VaultCommand::DepositStable {
                caller,
                token,
                amount,
            } => {
                self.vault
                    .deposit_stable(&mut self.custody, caller, token, amount)?;
            }
            VaultCommand::WithdrawNative { caller, amount } => {
                self.vault
                    .withdraw_native(&mut self.custody, caller, amount)?;
            }
            VaultCommand::WithdrawStable {
                caller,
                token,
                amount,
            } => {
                self.vault
                    .withdraw_stable(&mut self.custody, caller, token, amount)?;
            }
            VaultCommand::Approve {
                caller,
                token,
                amount,
            } => {
                self.custody.approve(token, caller, amount);
            }
            VaultCommand::SetPrice { answer } => {
                let current = self.vault.price_source().address();
                if let Some(feed) = self.feeds.get(&current) {
                    feed.set_answer(answer);
                }
            }
            VaultCommand::SetPriceSource {
                caller,
                source,
                answer,
            } => {
                let feed = match self.feeds.get(&source) {
                    Some(feed) => feed.clone(),
                    None => Arc::new(ManualPriceFeed::new(
                        source,
                        answer,
                        self.scales.price_decimals,
                    )),
                };
                self.vault.set_price_source(caller, feed.clone())?;
                feed.set_answer(answer);
                self.feeds.insert(source, feed);
            }
        }
        Ok(())
    }
}

impl OperationProcessor for InMemoryOperationProcessor {
    fn process_operation(
        &mut self,
        kind: OperationKind,
        caller: Option<Address>,
        token: Option<Address>,
        amount: Option<Decimal>,
    ) -> Result<(), OperationError> {
        let command = VaultCommand::parse_command(kind, caller, token, amount, &self.scales)?;
        let world = self.custody.clone();
        let result = self.execute(command);
        if result.is_err() {
            self.custody = world;
        }
        result
    }
}
