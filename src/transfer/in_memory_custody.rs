use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::{address::Address, ledger::Amount, vault::Vault};

use super::{TransferAdapter, TransferFailure};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustodyError {
    #[error("{holder} holds {available} native, {required} required")]
    InsufficientNative {
        holder: Address,
        required: Amount,
        available: Amount,
    },
}

/// Simulated outside world: native wallets, stable-asset balances and allowances.
/// The vault's own holdings sit under `vault_address` like any other holder's.
#[derive(Debug, Clone)]
pub struct InMemoryCustody {
    vault_address: Address,
    native: HashMap<Address, Amount>,
    stable: HashMap<(Address, Address), Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    rejecting: HashSet<Address>,
}

impl InMemoryCustody {
    pub fn new(vault_address: Address) -> Self {
        Self {
            vault_address,
            native: HashMap::new(),
            stable: HashMap::new(),
            allowances: HashMap::new(),
            rejecting: HashSet::new(),
        }
    }

    pub fn vault_address(&self) -> Address {
        self.vault_address
    }

    pub fn native_balance(&self, holder: Address) -> Amount {
        self.native.get(&holder).copied().unwrap_or_default()
    }

    pub fn stable_balance(&self, token: Address, holder: Address) -> Amount {
        self.stable.get(&(token, holder)).copied().unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: Address) -> Amount {
        self.allowances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn fund_native(&mut self, holder: Address, amount: Amount) {
        *self.native.entry(holder).or_default() += amount;
    }

    pub fn fund_stable(&mut self, token: Address, holder: Address, amount: Amount) {
        *self.stable.entry((token, holder)).or_default() += amount;
    }

    /// Lets the vault pull up to `amount` of `token` from `owner`.
    pub fn approve(&mut self, token: Address, owner: Address, amount: Amount) {
        self.allowances.insert((token, owner), amount);
    }

    /// Makes every native transfer to `holder` fail, like a recipient that reverts.
    pub fn reject_native(&mut self, holder: Address) {
        self.rejecting.insert(holder);
    }

    /// Moves the native value that travels with a call from `from` into the vault.
    pub fn send_to_vault(&mut self, from: Address, amount: Amount) -> Result<(), CustodyError> {
        let available = self.native_balance(from);
        if available < amount {
            return Err(CustodyError::InsufficientNative {
                holder: from,
                required: amount,
                available,
            });
        }
        *self.native.entry(from).or_default() -= amount;
        self.fund_native(self.vault_address, amount);
        Ok(())
    }

    fn move_stable(&mut self, token: Address, from: Address, to: Address, amount: Amount) -> bool {
        if self.stable_balance(token, from) < amount {
            return false;
        }
        *self.stable.entry((token, from)).or_default() -= amount;
        self.fund_stable(token, to, amount);
        true
    }
}

impl TransferAdapter for InMemoryCustody {
    fn push_native(
        &mut self,
        _vault: &mut Vault,
        to: Address,
        amount: Amount,
    ) -> Result<(), TransferFailure> {
        if self.rejecting.contains(&to) {
            return Err(TransferFailure::new(b"recipient rejected native transfer".to_vec()));
        }
        if self.native_balance(self.vault_address) < amount {
            return Err(TransferFailure::new(b"vault custody short".to_vec()));
        }
        *self.native.entry(self.vault_address).or_default() -= amount;
        self.fund_native(to, amount);
        Ok(())
    }

    fn push_stable(
        &mut self,
        _vault: &mut Vault,
        token: Address,
        to: Address,
        amount: Amount,
    ) -> Result<bool, TransferFailure> {
        Ok(self.move_stable(token, self.vault_address, to, amount))
    }

    fn pull_stable(
        &mut self,
        _vault: &mut Vault,
        token: Address,
        from: Address,
        amount: Amount,
    ) -> Result<bool, TransferFailure> {
        let allowance = self.allowance(token, from);
        if allowance < amount {
            return Ok(false);
        }
        if !self.move_stable(token, from, self.vault_address, amount) {
            return Ok(false);
        }
        self.allowances.insert((token, from), allowance - amount);
        Ok(true)
    }
}
