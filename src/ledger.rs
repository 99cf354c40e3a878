use std::collections::HashMap;

use thiserror::Error;

use crate::{address::Address, valuation::ValuationError};

/// Amount in an asset's smallest unit, or in accounting units for values.
pub type Amount = u128;

/// Notification of a committed state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    NativeDeposited {
        account: Address,
        amount: Amount,
        value: Amount,
    },
    StableDeposited {
        account: Address,
        token: Address,
        amount: Amount,
    },
    NativeWithdrawn {
        account: Address,
        amount: Amount,
        value: Amount,
    },
    StableWithdrawn {
        account: Address,
        token: Address,
        amount: Amount,
    },
    PriceSourceChanged {
        previous: Address,
        current: Address,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid amount {amount}")]
    InvalidAmount { amount: Amount },
    #[error("Asset {asset} is not supported")]
    UnsupportedAsset { asset: Address },
    #[error("Deposit worth {value} exceeds remaining capacity {remaining}")]
    CapacityExceeded { value: Amount, remaining: Amount },
    #[error("Withdrawal worth {value} exceeds the per-withdrawal cap {cap}")]
    WithdrawalTooLarge { value: Amount, cap: Amount },
    #[error("Transfer failed (payload 0x{})", hex::encode(.payload))]
    TransferFailed { payload: Vec<u8> },
    #[error("Re-entrant call into a guarded withdrawal")]
    ReentrancyBlocked,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("{caller} is not allowed to change the price source")]
    Unauthorized { caller: Address },
    #[error("Ledger arithmetic overflow")]
    Overflow,
    #[error("Withdrawal worth {value} exceeds the running total {total}")]
    ExceedsRunningTotal { value: Amount, total: Amount },
    #[error(transparent)]
    Valuation(#[from] ValuationError),
}

/// Balance movement requested against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    pub account: Address,
    pub asset: Address,
    pub amount: Amount,
}

/// Position in the event journal that `Ledger::rollback` can return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JournalMark(usize);

/// Balance table, global deposit total and counters.
/// State changes only through [`LedgerEvent`]s; `handle_*` validates and
/// produces the event, `apply` executes it.
#[derive(Debug, Default)]
pub struct Ledger {
    balances: HashMap<(Address, Address), Amount>,
    total_deposited: Amount,
    deposit_count: u64,
    withdrawal_count: u64,
    journal: Vec<LedgerEvent>,
}

impl Ledger {
    pub fn balance_of(&self, account: Address, asset: Address) -> Amount {
        self.balances
            .get(&(account, asset))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    pub fn deposit_count(&self) -> u64 {
        self.deposit_count
    }

    pub fn withdrawal_count(&self) -> u64 {
        self.withdrawal_count
    }

    /// Every event applied so far, oldest first.
    pub fn events(&self) -> &[LedgerEvent] {
        &self.journal
    }

    /// Non-zero balances as `(account, asset, amount)`.
    pub fn balances(&self) -> impl Iterator<Item = (Address, Address, Amount)> + '_ {
        self.balances
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|((account, asset), amount)| (*account, *asset, *amount))
    }

    /// Validates a deposit. `valuate` is only consulted once the amount is known to be non-zero.
    pub fn handle_deposit(
        &self,
        movement: Movement,
        global_cap: Amount,
        valuate: impl FnOnce(Amount) -> Result<Amount, LedgerError>,
    ) -> Result<LedgerEvent, LedgerError> {
        let Movement {
            account,
            asset,
            amount,
        } = movement;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let value = valuate(amount)?;

        let remaining = global_cap.saturating_sub(self.total_deposited);
        if value > remaining {
            return Err(LedgerError::CapacityExceeded { value, remaining });
        }
        self.balance_of(account, asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        Ok(if asset == Address::NATIVE {
            LedgerEvent::NativeDeposited {
                account,
                amount,
                value,
            }
        } else {
            LedgerEvent::StableDeposited {
                account,
                token: asset,
                amount,
            }
        })
    }

    /// Validates a withdrawal. Zero and over-balance amounts are rejected before valuation.
    pub fn handle_withdrawal(
        &self,
        movement: Movement,
        withdrawal_cap: Amount,
        valuate: impl FnOnce(Amount) -> Result<Amount, LedgerError>,
    ) -> Result<LedgerEvent, LedgerError> {
        let Movement {
            account,
            asset,
            amount,
        } = movement;
        if amount == 0 || amount > self.balance_of(account, asset) {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let value = valuate(amount)?;
        if value > withdrawal_cap {
            return Err(LedgerError::WithdrawalTooLarge {
                value,
                cap: withdrawal_cap,
            });
        }
        // the running total is kept at deposit-time prices, so a price rise
        // can value a withdrawal above what is left in it
        if value > self.total_deposited {
            return Err(LedgerError::ExceedsRunningTotal {
                value,
                total: self.total_deposited,
            });
        }

        Ok(if asset == Address::NATIVE {
            LedgerEvent::NativeWithdrawn {
                account,
                amount,
                value,
            }
        } else {
            LedgerEvent::StableWithdrawn {
                account,
                token: asset,
                amount,
            }
        })
    }

    /// Executes an event produced by one of the `handle_*` methods.
    pub(crate) fn apply(&mut self, event: LedgerEvent) {
        match &event {
            LedgerEvent::NativeDeposited {
                account,
                amount,
                value,
            } => {
                self.credit(*account, Address::NATIVE, *amount, *value);
                self.deposit_count += 1;
            }
            LedgerEvent::StableDeposited {
                account,
                token,
                amount,
            } => {
                self.credit(*account, *token, *amount, *amount);
                self.deposit_count += 1;
            }
            LedgerEvent::NativeWithdrawn {
                account,
                amount,
                value,
            } => {
                self.debit(*account, Address::NATIVE, *amount, *value);
                self.withdrawal_count += 1;
            }
            LedgerEvent::StableWithdrawn {
                account,
                token,
                amount,
            } => {
                self.debit(*account, *token, *amount, *amount);
                self.withdrawal_count += 1;
            }
            LedgerEvent::PriceSourceChanged { .. } => {}
        }
        self.journal.push(event);
    }

    pub(crate) fn mark(&self) -> JournalMark {
        JournalMark(self.journal.len())
    }

    /// Reverts every event applied after `mark`, newest first.
    pub(crate) fn rollback(&mut self, mark: JournalMark) {
        while self.journal.len() > mark.0 {
            let Some(event) = self.journal.pop() else {
                break;
            };
            self.revert(&event);
        }
    }

    fn revert(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::NativeDeposited {
                account,
                amount,
                value,
            } => {
                self.debit(*account, Address::NATIVE, *amount, *value);
                self.deposit_count -= 1;
            }
            LedgerEvent::StableDeposited {
                account,
                token,
                amount,
            } => {
                self.debit(*account, *token, *amount, *amount);
                self.deposit_count -= 1;
            }
            LedgerEvent::NativeWithdrawn {
                account,
                amount,
                value,
            } => {
                self.credit(*account, Address::NATIVE, *amount, *value);
                self.withdrawal_count -= 1;
            }
            LedgerEvent::StableWithdrawn {
                account,
                token,
                amount,
            } => {
                self.credit(*account, *token, *amount, *amount);
                self.withdrawal_count -= 1;
            }
            LedgerEvent::PriceSourceChanged { .. } => {}
        }
    }

    fn credit(&mut self, account: Address, asset: Address, amount: Amount, value: Amount) {
        *self.balances.entry((account, asset)).or_default() += amount;
        self.total_deposited += value;
    }

    fn debit(&mut self, account: Address, asset: Address, amount: Amount, value: Amount) {
        if let Some(balance) = self.balances.get_mut(&(account, asset)) {
            *balance = balance.saturating_sub(amount);
        }
        self.total_deposited = self.total_deposited.saturating_sub(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAP: Amount = 1_000;

    fn alice() -> Address {
        Address::from_low_u64(0xa1)
    }

    fn token() -> Address {
        Address::from_low_u64(0x70)
    }

    fn native(amount: Amount) -> Movement {
        Movement {
            account: alice(),
            asset: Address::NATIVE,
            amount,
        }
    }

    fn stable(amount: Amount) -> Movement {
        Movement {
            account: alice(),
            asset: token(),
            amount,
        }
    }

    fn doubled(amount: Amount) -> Result<Amount, LedgerError> {
        Ok(amount * 2)
    }

    #[test]
    fn apply_events() {
        let mut ledger = Ledger::default();
        ledger.apply(LedgerEvent::NativeDeposited {
            account: alice(),
            amount: 10,
            value: 20,
        });
        ledger.apply(LedgerEvent::StableDeposited {
            account: alice(),
            token: token(),
            amount: 7,
        });
        assert_eq!(ledger.balance_of(alice(), Address::NATIVE), 10);
        assert_eq!(ledger.balance_of(alice(), token()), 7);
        assert_eq!(ledger.total_deposited(), 27);
        assert_eq!(ledger.deposit_count(), 2);

        ledger.apply(LedgerEvent::NativeWithdrawn {
            account: alice(),
            amount: 4,
            value: 8,
        });
        assert_eq!(ledger.balance_of(alice(), Address::NATIVE), 6);
        assert_eq!(ledger.total_deposited(), 19);
        assert_eq!(ledger.withdrawal_count(), 1);
        assert_eq!(ledger.events().len(), 3);
    }

    #[test]
    fn rollback_restores_state() {
        let mut ledger = Ledger::default();
        ledger.apply(LedgerEvent::NativeDeposited {
            account: alice(),
            amount: 10,
            value: 20,
        });
        let mark = ledger.mark();
        ledger.apply(LedgerEvent::NativeWithdrawn {
            account: alice(),
            amount: 10,
            value: 20,
        });
        ledger.apply(LedgerEvent::StableDeposited {
            account: alice(),
            token: token(),
            amount: 5,
        });
        ledger.rollback(mark);

        assert_eq!(ledger.balance_of(alice(), Address::NATIVE), 10);
        assert_eq!(ledger.balance_of(alice(), token()), 0);
        assert_eq!(ledger.total_deposited(), 20);
        assert_eq!(ledger.deposit_count(), 1);
        assert_eq!(ledger.withdrawal_count(), 0);
        assert_eq!(ledger.events().len(), 1);
    }

    #[test]
    fn handle_deposit() {
        let ledger = Ledger::default();

        let err = ledger
            .handle_deposit(native(0), CAP, |_| panic!("zero amounts are never valuated"))
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidAmount { amount: 0 });

        let evt = ledger.handle_deposit(native(500), CAP, doubled).unwrap();
        assert_eq!(
            evt,
            LedgerEvent::NativeDeposited {
                account: alice(),
                amount: 500,
                value: 1_000,
            }
        );

        let err = ledger.handle_deposit(native(501), CAP, doubled).unwrap_err();
        assert_eq!(
            err,
            LedgerError::CapacityExceeded {
                value: 1_002,
                remaining: CAP,
            }
        );

        let evt = ledger.handle_deposit(stable(3), CAP, Ok).unwrap();
        assert_eq!(
            evt,
            LedgerEvent::StableDeposited {
                account: alice(),
                token: token(),
                amount: 3,
            }
        );
    }

    #[test]
    fn handle_withdrawal() {
        let mut ledger = Ledger::default();
        let err = ledger
            .handle_withdrawal(native(1), CAP, doubled)
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidAmount { amount: 1 });

        ledger.apply(ledger.handle_deposit(native(400), CAP, doubled).unwrap());

        let err = ledger
            .handle_withdrawal(native(401), CAP, doubled)
            .unwrap_err();
        assert_eq!(err, LedgerError::InvalidAmount { amount: 401 });

        let err = ledger
            .handle_withdrawal(native(300), 500, doubled)
            .unwrap_err();
        assert_eq!(err, LedgerError::WithdrawalTooLarge { value: 600, cap: 500 });

        let evt = ledger.handle_withdrawal(native(250), 500, doubled).unwrap();
        ledger.apply(evt);
        assert_eq!(ledger.balance_of(alice(), Address::NATIVE), 150);
        assert_eq!(ledger.total_deposited(), 300);
    }

    #[test]
    fn withdrawal_valued_above_running_total() {
        let mut ledger = Ledger::default();
        ledger.apply(ledger.handle_deposit(native(100), CAP, Ok).unwrap());
        // price went up tenfold since the deposit
        let err = ledger
            .handle_withdrawal(native(100), CAP, |amount| Ok(amount * 10))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::ExceedsRunningTotal {
                value: 1_000,
                total: 100
            }
        );
        assert_eq!(
            err.to_string(),
            "Withdrawal worth 1000 exceeds the running total 100"
        );
    }

    #[test]
    fn unbacked_withdrawal_event_does_not_underflow() {
        let mut ledger = Ledger::default();
        ledger.apply(LedgerEvent::NativeWithdrawn {
            account: alice(),
            amount: 5,
            value: 1,
        });
        assert_eq!(ledger.balance_of(alice(), Address::NATIVE), 0);
        assert_eq!(ledger.total_deposited(), 0);
        assert_eq!(ledger.withdrawal_count(), 1);
    }
}
