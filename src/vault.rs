use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    address::Address,
    admin::PriceSourceCell,
    config::{MAX_DECIMALS, VaultConfig},
    ledger::{Amount, JournalMark, Ledger, LedgerError, LedgerEvent, Movement},
    transfer::{TransferAdapter, TransferFailure},
    valuation::{PriceSource, Valuation},
};

/// State to return to when an operation fails part way.
struct Checkpoint {
    journal: JournalMark,
    price_source: Arc<dyn PriceSource>,
}

/// Custodial ledger for the native asset and one stable asset, bounded by a
/// global deposit cap and a per-withdrawal cap, both in accounting units.
///
/// Every operation is all-or-nothing: on error, no state it touched, nor any
/// state touched by calls nested inside its transfers, survives.
#[derive(Debug)]
pub struct Vault {
    global_cap: Amount,
    withdrawal_cap: Amount,
    stable_token: Address,
    valuation: Valuation,
    price_source: PriceSourceCell,
    ledger: Ledger,
    native_withdrawal_locked: bool,
}

impl Vault {
    /// `initializer` becomes the administrator unless the config names one.
    pub fn new(
        config: VaultConfig,
        initializer: Address,
        price_source: Arc<dyn PriceSource>,
    ) -> Result<Self, LedgerError> {
        if config.stable_token.is_zero() {
            return Err(LedgerError::InvalidConfiguration("stable token must not be null"));
        }
        if config.native_decimals > MAX_DECIMALS || config.stable_decimals > MAX_DECIMALS {
            return Err(LedgerError::InvalidConfiguration("asset precision is too high"));
        }
        let admin = config.admin.unwrap_or(initializer);
        Ok(Self {
            global_cap: config.global_cap,
            withdrawal_cap: config.withdrawal_cap,
            stable_token: config.stable_token,
            valuation: Valuation::new(config.native_decimals, config.stable_decimals),
            price_source: PriceSourceCell::new(admin, price_source)?,
            ledger: Ledger::default(),
            native_withdrawal_locked: false,
        })
    }

    /// Accounting-unit value of `amount` native at the current price.
    pub fn valuate(&self, amount: Amount) -> Result<Amount, LedgerError> {
        let sample = self.price_source.current().latest();
        Ok(self.valuation.value_of(&sample, amount)?)
    }

    /// Credits `amount` native to `account`. The value itself arrived with the call.
    pub fn deposit_native(&mut self, account: Address, amount: Amount) -> Result<(), LedgerError> {
        let movement = Movement {
            account,
            asset: Address::NATIVE,
            amount,
        };
        let event = self
            .ledger
            .handle_deposit(movement, self.global_cap, |amount| self.valuate(amount))?;
        debug!(%account, amount, "native deposit");
        self.ledger.apply(event);
        Ok(())
    }

    /// Native value sent without naming an operation is a deposit from the sender.
    pub fn receive(&mut self, sender: Address, amount: Amount) -> Result<(), LedgerError> {
        self.deposit_native(sender, amount)
    }

    /// Pulls `amount` of the stable asset from `account` and credits it.
    pub fn deposit_stable<T>(
        &mut self,
        transfers: &mut T,
        account: Address,
        token: Address,
        amount: Amount,
    ) -> Result<(), LedgerError>
    where
        T: TransferAdapter + ?Sized,
    {
        self.ensure_stable(token)?;
        let movement = Movement {
            account,
            asset: token,
            amount,
        };
        self.ledger.handle_deposit(movement, self.global_cap, Ok)?;

        let checkpoint = self.checkpoint();
        match transfers.pull_stable(self, token, account, amount) {
            Ok(true) => {}
            Ok(false) => {
                warn!(%account, amount, "stable pull refused");
                return self.abort(checkpoint, TransferFailure::default());
            }
            Err(failure) => {
                warn!(%account, amount, "stable pull failed");
                return self.abort(checkpoint, failure);
            }
        }

        // the pull may have re-entered and used up capacity
        let event = match self.ledger.handle_deposit(movement, self.global_cap, Ok) {
            Ok(event) => event,
            Err(err) => {
                self.rollback(checkpoint);
                return Err(err);
            }
        };
        debug!(%account, amount, "stable deposit");
        self.ledger.apply(event);
        Ok(())
    }

    /// Debits `amount` native from `account`, then pushes it out.
    /// A call nested inside the push that tries this again is refused.
    pub fn withdraw_native<T>(
        &mut self,
        transfers: &mut T,
        account: Address,
        amount: Amount,
    ) -> Result<(), LedgerError>
    where
        T: TransferAdapter + ?Sized,
    {
        if self.native_withdrawal_locked {
            warn!(%account, amount, "re-entrant native withdrawal blocked");
            return Err(LedgerError::ReentrancyBlocked);
        }
        self.native_withdrawal_locked = true;
        let result = self.withdraw_native_unguarded(transfers, account, amount);
        self.native_withdrawal_locked = false;
        result
    }

    fn withdraw_native_unguarded<T>(
        &mut self,
        transfers: &mut T,
        account: Address,
        amount: Amount,
    ) -> Result<(), LedgerError>
    where
        T: TransferAdapter + ?Sized,
    {
        let movement = Movement {
            account,
            asset: Address::NATIVE,
            amount,
        };
        let event = self
            .ledger
            .handle_withdrawal(movement, self.withdrawal_cap, |amount| self.valuate(amount))?;

        let checkpoint = self.checkpoint();
        self.ledger.apply(event);
        if let Err(failure) = transfers.push_native(self, account, amount) {
            warn!(%account, amount, "native push failed");
            return self.abort(checkpoint, failure);
        }
        debug!(%account, amount, "native withdrawal");
        Ok(())
    }

    /// Debits `amount` of the stable asset from `account`, then pushes it out.
    /// Not guarded against re-entry; relies on the debit preceding the push.
    pub fn withdraw_stable<T>(
        &mut self,
        transfers: &mut T,
        account: Address,
        token: Address,
        amount: Amount,
    ) -> Result<(), LedgerError>
    where
        T: TransferAdapter + ?Sized,
    {
        self.ensure_stable(token)?;
        let movement = Movement {
            account,
            asset: token,
            amount,
        };
        let event = self
            .ledger
            .handle_withdrawal(movement, self.withdrawal_cap, Ok)?;

        let checkpoint = self.checkpoint();
        self.ledger.apply(event);
        match transfers.push_stable(self, token, account, amount) {
            Ok(true) => {
                debug!(%account, amount, "stable withdrawal");
                Ok(())
            }
            Ok(false) => {
                warn!(%account, amount, "stable push refused");
                self.abort(checkpoint, TransferFailure::default())
            }
            Err(failure) => {
                warn!(%account, amount, "stable push failed");
                self.abort(checkpoint, failure)
            }
        }
    }

    /// Replaces the price source. Only the administrator may call this.
    pub fn set_price_source(
        &mut self,
        caller: Address,
        source: Arc<dyn PriceSource>,
    ) -> Result<(), LedgerError> {
        let current = source.address();
        let previous = self.price_source.replace(caller, source)?;
        self.ledger.apply(LedgerEvent::PriceSourceChanged {
            previous: previous.address(),
            current,
        });
        Ok(())
    }

    pub fn balance_of(&self, account: Address, asset: Address) -> Amount {
        self.ledger.balance_of(account, asset)
    }

    pub fn total_deposited(&self) -> Amount {
        self.ledger.total_deposited()
    }

    pub fn global_cap(&self) -> Amount {
        self.global_cap
    }

    pub fn withdrawal_cap(&self) -> Amount {
        self.withdrawal_cap
    }

    pub fn deposit_count(&self) -> u64 {
        self.ledger.deposit_count()
    }

    pub fn withdrawal_count(&self) -> u64 {
        self.ledger.withdrawal_count()
    }

    pub fn stable_token(&self) -> Address {
        self.stable_token
    }

    pub fn admin(&self) -> Address {
        self.price_source.admin()
    }

    pub fn price_source(&self) -> &Arc<dyn PriceSource> {
        self.price_source.current()
    }

    /// Notifications in the order they were committed.
    pub fn events(&self) -> &[LedgerEvent] {
        self.ledger.events()
    }

    /// Non-zero balances as `(account, asset, amount)`, in no particular order.
    pub fn balances(&self) -> impl Iterator<Item = (Address, Address, Amount)> + '_ {
        self.ledger.balances()
    }

    fn ensure_stable(&self, token: Address) -> Result<(), LedgerError> {
        if token != self.stable_token {
            return Err(LedgerError::UnsupportedAsset { asset: token });
        }
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            journal: self.ledger.mark(),
            price_source: Arc::clone(self.price_source.current()),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.ledger.rollback(checkpoint.journal);
        self.price_source.restore(checkpoint.price_source);
    }

    fn abort(&mut self, checkpoint: Checkpoint, failure: TransferFailure) -> Result<(), LedgerError> {
        self.rollback(checkpoint);
        Err(LedgerError::TransferFailed {
            payload: failure.payload,
        })
    }
}
