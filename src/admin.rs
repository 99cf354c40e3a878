use std::sync::Arc;

use tracing::info;

use crate::{address::Address, ledger::LedgerError, valuation::PriceSource};

/// The active price source plus the one principal allowed to replace it.
#[derive(Debug, Clone)]
pub struct PriceSourceCell {
    admin: Address,
    source: Arc<dyn PriceSource>,
}

impl PriceSourceCell {
    pub fn new(admin: Address, source: Arc<dyn PriceSource>) -> Result<Self, LedgerError> {
        if source.address().is_zero() {
            return Err(LedgerError::InvalidConfiguration("price source must not be null"));
        }
        Ok(Self { admin, source })
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn current(&self) -> &Arc<dyn PriceSource> {
        &self.source
    }

    /// Swaps in `source` and hands back the one it replaced.
    pub fn replace(
        &mut self,
        caller: Address,
        source: Arc<dyn PriceSource>,
    ) -> Result<Arc<dyn PriceSource>, LedgerError> {
        if caller != self.admin {
            return Err(LedgerError::Unauthorized { caller });
        }
        if source.address().is_zero() {
            return Err(LedgerError::InvalidConfiguration("price source must not be null"));
        }
        info!(previous = %self.source.address(), current = %source.address(), "price source replaced");
        Ok(std::mem::replace(&mut self.source, source))
    }

    pub(crate) fn restore(&mut self, source: Arc<dyn PriceSource>) {
        self.source = source;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::ManualPriceFeed;

    fn feed(id: u64) -> Arc<dyn PriceSource> {
        Arc::new(ManualPriceFeed::new(Address::from_low_u64(id), 1, 8))
    }

    #[test]
    fn null_source_rejected() {
        let err = PriceSourceCell::new(Address::from_low_u64(1), feed(0)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfiguration(_)));

        let mut cell = PriceSourceCell::new(Address::from_low_u64(1), feed(5)).unwrap();
        let err = cell.replace(Address::from_low_u64(1), feed(0)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfiguration(_)));
        assert_eq!(cell.current().address(), Address::from_low_u64(5));
    }

    #[test]
    fn only_admin_replaces() {
        let admin = Address::from_low_u64(1);
        let mut cell = PriceSourceCell::new(admin, feed(5)).unwrap();

        let intruder = Address::from_low_u64(2);
        let err = cell.replace(intruder, feed(6)).unwrap_err();
        assert_eq!(err, LedgerError::Unauthorized { caller: intruder });

        let previous = cell.replace(admin, feed(6)).unwrap();
        assert_eq!(previous.address(), Address::from_low_u64(5));
        assert_eq!(cell.current().address(), Address::from_low_u64(6));
        assert_eq!(cell.admin(), admin);
    }
}
