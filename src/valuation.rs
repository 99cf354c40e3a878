use std::{fmt, sync::RwLock};

use primitive_types::U256;
use thiserror::Error;

use crate::{address::Address, ledger::Amount};

/// Latest rate reported by a price source, in accounting units per whole native unit,
/// scaled by `10^decimals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSample {
    pub answer: i128,
    pub decimals: u32,
    pub updated_at: u64,
}

/// External provider of the native-to-accounting-unit exchange rate.
pub trait PriceSource: fmt::Debug + Send + Sync {
    fn address(&self) -> Address;

    fn latest(&self) -> PriceSample;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValuationError {
    #[error("Price source reported a negative answer: {answer}")]
    NegativePrice { answer: i128 },
    #[error("Valuation does not fit into 128 bits")]
    Overflow,
}

/// Converts native amounts into accounting units.
///
/// Holds the precision of both sides of the conversion; the rate precision comes
/// with every sample, so replacing the price source with one that reports a
/// different number of decimals needs no reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Valuation {
    native_decimals: u32,
    unit_decimals: u32,
}

impl Valuation {
    pub fn new(native_decimals: u32, unit_decimals: u32) -> Self {
        Self {
            native_decimals,
            unit_decimals,
        }
    }

    /// `amount * answer / 10^(native + rate - unit)`, truncated.
    pub fn value_of(&self, sample: &PriceSample, amount: Amount) -> Result<Amount, ValuationError> {
        if sample.answer < 0 {
            return Err(ValuationError::NegativePrice {
                answer: sample.answer,
            });
        }
        let rate = U256::from(sample.answer.unsigned_abs());
        let product = U256::from(amount)
            .checked_mul(rate)
            .ok_or(ValuationError::Overflow)?;

        let numerator_decimals = i64::from(self.native_decimals) + i64::from(sample.decimals);
        let exponent = numerator_decimals - i64::from(self.unit_decimals);
        let value = if exponent >= 0 {
            match pow10(exponent.unsigned_abs()) {
                Some(divisor) => product / divisor,
                // divisor is larger than any product of two 128-bit numbers
                None => U256::zero(),
            }
        } else {
            pow10(exponent.unsigned_abs())
                .and_then(|factor| product.checked_mul(factor))
                .ok_or(ValuationError::Overflow)?
        };

        if value.bits() > 128 {
            return Err(ValuationError::Overflow);
        }
        Ok(value.low_u128())
    }
}

fn pow10(exponent: u64) -> Option<U256> {
    U256::from(10u8).checked_pow(U256::from(exponent))
}

/// Price source whose answer is set by hand. Backs the scenario runner and tests.
#[derive(Debug)]
pub struct ManualPriceFeed {
    address: Address,
    sample: RwLock<PriceSample>,
}

impl ManualPriceFeed {
    pub fn new(address: Address, answer: i128, decimals: u32) -> Self {
        Self {
            address,
            sample: RwLock::new(PriceSample {
                answer,
                decimals,
                updated_at: 0,
            }),
        }
    }

    pub fn set_answer(&self, answer: i128) {
        let mut sample = self
            .sample
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sample.answer = answer;
        sample.updated_at += 1;
    }
}

impl PriceSource for ManualPriceFeed {
    fn address(&self) -> Address {
        self.address
    }

    fn latest(&self) -> PriceSample {
        *self
            .sample
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
