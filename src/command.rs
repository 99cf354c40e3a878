use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::{address::Address, ledger::Amount};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    DepositNative,
    DepositStable,
    WithdrawNative,
    WithdrawStable,
    Receive,
    Approve,
    SetPrice,
    SetPriceSource,
}

/// Precision used to turn human amounts into smallest units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitScales {
    pub native_decimals: u32,
    pub stable_decimals: u32,
    pub price_decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultCommand {
    DepositNative {
        caller: Address,
        amount: Amount,
    },
    DepositStable {
        caller: Address,
        token: Address,
        amount: Amount,
    },
    WithdrawNative {
        caller: Address,
        amount: Amount,
    },
    WithdrawStable {
        caller: Address,
        token: Address,
        amount: Amount,
    },
    Receive {
        caller: Address,
        amount: Amount,
    },
    Approve {
        caller: Address,
        token: Address,
        amount: Amount,
    },
    SetPrice {
        answer: i128,
    },
    SetPriceSource {
        caller: Address,
        source: Address,
        answer: i128,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VaultCommandError {
    #[error("Caller is required for {kind:?}")]
    CallerRequired { kind: OperationKind },
    #[error("Token is required for {kind:?}")]
    TokenRequired { kind: OperationKind },
    #[error("Amount is required for {kind:?}")]
    AmountRequired { kind: OperationKind },
    #[error("Amount must not be negative for {kind:?}")]
    NegativeAmount { kind: OperationKind },
    #[error("Amount for {kind:?} has more than {decimals} decimal places")]
    TooPrecise { kind: OperationKind, decimals: u32 },
    #[error("Amount for {kind:?} is out of range")]
    OutOfRange { kind: OperationKind },
}

impl VaultCommand {
    pub fn parse_command(
        kind: OperationKind,
        caller: Option<Address>,
        token: Option<Address>,
        amount: Option<Decimal>,
        scales: &UnitScales,
    ) -> Result<Self, VaultCommandError> {
        let require_caller = || caller.ok_or(VaultCommandError::CallerRequired { kind });
        let require_token = || token.ok_or(VaultCommandError::TokenRequired { kind });
        let units = |decimals| to_units(kind, amount, decimals);

        match kind {
            OperationKind::DepositNative => Ok(Self::DepositNative {
                caller: require_caller()?,
                amount: units(scales.native_decimals)?,
            }),
            OperationKind::DepositStable => Ok(Self::DepositStable {
                caller: require_caller()?,
                token: require_token()?,
                amount: units(scales.stable_decimals)?,
            }),
            OperationKind::WithdrawNative => Ok(Self::WithdrawNative {
                caller: require_caller()?,
                amount: units(scales.native_decimals)?,
            }),
            OperationKind::WithdrawStable => Ok(Self::WithdrawStable {
                caller: require_caller()?,
                token: require_token()?,
                amount: units(scales.stable_decimals)?,
            }),
            OperationKind::Receive => Ok(Self::Receive {
                caller: require_caller()?,
                amount: units(scales.native_decimals)?,
            }),
            OperationKind::Approve => Ok(Self::Approve {
                caller: require_caller()?,
                token: require_token()?,
                amount: units(scales.stable_decimals)?,
            }),
            OperationKind::SetPrice => Ok(Self::SetPrice {
                answer: to_answer(kind, units(scales.price_decimals)?)?,
            }),
            OperationKind::SetPriceSource => Ok(Self::SetPriceSource {
                caller: require_caller()?,
                source: require_token()?,
                answer: to_answer(kind, units(scales.price_decimals)?)?,
            }),
        }
    }
}

/// Scales a human amount like `0.5` to smallest units with `decimals` places.
pub fn to_units(
    kind: OperationKind,
    amount: Option<Decimal>,
    decimals: u32,
) -> Result<Amount, VaultCommandError> {
    let Some(amount) = amount else {
        return Err(VaultCommandError::AmountRequired { kind });
    };
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(VaultCommandError::NegativeAmount { kind });
    }
    let amount = amount.normalize();
    let scale = amount.scale();
    if scale > decimals {
        return Err(VaultCommandError::TooPrecise { kind, decimals });
    }
    10u128
        .checked_pow(decimals - scale)
        .and_then(|factor| amount.mantissa().unsigned_abs().checked_mul(factor))
        .ok_or(VaultCommandError::OutOfRange { kind })
}

fn to_answer(kind: OperationKind, units: Amount) -> Result<i128, VaultCommandError> {
    i128::try_from(units).map_err(|_| VaultCommandError::OutOfRange { kind })
}

/// Inverse of [`to_units`], for display. `None` when the amount does not fit a [`Decimal`].
pub fn from_units(units: Amount, decimals: u32) -> Option<Decimal> {
    let units = i128::try_from(units).ok()?;
    Decimal::try_from_i128_with_scale(units, decimals)
        .ok()
        .map(|amount| amount.normalize())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const SCALES: UnitScales = UnitScales {
        native_decimals: 18,
        stable_decimals: 6,
        price_decimals: 8,
    };

    fn dec(raw: &str) -> Option<Decimal> {
        Some(Decimal::from_str(raw).unwrap())
    }

    fn alice() -> Option<Address> {
        Some(Address::from_low_u64(0xa1))
    }

    fn usdc() -> Option<Address> {
        Some(Address::from_low_u64(0xc0))
    }

    #[test]
    fn parse_commands() {
        let cmd = VaultCommand::parse_command(
            OperationKind::DepositNative,
            alice(),
            None,
            dec("1.5"),
            &SCALES,
        )
        .unwrap();
        assert_eq!(
            cmd,
            VaultCommand::DepositNative {
                caller: Address::from_low_u64(0xa1),
                amount: 1_500_000_000_000_000_000,
            }
        );

        let cmd = VaultCommand::parse_command(
            OperationKind::WithdrawStable,
            alice(),
            usdc(),
            dec("12.25"),
            &SCALES,
        )
        .unwrap();
        assert_eq!(
            cmd,
            VaultCommand::WithdrawStable {
                caller: Address::from_low_u64(0xa1),
                token: Address::from_low_u64(0xc0),
                amount: 12_250_000,
            }
        );

        let cmd =
            VaultCommand::parse_command(OperationKind::SetPrice, None, None, dec("2000"), &SCALES)
                .unwrap();
        assert_eq!(
            cmd,
            VaultCommand::SetPrice {
                answer: 200_000_000_000
            }
        );
    }

    #[test]
    fn reject_incomplete_rows() {
        let err = VaultCommand::parse_command(
            OperationKind::DepositStable,
            alice(),
            None,
            dec("1"),
            &SCALES,
        )
        .unwrap_err();
        assert_eq!(
            err,
            VaultCommandError::TokenRequired {
                kind: OperationKind::DepositStable
            }
        );

        let err =
            VaultCommand::parse_command(OperationKind::Receive, None, None, dec("1"), &SCALES)
                .unwrap_err();
        assert_eq!(
            err,
            VaultCommandError::CallerRequired {
                kind: OperationKind::Receive
            }
        );

        let err =
            VaultCommand::parse_command(OperationKind::WithdrawNative, alice(), None, None, &SCALES)
                .unwrap_err();
        assert_eq!(err.to_string(), "Amount is required for WithdrawNative");
    }

    #[test]
    fn unit_conversion() {
        let kind = OperationKind::DepositStable;
        assert_eq!(to_units(kind, dec("0"), 6).unwrap(), 0);
        assert_eq!(to_units(kind, dec("1.500000"), 6).unwrap(), 1_500_000);
        assert_eq!(
            to_units(kind, dec("-1"), 6).unwrap_err(),
            VaultCommandError::NegativeAmount { kind }
        );
        assert_eq!(
            to_units(kind, dec("0.0000001"), 6).unwrap_err(),
            VaultCommandError::TooPrecise { kind, decimals: 6 }
        );

        assert_eq!(from_units(1_500_000, 6), dec("1.5"));
        assert_eq!(from_units(0, 18), dec("0"));
        assert_eq!(from_units(u128::MAX, 0), None);
    }
}
