use std::io::Write;

use crate::{
    address::Address,
    command::{UnitScales, from_units},
    ledger::Amount,
};
use anyhow::Context;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Balance {
    account: Address,
    asset: Address,
    balance: Decimal,
}

/// Writes balances as CSV, ordered by account then asset, with amounts
/// converted from smallest units to whole units of their asset.
pub fn print_balances<W>(
    output: &mut W,
    balances: impl Iterator<Item = (Address, Address, Amount)>,
    scales: UnitScales,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut balances: Vec<_> = balances.collect();
    balances.sort_unstable();

    let mut writer = Writer::from_writer(output);
    for (account, asset, amount) in balances {
        let decimals = if asset == Address::NATIVE {
            scales.native_decimals
        } else {
            scales.stable_decimals
        };
        let balance = from_units(amount, decimals)
            .with_context(|| format!("Balance of {account} does not fit a decimal"))?;
        writer
            .serialize(Balance {
                account,
                asset,
                balance,
            })
            .context("Failed to write to CSV")?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_and_scaled() {
        let usdc = Address::from_low_u64(0xc0);
        let alice = Address::from_low_u64(0xa1);
        let bob = Address::from_low_u64(0xb0);
        let scales = UnitScales {
            native_decimals: 18,
            stable_decimals: 6,
            price_decimals: 8,
        };
        let balances = vec![
            (bob, usdc, 1_250_000),
            (alice, usdc, 3),
            (alice, Address::NATIVE, 400_000_000_000_000_000),
        ];

        let mut output = Vec::new();
        print_balances(&mut output, balances.into_iter(), scales).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "\
account,asset,balance
0x00000000000000000000000000000000000000a1,0x0000000000000000000000000000000000000000,0.4
0x00000000000000000000000000000000000000a1,0x00000000000000000000000000000000000000c0,0.000003
0x00000000000000000000000000000000000000b0,0x00000000000000000000000000000000000000c0,1.25
"
        );
    }
}
