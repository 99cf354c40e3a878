use std::io::Read;

use crate::{address::Address, command::OperationKind};
use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub caller: Option<Address>,
    pub token: Option<Address>,
    pub amount: Option<Decimal>,
}

/// Parses an operation list in CSV format
pub struct CsvOperationParser<R> {
    iter: DeserializeRecordsIntoIter<R, Operation>,
}

impl<R> CsvOperationParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvOperationParser<R>
where
    R: Read,
{
    type Item = (u64, csv::Result<Operation>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rows() {
        let input = "\
type,caller,token,amount
deposit_native, 0x00000000000000000000000000000000000000a1, , 1.5
set_price,,,2100
withdraw_stable,0x00000000000000000000000000000000000000a1,0x00000000000000000000000000000000000000c0,10
bogus,,,1
";
        let rows: Vec<_> = CsvOperationParser::new(input.as_bytes()).collect();
        assert_eq!(rows.len(), 4);

        let (_, first) = &rows[0];
        let first = first.as_ref().unwrap();
        assert_eq!(first.kind, OperationKind::DepositNative);
        assert_eq!(first.caller, Some(Address::from_low_u64(0xa1)));
        assert_eq!(first.token, None);
        assert_eq!(first.amount, Some(Decimal::new(15, 1)));

        let (_, second) = &rows[1];
        let second = second.as_ref().unwrap();
        assert_eq!(second.kind, OperationKind::SetPrice);
        assert_eq!(second.caller, None);

        let (_, third) = &rows[2];
        assert_eq!(
            third.as_ref().unwrap().token,
            Some(Address::from_low_u64(0xc0))
        );

        assert!(rows[3].1.is_err());
    }
}
