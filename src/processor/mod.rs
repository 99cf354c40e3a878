use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    address::Address,
    command::{OperationKind, VaultCommandError},
    ledger::LedgerError,
    transfer::in_memory_custody::CustodyError,
};

pub mod in_memory_processor;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Malformed operation row: {0}")]
    RowErr(#[from] csv::Error),
    #[error(transparent)]
    CommandErr(#[from] VaultCommandError),
    #[error(transparent)]
    VaultErr(#[from] LedgerError),
    #[error(transparent)]
    CustodyErr(#[from] CustodyError),
}

pub trait OperationProcessor {
    fn process_operation(
        &mut self,
        kind: OperationKind,
        caller: Option<Address>,
        token: Option<Address>,
        amount: Option<Decimal>,
    ) -> Result<(), OperationError>;
}
