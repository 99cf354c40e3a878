use crate::{address::Address, ledger::Amount, vault::Vault};

pub mod in_memory_custody;

/// Reported by a transfer that did not go through, with whatever the
/// receiving side returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferFailure {
    pub payload: Vec<u8>,
}

impl TransferFailure {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Moves value between the vault's custody and outside parties.
///
/// Each call gets the vault back as `vault`: a recipient may call into it
/// again before the transfer returns, which is how nested invocation is
/// modelled.
pub trait TransferAdapter {
    fn push_native(
        &mut self,
        vault: &mut Vault,
        to: Address,
        amount: Amount,
    ) -> Result<(), TransferFailure>;

    /// `Ok(false)` is the stable asset refusing the transfer without erroring.
    fn push_stable(
        &mut self,
        vault: &mut Vault,
        token: Address,
        to: Address,
        amount: Amount,
    ) -> Result<bool, TransferFailure>;

    /// Pulls from `from` against an allowance it granted to the vault.
    fn pull_stable(
        &mut self,
        vault: &mut Vault,
        token: Address,
        from: Address,
        amount: Amount,
    ) -> Result<bool, TransferFailure>;
}
