//! Balance-assert module - aborts a batch whose premise no longer holds

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::domain::asset::Asset;
use crate::domain::execution::{decode_payload, CallContext, Module, StepPolicy};
use crate::shared::errors::{LedgerError, ModuleError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreconditionCall {
    AssertOwnerOrBalance { asset: Asset, holder: Pubkey, amount: u64 },
}

/// Read-only; never moves assets
pub struct PreconditionModule {
    address: Pubkey,
}

impl PreconditionModule {
    pub fn new(address: Pubkey) -> Self {
        Self { address }
    }
}

impl Module for PreconditionModule {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn name(&self) -> &str {
        "precondition"
    }

    fn policy(&self, _payload: &[u8]) -> StepPolicy {
        StepPolicy::fatal()
    }

    fn call(&self, ctx: &mut CallContext<'_>, payload: &[u8]) -> Result<(), ModuleError> {
        if ctx.value > 0 {
            return Err(ModuleError::UnexpectedValue(ctx.value));
        }
        let PreconditionCall::AssertOwnerOrBalance { asset, holder, amount } =
            decode_payload::<PreconditionCall>(payload)?;

        let actual = ctx.ledger.balance_of(&holder, &asset);
        let holds = match asset {
            Asset::NonFungible(..) => {
                if amount != 1 {
                    return Err(LedgerError::InvalidNonFungibleAmount(amount).into());
                }
                actual == 1
            }
            Asset::Native | Asset::Fungible(_) => actual >= amount,
        };
        if !holds {
            return Err(ModuleError::PreconditionFailed { asset, holder, expected: amount, actual });
        }
        debug!(%asset, %holder, amount, "Precondition holds");
        Ok(())
    }
}
