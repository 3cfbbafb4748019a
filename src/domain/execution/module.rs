//! The adapter-module protocol the router dispatches to

use solana_sdk::pubkey::Pubkey;

use super::ExecutionStep;
use crate::domain::asset::Asset;
use crate::domain::ledger::Ledger;
use crate::shared::errors::ModuleError;

/// The only part of a payload the router looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    pub revert_if_incomplete: bool,
    /// Where a swallowed step's value goes; the caller when unset
    pub refund_to: Option<Pubkey>,
}

impl StepPolicy {
    /// Failure aborts the whole batch
    pub fn fatal() -> Self {
        Self { revert_if_incomplete: true, refund_to: None }
    }

    pub fn best_effort(refund_to: Pubkey) -> Self {
        Self { revert_if_incomplete: false, refund_to: Some(refund_to) }
    }
}

/// What a module sees while it runs one step
pub struct CallContext<'a> {
    pub ledger: &'a mut Ledger,
    /// Account that submitted the batch
    pub origin: Pubkey,
    /// Native value forwarded with this step, already credited to the module
    pub value: u64,
    /// Index of the step within its batch
    pub step: usize,
}

/// A pluggable step target. New marketplaces are added by implementing this
/// trait and registering the module; the router never changes.
pub trait Module: Send + Sync {
    /// Address the module holds assets under; doubles as its identifier
    fn address(&self) -> Pubkey;

    fn name(&self) -> &str;

    /// Decode just enough of `payload` to tell the router how to treat a failure.
    /// Undecodable payloads must report `StepPolicy::fatal()`.
    fn policy(&self, payload: &[u8]) -> StepPolicy;

    fn call(&self, ctx: &mut CallContext<'_>, payload: &[u8]) -> Result<(), ModuleError>;

    /// Vet an inbound non-fungible transfer against the step that will consume it.
    /// Modules that never take items by transfer reject everything.
    fn accepts_inbound(
        &self,
        asset: &Asset,
        _from: &Pubkey,
        _step: &ExecutionStep,
    ) -> Result<(), ModuleError> {
        Err(ModuleError::TransferRejected(format!(
            "{} does not accept inbound {}",
            self.name(),
            asset
        )))
    }
}
