//! Execution domain - batches, the router and its module protocol

mod callback;
mod module;
mod router;

pub use callback::InboundTransfer;
pub use module::{CallContext, Module, StepPolicy};
pub use router::Router;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use crate::domain::asset::Holding;
use crate::domain::ledger::FillCompleted;
use crate::shared::errors::{ModuleError, RouterError};

/// Encode a module call into an opaque step payload
pub fn encode_payload<T: Serialize>(call: &T) -> Result<Vec<u8>, ModuleError> {
    bincode::serialize(call).map_err(|e| ModuleError::Decode(e.to_string()))
}

pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ModuleError> {
    bincode::deserialize(payload).map_err(|e| ModuleError::Decode(e.to_string()))
}

/// One `(module, payload, value)` triple of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub module: Pubkey,
    pub payload: Vec<u8>,
    pub value: u64,
}

impl ExecutionStep {
    pub fn new<T: Serialize>(module: Pubkey, call: &T, value: u64) -> Result<Self, ModuleError> {
        Ok(Self { module, payload: encode_payload(call)?, value })
    }
}

/// Ordered steps submitted and executed as one unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub steps: Vec<ExecutionStep>,
}

impl Batch {
    pub fn new(steps: Vec<ExecutionStep>) -> Self {
        Self { steps }
    }

    pub fn push(mut self, step: ExecutionStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Sum of per-step values; widened so it cannot overflow
    pub fn total_value(&self) -> u128 {
        self.steps.iter().map(|step| u128::from(step.value)).sum()
    }

    pub fn encode(&self) -> Result<Vec<u8>, RouterError> {
        bincode::serialize(self).map_err(|e| RouterError::MalformedBatch(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, RouterError> {
        bincode::deserialize(data).map_err(|e| RouterError::MalformedBatch(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Executed,
    /// A best-effort step failed; its effects were discarded and its value refunded
    Skipped { reason: String, refunded: u64, refund_to: Pubkey },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub index: usize,
    pub module: Pubkey,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweptResidual {
    pub from: Pubkey,
    pub to: Pubkey,
    pub holding: Holding,
}

/// What a committed batch did
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub execution_id: Uuid,
    pub caller: Pubkey,
    pub attached_value: u64,
    pub steps: Vec<StepReport>,
    pub fills: Vec<FillCompleted>,
    pub swept: Vec<SweptResidual>,
}

impl ExecutionReport {
    pub fn executed(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.outcome == StepOutcome::Executed)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.steps.len() - self.executed()
    }

    /// Fills produced by step `index`. An executed adapter step with none
    /// absorbed its failure and refunded.
    pub fn fills_at(&self, index: usize) -> impl Iterator<Item = &FillCompleted> {
        self.fills.iter().filter(move |fill| fill.step == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_total_value_does_not_overflow() {
        let module = Pubkey::new_unique();
        let batch = Batch::default()
            .push(ExecutionStep { module, payload: vec![], value: u64::MAX })
            .push(ExecutionStep { module, payload: vec![1, 2], value: 2 });
        assert_eq!(batch.total_value(), u128::from(u64::MAX) + 2);
    }

    #[test]
    fn test_batch_encoding_round_trip_and_garbage() {
        let step = ExecutionStep { module: Pubkey::new_unique(), payload: vec![9, 9], value: 7 };
        let batch = Batch::new(vec![step]);
        let bytes = batch.encode().unwrap();
        assert_eq!(Batch::decode(&bytes).unwrap(), batch);
        assert!(matches!(Batch::decode(&[0xff, 0x01]), Err(RouterError::MalformedBatch(_))));
    }
}
