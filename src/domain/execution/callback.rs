//! Approval-less entry point: an item transfer that carries its own batch

use solana_sdk::pubkey::Pubkey;
use tracing::info;

use super::{Batch, ExecutionReport, Router};
use crate::domain::asset::Asset;
use crate::domain::ledger::Ledger;
use crate::shared::errors::{ModuleError, RouterError};

/// A holder sending `collection#token_id` to module `to`, with an encoded
/// batch in the transfer's data field
#[derive(Debug, Clone)]
pub struct InboundTransfer {
    pub from: Pubkey,
    pub to: Pubkey,
    pub collection: Pubkey,
    pub token_id: u64,
    pub data: Vec<u8>,
}

impl Router {
    /// Deliver the item and run the embedded batch as one unit. Any failure
    /// undoes the transfer itself, so the holder keeps the item.
    pub fn transfer_with_batch(
        &self,
        ledger: &mut Ledger,
        transfer: InboundTransfer,
    ) -> Result<ExecutionReport, RouterError> {
        let receiver = self
            .module(&transfer.to)
            .ok_or(RouterError::UnknownModule(transfer.to))?
            .clone();
        let asset = Asset::NonFungible(transfer.collection, transfer.token_id);

        info!(
            from = %transfer.from,
            module = receiver.name(),
            %asset,
            data_len = transfer.data.len(),
            "Inbound transfer with batch"
        );

        ledger.atomically(|ledger| {
            ledger.transfer_non_fungible(
                transfer.collection,
                transfer.token_id,
                transfer.from,
                transfer.to,
            )?;

            let batch = Batch::decode(&transfer.data)?;
            let consuming = batch
                .steps
                .iter()
                .find(|step| step.module == transfer.to)
                .ok_or_else(|| RouterError::CallbackRejected {
                    module: transfer.to,
                    source: ModuleError::TransferRejected(
                        "no step consumes the transferred item".to_string(),
                    ),
                })?;
            receiver
                .accepts_inbound(&asset, &transfer.from, consuming)
                .map_err(|source| RouterError::CallbackRejected { module: transfer.to, source })?;

            self.execute(ledger, transfer.from, &batch, 0)
        })
    }
}
