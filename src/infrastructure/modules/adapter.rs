//! Protocol adapter module - fills listings and offers on one marketplace

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::asset::{Asset, Holding};
use crate::domain::execution::{decode_payload, CallContext, ExecutionStep, Module, StepPolicy};
use crate::domain::ledger::{FillCompleted, Ledger, LedgerEvent};
use crate::domain::order::{total_fees, CriteriaProof, Fee, FillConfig, Order};
use crate::infrastructure::marketplace::{FillReceipt, Fulfillment, Marketplace};
use crate::shared::errors::{LedgerError, ModuleError};

/// Step payload understood by every adapter module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterCall {
    /// Buy the listed item. `fees` are paid by the caller on top of the price.
    AcceptListing {
        order: Order,
        fill: FillConfig,
        fees: Vec<Fee>,
    },
    /// Sell a held item into the offer. `fees` are cut from the proceeds.
    AcceptOffer {
        order: Order,
        proof: Option<CriteriaProof>,
        fill: FillConfig,
        fees: Vec<Fee>,
    },
}

impl AdapterCall {
    pub fn order(&self) -> &Order {
        match self {
            AdapterCall::AcceptListing { order, .. } | AdapterCall::AcceptOffer { order, .. } => {
                order
            }
        }
    }

    pub fn fill(&self) -> &FillConfig {
        match self {
            AdapterCall::AcceptListing { fill, .. } | AdapterCall::AcceptOffer { fill, .. } => fill,
        }
    }
}

/// Translates a marketplace's order format into the router's step contract
pub struct AdapterModule {
    address: Pubkey,
    name: String,
    marketplace: Arc<dyn Marketplace>,
}

impl AdapterModule {
    pub fn new(address: Pubkey, marketplace: Arc<dyn Marketplace>) -> Self {
        let name = format!("{}-adapter", marketplace.kind());
        Self { address, name, marketplace }
    }

    pub fn marketplace(&self) -> &Arc<dyn Marketplace> {
        &self.marketplace
    }

    fn accept_listing(
        &self,
        ledger: &mut Ledger,
        value: u64,
        order: &Order,
        fill: &FillConfig,
        fees: &[Fee],
    ) -> Result<FillReceipt, ModuleError> {
        if let Some(cap) = fill.amount {
            if order.price > cap {
                return Err(ModuleError::PriceAboveCap { price: order.price, cap });
            }
        }
        let caller_fees = total_fees(fees).ok_or(LedgerError::Overflow)?;
        let required = order.price.checked_add(caller_fees).ok_or(LedgerError::Overflow)?;
        let available = match order.payment {
            Asset::Native => value,
            other => ledger.balance_of(&self.address, &other),
        };
        if available < required {
            return Err(ModuleError::InsufficientBalance { required, available });
        }

        if let Asset::Fungible(token) = order.payment {
            ledger.approve(token, self.address, self.marketplace.address(), order.price);
        }
        let fulfillment = Fulfillment {
            order,
            taker: self.address,
            recipient: fill.fill_to,
            proof: None,
        };
        let receipt = self.marketplace.fulfill_listing(ledger, &fulfillment)?;
        if let Asset::Fungible(token) = order.payment {
            ledger.approve(token, self.address, self.marketplace.address(), 0);
        }

        for fee in fees {
            let cut = Holding { asset: order.payment, amount: fee.amount };
            ledger.transfer(self.address, fee.recipient, &cut)?;
        }
        Ok(receipt)
    }

    fn accept_offer(
        &self,
        ledger: &mut Ledger,
        order: &Order,
        proof: Option<CriteriaProof>,
        fill: &FillConfig,
        fees: &[Fee],
    ) -> Result<FillReceipt, ModuleError> {
        let item = order.resolved_item(proof.as_ref())?;
        if ledger.balance_of(&self.address, &item.asset) < item.amount {
            return Err(ModuleError::ItemNotHeld(item.asset));
        }

        let operator = self.marketplace.address();
        match item.asset {
            Asset::NonFungible(collection, _) => {
                ledger.set_approval_for_all(collection, self.address, operator, true)
            }
            Asset::Fungible(token) => ledger.approve(token, self.address, operator, item.amount),
            Asset::Native => {}
        }
        let fulfillment = Fulfillment {
            order,
            taker: self.address,
            recipient: self.address,
            proof,
        };
        let receipt = self.marketplace.fulfill_offer(ledger, &fulfillment)?;
        match item.asset {
            Asset::NonFungible(collection, _) => {
                ledger.set_approval_for_all(collection, self.address, operator, false)
            }
            Asset::Fungible(token) => ledger.approve(token, self.address, operator, 0),
            Asset::Native => {}
        }

        let caller_fees = total_fees(fees).ok_or(LedgerError::Overflow)?;
        let remainder = receipt.proceeds.checked_sub(caller_fees).ok_or(
            ModuleError::FeesExceedProceeds { fees: caller_fees, proceeds: receipt.proceeds },
        )?;
        for fee in fees {
            let cut = Holding { asset: order.payment, amount: fee.amount };
            ledger.transfer(self.address, fee.recipient, &cut)?;
        }
        let payout = Holding { asset: order.payment, amount: remainder };
        ledger.transfer(self.address, fill.fill_to, &payout)?;
        Ok(receipt)
    }

    /// Return everything this call brought into the module
    fn refund(
        &self,
        ledger: &mut Ledger,
        value: u64,
        call: &AdapterCall,
        refund_to: Pubkey,
    ) -> Result<(), LedgerError> {
        let native = value.min(ledger.native_balance(&self.address));
        ledger.transfer_native(self.address, refund_to, native)?;

        let order = call.order();
        if let Asset::Fungible(token) = order.payment {
            let held = ledger.fungible_balance(&token, &self.address);
            ledger.transfer_fungible(token, self.address, refund_to, held)?;
        }
        if let AdapterCall::AcceptOffer { proof, .. } = call {
            let item = order.resolved_item(proof.as_ref()).unwrap_or(order.item);
            if ledger.balance_of(&self.address, &item.asset) >= item.amount {
                ledger.transfer(self.address, refund_to, &item)?;
            }
        }
        Ok(())
    }
}

impl Module for AdapterModule {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn policy(&self, payload: &[u8]) -> StepPolicy {
        match decode_payload::<AdapterCall>(payload) {
            Ok(call) => StepPolicy {
                revert_if_incomplete: call.fill().revert_if_incomplete,
                refund_to: Some(call.fill().refund_to),
            },
            Err(_) => StepPolicy::fatal(),
        }
    }

    fn call(&self, ctx: &mut CallContext<'_>, payload: &[u8]) -> Result<(), ModuleError> {
        let call: AdapterCall = decode_payload(payload)?;
        let fill = *call.fill();
        let value = ctx.value;

        let attempt = ctx.ledger.atomically(|ledger| match &call {
            AdapterCall::AcceptListing { order, fill, fees } => {
                self.accept_listing(ledger, value, order, fill, fees)
            }
            AdapterCall::AcceptOffer { order, proof, fill, fees } => {
                self.accept_offer(ledger, order, *proof, fill, fees)
            }
        });

        match attempt {
            Ok(receipt) => {
                match call {
                    // excess value and unspent payment tokens go back
                    AdapterCall::AcceptListing { .. } => {
                        self.refund(ctx.ledger, value, &call, fill.refund_to)?;
                    }
                    // offers consume no value, return all of it
                    AdapterCall::AcceptOffer { .. } => {
                        ctx.ledger.transfer_native(self.address, fill.refund_to, value)?;
                    }
                }
                let order = call.order();
                info!(
                    module = %self.name,
                    order_id = %receipt.order_id,
                    kind = order.kind.as_str(),
                    item = %receipt.item,
                    price = receipt.price,
                    fill_to = %fill.fill_to,
                    "Fill completed"
                );
                ctx.ledger.emit(LedgerEvent::FillCompleted(FillCompleted {
                    step: ctx.step,
                    module: self.address,
                    marketplace: self.marketplace.kind().as_str(),
                    order_id: receipt.order_id,
                    kind: order.kind,
                    maker: order.maker,
                    item: receipt.item,
                    price: receipt.price,
                    fill_to: fill.fill_to,
                }));
                Ok(())
            }
            Err(err) if fill.revert_if_incomplete => Err(err),
            Err(err) => {
                warn!(
                    module = %self.name,
                    order_id = %call.order().id,
                    error = %err,
                    refund_to = %fill.refund_to,
                    "Fill incomplete, refunding"
                );
                self.refund(ctx.ledger, value, &call, fill.refund_to)?;
                Ok(())
            }
        }
    }

    fn accepts_inbound(
        &self,
        asset: &Asset,
        from: &Pubkey,
        step: &ExecutionStep,
    ) -> Result<(), ModuleError> {
        let call: AdapterCall = decode_payload(&step.payload)?;
        let AdapterCall::AcceptOffer { order, proof, .. } = &call else {
            return Err(ModuleError::TransferRejected(
                "consuming step is not an offer fill".to_string(),
            ));
        };
        if order.maker == *from {
            return Err(ModuleError::TransferRejected(format!(
                "{} cannot fill its own offer",
                from
            )));
        }
        let wanted = order.resolved_item(proof.as_ref())?;
        if wanted.asset != *asset {
            return Err(ModuleError::TransferRejected(format!(
                "offer {} wants {}, received {}",
                order.id, wanted.asset, asset
            )));
        }
        debug!(module = %self.name, %asset, %from, "Inbound transfer accepted");
        Ok(())
    }
}
