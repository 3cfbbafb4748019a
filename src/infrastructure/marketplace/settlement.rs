//! Asset movement shared by every marketplace

use solana_sdk::pubkey::Pubkey;

use super::{FillReceipt, Fulfillment};
use crate::domain::asset::Asset;
use crate::domain::ledger::{Ledger, OrderStatus};
use crate::domain::order::{Order, OrderKind};
use crate::shared::errors::MarketplaceError;

/// Checks every protocol applies regardless of its order format
pub(crate) fn check_common(
    ledger: &Ledger,
    order: &Order,
    expected: OrderKind,
) -> Result<(), MarketplaceError> {
    if order.kind != expected {
        return Err(MarketplaceError::WrongOrderKind { expected: expected.as_str() });
    }
    if order.is_expired(ledger.now()) {
        return Err(MarketplaceError::OrderExpired(order.id));
    }
    if !order.is_full_fill() {
        return Err(MarketplaceError::PartialFillUnsupported {
            numerator: order.numerator,
            denominator: order.denominator,
        });
    }
    match (expected, order.payment) {
        // makers cannot pre-authorize native value, offers need a fungible payment
        (_, Asset::NonFungible(..)) | (OrderKind::Offer, Asset::Native) => {
            return Err(MarketplaceError::UnsupportedPayment(order.payment));
        }
        _ => {}
    }
    order.proceeds()?;
    Ok(())
}

fn pay(
    ledger: &mut Ledger,
    marketplace: Pubkey,
    payment: Asset,
    from: Pubkey,
    to: Pubkey,
    amount: u64,
) -> Result<(), MarketplaceError> {
    match payment {
        Asset::Native => ledger.transfer_native(from, to, amount)?,
        Asset::Fungible(token) => {
            ledger.transfer_fungible_from(marketplace, token, from, to, amount)?
        }
        Asset::NonFungible(..) => return Err(MarketplaceError::UnsupportedPayment(payment)),
    }
    Ok(())
}

pub(crate) fn settle_listing(
    ledger: &mut Ledger,
    marketplace: Pubkey,
    fulfillment: &Fulfillment<'_>,
) -> Result<FillReceipt, MarketplaceError> {
    let order = fulfillment.order;
    let proceeds = order.proceeds()?;

    pay(ledger, marketplace, order.payment, fulfillment.taker, order.maker, proceeds)?;
    for fee in &order.fees {
        pay(ledger, marketplace, order.payment, fulfillment.taker, fee.recipient, fee.amount)?;
    }
    ledger.transfer_from(marketplace, order.maker, fulfillment.recipient, &order.item)?;
    ledger.set_order_status(marketplace, order.id, OrderStatus::Filled);

    Ok(FillReceipt {
        order_id: order.id,
        item: order.item,
        price: order.price,
        proceeds,
    })
}

pub(crate) fn settle_offer(
    ledger: &mut Ledger,
    marketplace: Pubkey,
    fulfillment: &Fulfillment<'_>,
) -> Result<FillReceipt, MarketplaceError> {
    let order = fulfillment.order;
    let proceeds = order.proceeds()?;
    let item = order.resolved_item(fulfillment.proof.as_ref())?;

    ledger.transfer_from(marketplace, fulfillment.taker, order.maker, &item)?;
    pay(ledger, marketplace, order.payment, order.maker, fulfillment.recipient, proceeds)?;
    for fee in &order.fees {
        pay(ledger, marketplace, order.payment, order.maker, fee.recipient, fee.amount)?;
    }
    ledger.set_order_status(marketplace, order.id, OrderStatus::Filled);

    Ok(FillReceipt {
        order_id: order.id,
        item,
        price: order.price,
        proceeds,
    })
}
