use solana_sdk::pubkey::Pubkey;

use super::settlement;
use super::{FillReceipt, Fulfillment, MarketplaceKind};
use crate::domain::ledger::Ledger;
use crate::domain::order::{Order, OrderKind};
use crate::shared::errors::MarketplaceError;

/// Trait for external trading protocols
/// This is the boundary the adapter module talks to; each protocol decides
/// on its own whether an order is valid, settlement is shared.
pub trait Marketplace: Send + Sync {
    fn kind(&self) -> MarketplaceKind;

    /// Address the protocol is approved under and records order state for
    fn address(&self) -> Pubkey;

    /// Protocol-specific validity (signature, posting, fill status)
    fn validate(&self, ledger: &Ledger, order: &Order) -> Result<(), MarketplaceError>;

    /// Withdraw an order; only its maker may do so
    fn cancel(
        &self,
        ledger: &mut Ledger,
        caller: Pubkey,
        order: &Order,
    ) -> Result<(), MarketplaceError>;

    /// Taker pays the listing price, the item goes to `fulfillment.recipient`
    fn fulfill_listing(
        &self,
        ledger: &mut Ledger,
        fulfillment: &Fulfillment<'_>,
    ) -> Result<FillReceipt, MarketplaceError> {
        settlement::check_common(ledger, fulfillment.order, OrderKind::Listing)?;
        self.validate(ledger, fulfillment.order)?;
        settlement::settle_listing(ledger, self.address(), fulfillment)
    }

    /// Taker delivers the item, the maker's payment goes to `fulfillment.recipient`
    fn fulfill_offer(
        &self,
        ledger: &mut Ledger,
        fulfillment: &Fulfillment<'_>,
    ) -> Result<FillReceipt, MarketplaceError> {
        settlement::check_common(ledger, fulfillment.order, OrderKind::Offer)?;
        self.validate(ledger, fulfillment.order)?;
        settlement::settle_offer(ledger, self.address(), fulfillment)
    }
}
