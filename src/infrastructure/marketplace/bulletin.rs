use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use super::traits::Marketplace;
use super::MarketplaceKind;
use crate::domain::ledger::{Ledger, OrderStatus};
use crate::domain::order::Order;
use crate::shared::errors::MarketplaceError;

/// Bulletin marketplace
/// Makers post orders on the ledger up front; no signature is carried.
pub struct Bulletin {
    address: Pubkey,
}

impl Bulletin {
    pub fn new(address: Pubkey) -> Self {
        Self { address }
    }

    /// Make `order` fillable. Only the maker can post, and only once.
    pub fn post(
        &self,
        ledger: &mut Ledger,
        caller: Pubkey,
        order: &Order,
    ) -> Result<(), MarketplaceError> {
        if caller != order.maker {
            return Err(MarketplaceError::NotMaker(order.id, caller));
        }
        if ledger.order_status(&self.address, &order.id).is_some() {
            return Err(MarketplaceError::OrderNotFillable(order.id));
        }
        ledger.set_order_status(self.address, order.id, OrderStatus::Posted);
        debug!(order_id = %order.id, maker = %order.maker, "Order posted to bulletin");
        Ok(())
    }
}

impl Marketplace for Bulletin {
    fn kind(&self) -> MarketplaceKind {
        MarketplaceKind::Bulletin
    }

    fn address(&self) -> Pubkey {
        self.address
    }

    fn validate(&self, ledger: &Ledger, order: &Order) -> Result<(), MarketplaceError> {
        match ledger.order_status(&self.address, &order.id) {
            Some(OrderStatus::Posted) => Ok(()),
            None => Err(MarketplaceError::OrderNotPosted(order.id)),
            Some(_) => Err(MarketplaceError::OrderNotFillable(order.id)),
        }
    }

    fn cancel(
        &self,
        ledger: &mut Ledger,
        caller: Pubkey,
        order: &Order,
    ) -> Result<(), MarketplaceError> {
        if caller != order.maker {
            return Err(MarketplaceError::NotMaker(order.id, caller));
        }
        ledger.set_order_status(self.address, order.id, OrderStatus::Cancelled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::{Asset, Holding};
    use crate::infrastructure::marketplace::Fulfillment;
    use chrono::{Duration, Utc};

    #[test]
    fn test_offer_requires_posting() {
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let wrapped = ledger.wrapped_token();
        let bulletin = Bulletin::new(Pubkey::new_unique());
        let buyer = Pubkey::new_unique();
        let taker = Pubkey::new_unique();
        let collection = Pubkey::new_unique();

        ledger.mint_native(buyer, 300).unwrap();
        ledger.wrap(buyer, 300).unwrap();
        ledger.approve(wrapped, buyer, bulletin.address(), 300);
        ledger.mint_non_fungible(collection, 4, taker).unwrap();
        ledger.set_approval_for_all(collection, taker, bulletin.address(), true);

        let order = Order::offer(
            buyer,
            Holding::non_fungible(collection, 4),
            Asset::Fungible(wrapped),
            300,
            Utc::now() + Duration::hours(1),
        );
        let fulfillment = Fulfillment { order: &order, taker, recipient: taker, proof: None };

        assert_eq!(
            bulletin.fulfill_offer(&mut ledger, &fulfillment).unwrap_err(),
            MarketplaceError::OrderNotPosted(order.id)
        );

        bulletin.post(&mut ledger, buyer, &order).unwrap();
        let receipt = bulletin.fulfill_offer(&mut ledger, &fulfillment).unwrap();

        assert_eq!(receipt.proceeds, 300);
        assert_eq!(ledger.owner_of(&collection, 4), Some(buyer));
        assert_eq!(ledger.fungible_balance(&wrapped, &taker), 300);
        assert!(bulletin.post(&mut ledger, buyer, &order).is_err());
    }

    #[test]
    fn test_native_offer_is_unsupported() {
        let mut ledger = Ledger::new(Pubkey::new_unique());
        let bulletin = Bulletin::new(Pubkey::new_unique());
        let buyer = Pubkey::new_unique();
        let order = Order::offer(
            buyer,
            Holding::non_fungible(Pubkey::new_unique(), 1),
            Asset::Native,
            10,
            Utc::now() + Duration::hours(1),
        );
        bulletin.post(&mut ledger, buyer, &order).unwrap();
        let fulfillment = Fulfillment {
            order: &order,
            taker: buyer,
            recipient: buyer,
            proof: None,
        };

        assert_eq!(
            bulletin.fulfill_offer(&mut ledger, &fulfillment).unwrap_err(),
            MarketplaceError::UnsupportedPayment(Asset::Native)
        );
    }
}
