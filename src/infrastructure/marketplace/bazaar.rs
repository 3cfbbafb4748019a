use solana_sdk::pubkey::Pubkey;

use super::traits::Marketplace;
use super::MarketplaceKind;
use crate::domain::ledger::{Ledger, OrderStatus};
use crate::domain::order::Order;
use crate::shared::errors::MarketplaceError;

/// Bazaar marketplace
/// Orders live off-ledger and are authorized by the maker's signature alone.
pub struct Bazaar {
    address: Pubkey,
}

impl Bazaar {
    pub fn new(address: Pubkey) -> Self {
        Self { address }
    }
}

impl Marketplace for Bazaar {
    fn kind(&self) -> MarketplaceKind {
        MarketplaceKind::Bazaar
    }

    fn address(&self) -> Pubkey {
        self.address
    }

    fn validate(&self, ledger: &Ledger, order: &Order) -> Result<(), MarketplaceError> {
        if order.signature != order.endorsement() {
            return Err(MarketplaceError::InvalidSignature(order.id));
        }
        match ledger.order_status(&self.address, &order.id) {
            None | Some(OrderStatus::Posted) => Ok(()),
            Some(OrderStatus::Filled) | Some(OrderStatus::Cancelled) => {
                Err(MarketplaceError::OrderNotFillable(order.id))
            }
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
