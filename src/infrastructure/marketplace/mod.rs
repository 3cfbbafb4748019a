//! External trading protocols the adapter modules fill orders against

pub mod bazaar;
pub mod bulletin;
pub mod factory;
mod settlement;
pub mod traits;

pub use bazaar::Bazaar;
pub use bulletin::Bulletin;
pub use factory::MarketplaceFactory;
pub use traits::Marketplace;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use crate::domain::asset::Holding;
use crate::domain::order::{CriteriaProof, Order};

/// Supported marketplace protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketplaceKind {
    /// Signed off-ledger orders
    Bazaar,
    /// Orders posted on the ledger by their maker
    Bulletin,
}

impl MarketplaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketplaceKind::Bazaar => "bazaar",
            MarketplaceKind::Bulletin => "bulletin",
        }
    }
}

impl std::fmt::Display for MarketplaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single fill request against a maker order
#[derive(Debug, Clone)]
pub struct Fulfillment<'a> {
    pub order: &'a Order,
    /// Account paying (listings) or delivering the item (offers)
    pub taker: Pubkey,
    /// Receives the item (listings) or the proceeds (offers)
    pub recipient: Pubkey,
    pub proof: Option<CriteriaProof>,
}

/// Outcome of a completed fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillReceipt {
    pub order_id: Uuid,
    pub item: Holding,
    pub price: u64,
    /// Price minus maker-embedded fees
    pub proceeds: u64,
}
