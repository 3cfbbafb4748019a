use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;

use super::bazaar::Bazaar;
use super::bulletin::Bulletin;
use super::traits::Marketplace;
use super::MarketplaceKind;

/// Factory for creating marketplace handles
pub struct MarketplaceFactory;

impl MarketplaceFactory {
    /// Create a marketplace of the given kind deployed at `address`
    pub fn create(kind: MarketplaceKind, address: Pubkey) -> Arc<dyn Marketplace> {
        match kind {
            MarketplaceKind::Bazaar => Arc::new(Bazaar::new(address)),
            MarketplaceKind::Bulletin => Arc::new(Bulletin::new(address)),
        }
    }

    /// Get all available marketplace kinds
    pub fn available_kinds() -> Vec<MarketplaceKind> {
        vec![MarketplaceKind::Bazaar, MarketplaceKind::Bulletin]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creates_each_kind() {
        for kind in MarketplaceFactory::available_kinds() {
            let address = Pubkey::new_unique();
            let marketplace = MarketplaceFactory::create(kind, address);
            assert_eq!(marketplace.kind(), kind);
            assert_eq!(marketplace.address(), address);
        }
    }
}
