//! Asset domain - native, fungible and non-fungible holdings

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Tagged asset identity. Equality is by discriminant, address and (for
/// non-fungibles) token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Fungible(Pubkey),
    NonFungible(Pubkey, u64),
}

impl Asset {
    pub fn is_non_fungible(&self) -> bool {
        matches!(self, Asset::NonFungible(..))
    }

    /// Token or collection address, `None` for the native asset
    pub fn address(&self) -> Option<Pubkey> {
        match self {
            Asset::Native => None,
            Asset::Fungible(token) => Some(*token),
            Asset::NonFungible(collection, _) => Some(*collection),
        }
    }

    /// Same asset family and address, ignoring the token id
    pub fn same_collection(&self, other: &Asset) -> bool {
        match (self, other) {
            (Asset::NonFungible(a, _), Asset::NonFungible(b, _)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Fungible(token) => write!(f, "fungible:{}", token),
            Asset::NonFungible(collection, id) => write!(f, "nft:{}#{}", collection, id),
        }
    }
}

/// An amount of a given asset. Non-fungible holdings always carry amount 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Holding {
    pub asset: Asset,
    pub amount: u64,
}

impl Holding {
    pub fn native(amount: u64) -> Self {
        Self { asset: Asset::Native, amount }
    }

    pub fn fungible(token: Pubkey, amount: u64) -> Self {
        Self { asset: Asset::Fungible(token), amount }
    }

    pub fn non_fungible(collection: Pubkey, id: u64) -> Self {
        Self { asset: Asset::NonFungible(collection, id), amount: 1 }
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.asset {
            Asset::NonFungible(..) => write!(f, "{}", self.asset),
            _ => write!(f, "{} {}", self.amount, self.asset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_identity() {
        let collection = Pubkey::new_unique();
        let token = Pubkey::new_unique();

        assert_eq!(Asset::NonFungible(collection, 1), Asset::NonFungible(collection, 1));
        assert_ne!(Asset::NonFungible(collection, 1), Asset::NonFungible(collection, 2));
        assert_ne!(Asset::Fungible(token), Asset::Fungible(collection));
        assert_ne!(Asset::Fungible(token), Asset::Native);
        let first = Asset::NonFungible(collection, 1);
        assert!(first.same_collection(&Asset::NonFungible(collection, 7)));
    }

    #[test]
    fn test_non_fungible_holding_amount_is_one() {
        let holding = Holding::non_fungible(Pubkey::new_unique(), 42);
        assert_eq!(holding.amount, 1);
        assert!(holding.asset.is_non_fungible());
        assert_eq!(holding.asset.address().is_some(), true);
    }
}
