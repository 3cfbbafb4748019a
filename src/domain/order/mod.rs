//! Order domain - signed maker orders and per-fill directives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::asset::{Asset, Holding};
use crate::shared::errors::MarketplaceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Maker sells `item` for `price`
    Listing,
    /// Maker buys `item` for `price`
    Offer,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Listing => "listing",
            OrderKind::Offer => "offer",
        }
    }
}

/// Which token ids satisfy an offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criteria {
    /// Only the id carried by the order item
    Exact,
    AnyOf(BTreeSet<u64>),
    /// Any id of the item's collection
    Collection,
}

/// Resolves a criteria-based offer to a concrete token id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaProof {
    pub token_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub recipient: Pubkey,
    pub amount: u64,
}

/// Sum of fee amounts, `None` on overflow
pub fn total_fees(fees: &[Fee]) -> Option<u64> {
    fees.iter().try_fold(0u64, |acc, fee| acc.checked_add(fee.amount))
}

/// Per-call directive owned by whoever builds the step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillConfig {
    pub fill_to: Pubkey,
    pub refund_to: Pubkey,
    pub revert_if_incomplete: bool,
    /// Cap on what this fill may spend
    pub amount: Option<u64>,
}

impl FillConfig {
    pub fn atomic(fill_to: Pubkey, refund_to: Pubkey) -> Self {
        Self { fill_to, refund_to, revert_if_incomplete: true, amount: None }
    }

    pub fn best_effort(fill_to: Pubkey, refund_to: Pubkey) -> Self {
        Self { fill_to, refund_to, revert_if_incomplete: false, amount: None }
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// A maker order as normalized by the off-chain service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub kind: OrderKind,
    pub maker: Pubkey,
    pub item: Holding,
    pub criteria: Criteria,
    pub payment: Asset,
    /// Total paid by the buying side, including `fees`
    pub price: u64,
    /// Maker-embedded fee entries paid out of `price`
    pub fees: Vec<Fee>,
    pub expiry: DateTime<Utc>,
    pub numerator: u64,
    pub denominator: u64,
    pub signature: Vec<u8>,
}

impl Order {
    pub fn listing(
        maker: Pubkey,
        item: Holding,
        payment: Asset,
        price: u64,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self::new(OrderKind::Listing, maker, item, payment, price, expiry)
    }

    pub fn offer(
        maker: Pubkey,
        item: Holding,
        payment: Asset,
        price: u64,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self::new(OrderKind::Offer, maker, item, payment, price, expiry)
    }

    fn new(
        kind: OrderKind,
        maker: Pubkey,
        item: Holding,
        payment: Asset,
        price: u64,
        expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            maker,
            item,
            criteria: Criteria::Exact,
            payment,
            price,
            fees: Vec::new(),
            expiry,
            numerator: 1,
            denominator: 1,
            signature: Vec::new(),
        }
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn with_fee(mut self, recipient: Pubkey, amount: u64) -> Self {
        self.fees.push(Fee { recipient, amount });
        self
    }

    pub fn with_fill_ratio(mut self, numerator: u64, denominator: u64) -> Self {
        self.numerator = numerator;
        self.denominator = denominator;
        self
    }

    /// Maker endorsement over the order id. Stands in for the protocol's
    /// own signature scheme, which the router never inspects.
    pub fn endorsement(&self) -> Vec<u8> {
        let mut bytes = self.maker.to_bytes().to_vec();
        bytes.extend_from_slice(self.id.as_bytes());
        bytes
    }

    pub fn signed(mut self) -> Self {
        self.signature = self.endorsement();
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    pub fn is_full_fill(&self) -> bool {
        self.numerator == 1 && self.denominator == 1
    }

    /// What the selling side keeps after maker-embedded fees
    pub fn proceeds(&self) -> Result<u64, MarketplaceError> {
        let fees = total_fees(&self.fees).ok_or(MarketplaceError::FeesExceedPrice {
            fees: u64::MAX,
            price: self.price,
        })?;
        self.price
            .checked_sub(fees)
            .ok_or(MarketplaceError::FeesExceedPrice { fees, price: self.price })
    }

    /// Token id this fill delivers, resolved against the order criteria
    pub fn resolve_token_id(
        &self,
        proof: Option<&CriteriaProof>,
    ) -> Result<Option<u64>, MarketplaceError> {
        let Asset::NonFungible(_, item_id) = self.item.asset else {
            return Ok(None);
        };
        match (&self.criteria, proof) {
            (Criteria::Exact, None) => Ok(Some(item_id)),
            (Criteria::Exact, Some(proof)) if proof.token_id == item_id => Ok(Some(item_id)),
            (Criteria::AnyOf(ids), Some(proof)) if ids.contains(&proof.token_id) => {
                Ok(Some(proof.token_id))
            }
            (Criteria::Exact | Criteria::AnyOf(_), Some(proof)) => {
                Err(MarketplaceError::CriteriaMismatch { token_id: proof.token_id })
            }
            (Criteria::Collection, Some(proof)) => Ok(Some(proof.token_id)),
            (_, None) => Err(MarketplaceError::MissingProof),
        }
    }

    /// The concrete holding delivered by a fill
    pub fn resolved_item(
        &self,
        proof: Option<&CriteriaProof>,
    ) -> Result<Holding, MarketplaceError> {
        match (self.item.asset, self.resolve_token_id(proof)?) {
            (Asset::NonFungible(collection, _), Some(id)) => {
                Ok(Holding::non_fungible(collection, id))
            }
            _ => Ok(self.item),
        }
    }
}
