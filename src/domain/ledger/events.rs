//! Signals recorded on the ledger for external consumers

use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use crate::domain::asset::Holding;
use crate::domain::order::OrderKind;

/// Emitted by an adapter module for every successful fill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillCompleted {
    /// Batch step that produced the fill
    pub step: usize,
    pub module: Pubkey,
    pub marketplace: &'static str,
    pub order_id: Uuid,
    pub kind: OrderKind,
    pub maker: Pubkey,
    pub item: Holding,
    pub price: u64,
    pub fill_to: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    FillCompleted(FillCompleted),
    ResidualSwept { from: Pubkey, to: Pubkey, holding: Holding },
}

/// Per-marketplace order lifecycle as tracked on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Posted,
    Filled,
    Cancelled,
}
