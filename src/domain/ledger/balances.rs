//! Balance snapshots for before/after comparisons

use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;

use super::Ledger;
use crate::domain::asset::Asset;

/// Amounts held by a set of actors for a set of assets at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    entries: BTreeMap<(Pubkey, Asset), u64>,
}

impl BalanceSnapshot {
    pub fn capture(ledger: &Ledger, actors: &[Pubkey], assets: &[Asset]) -> Self {
        let mut entries = BTreeMap::new();
        for actor in actors {
            for asset in assets {
                entries.insert((*actor, *asset), ledger.balance_of(actor, asset));
            }
        }
        Self { entries }
    }

    pub fn get(&self, actor: &Pubkey, asset: &Asset) -> u64 {
        self.entries.get(&(*actor, *asset)).copied().unwrap_or(0)
    }

    /// Signed change from `self` to `after`
    pub fn delta(&self, after: &BalanceSnapshot, actor: &Pubkey, asset: &Asset) -> i128 {
        i128::from(after.get(actor, asset)) - i128::from(self.get(actor, asset))
    }

    /// Every (actor, asset) pair whose amount changed, with its delta
    pub fn changes(&self, after: &BalanceSnapshot) -> Vec<(Pubkey, Asset, i128)> {
        self.entries
            .keys()
            .chain(after.entries.keys())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .map(|(actor, asset)| (*actor, *asset, self.delta(after, actor, asset)))
            .filter(|(_, _, delta)| *delta != 0)
            .collect()
    }
}
