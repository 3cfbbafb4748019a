//! In-memory asset ledger with a transactional boundary

use chrono::{DateTime, Duration, Utc};
use solana_sdk::pubkey::Pubkey;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::trace;
use uuid::Uuid;

use super::events::{LedgerEvent, OrderStatus};
use crate::domain::asset::{Asset, Holding};
use crate::shared::errors::LedgerError;

#[derive(Debug, Clone, Default)]
struct LedgerState {
    native: HashMap<Pubkey, u64>,
    // (token, holder)
    fungible: HashMap<(Pubkey, Pubkey), u64>,
    // (collection, id) -> owner
    owners: BTreeMap<(Pubkey, u64), Pubkey>,
    // (token, owner, spender)
    allowances: HashMap<(Pubkey, Pubkey, Pubkey), u64>,
    // (collection, owner, operator)
    operators: BTreeSet<(Pubkey, Pubkey, Pubkey)>,
    // (marketplace, order id)
    orders: HashMap<(Pubkey, Uuid), OrderStatus>,
    events: Vec<LedgerEvent>,
}

/// Saved ledger state, restored when a transactional scope fails
#[derive(Debug, Clone)]
pub struct Checkpoint {
    state: LedgerState,
}

/// Asset ledger standing in for the chain the router settles on
#[derive(Debug, Clone)]
pub struct Ledger {
    state: LedgerState,
    wrapped_token: Pubkey,
    now: DateTime<Utc>,
}

impl Ledger {
    pub fn new(wrapped_token: Pubkey) -> Self {
        Self {
            state: LedgerState::default(),
            wrapped_token,
            now: Utc::now(),
        }
    }

    pub fn wrapped_token(&self) -> Pubkey {
        self.wrapped_token
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    // ---- transactional boundary -------------------------------------------

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint { state: self.state.clone() }
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.state = checkpoint.state;
    }

    /// Run `f`; if it fails every state change it made is discarded.
    pub fn atomically<T, E>(
        &mut self,
        f: impl FnOnce(&mut Ledger) -> Result<T, E>,
    ) -> Result<T, E> {
        let checkpoint = self.checkpoint();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.restore(checkpoint);
                Err(err)
            }
        }
    }

    // ---- issuance -----------------------------------------------------------

    pub fn mint_native(&mut self, holder: Pubkey, amount: u64) -> Result<(), LedgerError> {
        let balance = self.state.native.entry(holder).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn mint_fungible(
        &mut self,
        token: Pubkey,
        holder: Pubkey,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let balance = self.state.fungible.entry((token, holder)).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn mint_non_fungible(
        &mut self,
        collection: Pubkey,
        id: u64,
        owner: Pubkey,
    ) -> Result<(), LedgerError> {
        if self.state.owners.contains_key(&(collection, id)) {
            return Err(LedgerError::TokenExists { collection, id });
        }
        self.state.owners.insert((collection, id), owner);
        Ok(())
    }

    // ---- queries ------------------------------------------------------------

    pub fn native_balance(&self, holder: &Pubkey) -> u64 {
        self.state.native.get(holder).copied().unwrap_or(0)
    }

    pub fn fungible_balance(&self, token: &Pubkey, holder: &Pubkey) -> u64 {
        self.state.fungible.get(&(*token, *holder)).copied().unwrap_or(0)
    }

    pub fn owner_of(&self, collection: &Pubkey, id: u64) -> Option<Pubkey> {
        self.state.owners.get(&(*collection, id)).copied()
    }

    /// Balance of any asset; non-fungibles report 1 for the owner and 0 otherwise.
    pub fn balance_of(&self, holder: &Pubkey, asset: &Asset) -> u64 {
        match asset {
            Asset::Native => self.native_balance(holder),
            Asset::Fungible(token) => self.fungible_balance(token, holder),
            Asset::NonFungible(collection, id) => {
                u64::from(self.owner_of(collection, *id).as_ref() == Some(holder))
            }
        }
    }

    /// Every nonzero holding of `holder`
    pub fn holdings(&self, holder: &Pubkey) -> Vec<Holding> {
        let mut holdings = Vec::new();
        let native = self.native_balance(holder);
        if native > 0 {
            holdings.push(Holding::native(native));
        }

        let mut tokens: Vec<_> = self
            .state
            .fungible
            .iter()
            .filter(|((_, owner), amount)| owner == holder && **amount > 0)
            .map(|((token, _), amount)| Holding::fungible(*token, *amount))
            .collect();
        tokens.sort_by_key(|h| h.asset);
        holdings.extend(tokens);

        holdings.extend(
            self.state
                .owners
                .iter()
                .filter(|(_, owner)| *owner == holder)
                .map(|((collection, id), _)| Holding::non_fungible(*collection, *id)),
        );
        holdings
    }

    pub fn allowance(&self, token: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> u64 {
        self.state.allowances.get(&(*token, *owner, *spender)).copied().unwrap_or(0)
    }

    pub fn is_approved_for_all(
        &self,
        collection: &Pubkey,
        owner: &Pubkey,
        operator: &Pubkey,
    ) -> bool {
        self.state.operators.contains(&(*collection, *owner, *operator))
    }

    // ---- approvals ----------------------------------------------------------

    pub fn approve(&mut self, token: Pubkey, owner: Pubkey, spender: Pubkey, amount: u64) {
        if amount == 0 {
            self.state.allowances.remove(&(token, owner, spender));
        } else {
            self.state.allowances.insert((token, owner, spender), amount);
        }
    }

    pub fn set_approval_for_all(
        &mut self,
        collection: Pubkey,
        owner: Pubkey,
        operator: Pubkey,
        approved: bool,
    ) {
        if approved {
            self.state.operators.insert((collection, owner, operator));
        } else {
            self.state.operators.remove(&(collection, owner, operator));
        }
    }

    // ---- transfers ----------------------------------------------------------

    pub fn transfer_native(
        &mut self,
        from: Pubkey,
        to: Pubkey,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let available = self.native_balance(&from);
        if available < amount {
            return Err(LedgerError::InsufficientNative {
                holder: from,
                required: amount,
                available,
            });
        }
        let credited = self
            .native_balance(&to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.state.native.insert(from, available - amount);
        self.state.native.insert(to, credited);
        trace!(%from, %to, amount, "native transfer");
        Ok(())
    }

    pub fn transfer_fungible(
        &mut self,
        token: Pubkey,
        from: Pubkey,
        to: Pubkey,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let available = self.fungible_balance(&token, &from);
        if available < amount {
            return Err(LedgerError::InsufficientFungible {
                token,
                holder: from,
                required: amount,
                available,
            });
        }
        let credited = self
            .fungible_balance(&token, &to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.state.fungible.insert((token, from), available - amount);
        self.state.fungible.insert((token, to), credited);
        trace!(%token, %from, %to, amount, "fungible transfer");
        Ok(())
    }

    pub fn transfer_non_fungible(
        &mut self,
        collection: Pubkey,
        id: u64,
        from: Pubkey,
        to: Pubkey,
    ) -> Result<(), LedgerError> {
        let owner = self
            .owner_of(&collection, id)
            .ok_or(LedgerError::UnknownToken { collection, id })?;
        if owner != from {
            return Err(LedgerError::NotOwner { collection, id, holder: from });
        }
        self.state.owners.insert((collection, id), to);
        trace!(%collection, id, %from, %to, "non-fungible transfer");
        Ok(())
    }

    /// Move any holding `from` already owns
    pub fn transfer(
        &mut self,
        from: Pubkey,
        to: Pubkey,
        holding: &Holding,
    ) -> Result<(), LedgerError> {
        match holding.asset {
            Asset::Native => self.transfer_native(from, to, holding.amount),
            Asset::Fungible(token) => self.transfer_fungible(token, from, to, holding.amount),
            Asset::NonFungible(collection, id) => {
                if holding.amount != 1 {
                    return Err(LedgerError::InvalidNonFungibleAmount(holding.amount));
                }
                self.transfer_non_fungible(collection, id, from, to)
            }
        }
    }

    pub fn transfer_fungible_from(
        &mut self,
        spender: Pubkey,
        token: Pubkey,
        from: Pubkey,
        to: Pubkey,
        amount: u64,
    ) -> Result<(), LedgerError> {
        if spender != from {
            let available = self.allowance(&token, &from, &spender);
            if available < amount {
                return Err(LedgerError::InsufficientAllowance {
                    token,
                    owner: from,
                    spender,
                    required: amount,
                    available,
                });
            }
            self.transfer_fungible(token, from, to, amount)?;
            self.approve(token, from, spender, available - amount);
            return Ok(());
        }
        self.transfer_fungible(token, from, to, amount)
    }

    pub fn transfer_non_fungible_from(
        &mut self,
        operator: Pubkey,
        collection: Pubkey,
        id: u64,
        from: Pubkey,
        to: Pubkey,
    ) -> Result<(), LedgerError> {
        if operator != from && !self.is_approved_for_all(&collection, &from, &operator) {
            return Err(LedgerError::NotApproved { collection, owner: from, operator });
        }
        self.transfer_non_fungible(collection, id, from, to)
    }

    /// Pull a holding through the allowance/approval granted to `operator`
    pub fn transfer_from(
        &mut self,
        operator: Pubkey,
        from: Pubkey,
        to: Pubkey,
        holding: &Holding,
    ) -> Result<(), LedgerError> {
        match holding.asset {
            Asset::Native => self.transfer_native(from, to, holding.amount),
            Asset::Fungible(token) => {
                self.transfer_fungible_from(operator, token, from, to, holding.amount)
            }
            Asset::NonFungible(collection, id) => {
                if holding.amount != 1 {
                    return Err(LedgerError::InvalidNonFungibleAmount(holding.amount));
                }
                self.transfer_non_fungible_from(operator, collection, id, from, to)
            }
        }
    }

    // ---- wrapped native -----------------------------------------------------

    /// Lock native value in the wrapped token and credit the same amount of it
    pub fn wrap(&mut self, holder: Pubkey, amount: u64) -> Result<(), LedgerError> {
        let wrapped = self.wrapped_token;
        self.transfer_native(holder, wrapped, amount)?;
        self.mint_fungible(wrapped, holder, amount)
    }

    pub fn unwrap(&mut self, holder: Pubkey, amount: u64) -> Result<(), LedgerError> {
        let wrapped = self.wrapped_token;
        let available = self.fungible_balance(&wrapped, &holder);
        if available < amount {
            return Err(LedgerError::InsufficientFungible {
                token: wrapped,
                holder,
                required: amount,
                available,
            });
        }
        self.state.fungible.insert((wrapped, holder), available - amount);
        self.transfer_native(wrapped, holder, amount)
    }

    // ---- marketplace storage ------------------------------------------------

    pub fn order_status(&self, marketplace: &Pubkey, order_id: &Uuid) -> Option<OrderStatus> {
        self.state.orders.get(&(*marketplace, *order_id)).copied()
    }

    pub fn set_order_status(&mut self, marketplace: Pubkey, order_id: Uuid, status: OrderStatus) {
        self.state.orders.insert((marketplace, order_id), status);
    }

    // ---- events -------------------------------------------------------------

    pub fn emit(&mut self, event: LedgerEvent) {
        self.state.events.push(event);
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.state.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Ledger, Pubkey, Pubkey) {
        let ledger = Ledger::new(Pubkey::new_unique());
        (ledger, Pubkey::new_unique(), Pubkey::new_unique())
    }

    #[test]
    fn test_native_transfer_and_shortfall() {
        let (mut ledger, alice, bob) = setup();
        ledger.mint_native(alice, 100).unwrap();

        ledger.transfer_native(alice, bob, 40).unwrap();
        assert_eq!(ledger.native_balance(&alice), 60);
        assert_eq!(ledger.native_balance(&bob), 40);

        let err = ledger.transfer_native(alice, bob, 61).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientNative { holder: alice, required: 61, available: 60 }
        );
    }

    #[test]
    fn test_atomically_restores_on_error() {
        let (mut ledger, alice, bob) = setup();
        ledger.mint_native(alice, 100).unwrap();

        let result: Result<(), LedgerError> = ledger.atomically(|l| {
            l.transfer_native(alice, bob, 50)?;
            l.transfer_native(alice, bob, 500)
        });

        assert!(result.is_err());
        assert_eq!(ledger.native_balance(&alice), 100);
        assert_eq!(ledger.native_balance(&bob), 0);
    }

    #[test]
    fn test_wrap_and_unwrap_conserve_native() {
        let (mut ledger, alice, _) = setup();
        let wrapped = ledger.wrapped_token();
        ledger.mint_native(alice, 10).unwrap();

        ledger.wrap(alice, 7).unwrap();
        assert_eq!(ledger.native_balance(&alice), 3);
        assert_eq!(ledger.fungible_balance(&wrapped, &alice), 7);
        assert_eq!(ledger.native_balance(&wrapped), 7);

        ledger.unwrap(alice, 7).unwrap();
        assert_eq!(ledger.native_balance(&alice), 10);
        assert_eq!(ledger.fungible_balance(&wrapped, &alice), 0);
        assert!(ledger.unwrap(alice, 1).is_err());
    }

    #[test]
    fn test_transfer_from_requires_allowance() {
        let (mut ledger, alice, bob) = setup();
        let token = Pubkey::new_unique();
        let spender = Pubkey::new_unique();
        ledger.mint_fungible(token, alice, 100).unwrap();

        assert!(ledger.transfer_fungible_from(spender, token, alice, bob, 10).is_err());

        ledger.approve(token, alice, spender, 25);
        ledger.transfer_fungible_from(spender, token, alice, bob, 10).unwrap();
        assert_eq!(ledger.allowance(&token, &alice, &spender), 15);
        assert_eq!(ledger.fungible_balance(&token, &bob), 10);
    }

    #[test]
    fn test_non_fungible_operator_approval() {
        let (mut ledger, alice, bob) = setup();
        let collection = Pubkey::new_unique();
        let operator = Pubkey::new_unique();
        ledger.mint_non_fungible(collection, 9, alice).unwrap();

        assert!(matches!(
            ledger.transfer_non_fungible_from(operator, collection, 9, alice, bob),
            Err(LedgerError::NotApproved { .. })
        ));

        ledger.set_approval_for_all(collection, alice, operator, true);
        ledger.transfer_non_fungible_from(operator, collection, 9, alice, bob).unwrap();
        assert_eq!(ledger.owner_of(&collection, 9), Some(bob));
        assert_eq!(ledger.balance_of(&bob, &Asset::NonFungible(collection, 9)), 1);
        assert_eq!(ledger.balance_of(&alice, &Asset::NonFungible(collection, 9)), 0);
    }

    #[test]
    fn test_holdings_lists_everything_nonzero() {
        let (mut ledger, alice, _) = setup();
        let token = Pubkey::new_unique();
        let collection = Pubkey::new_unique();
        ledger.mint_native(alice, 5).unwrap();
        ledger.mint_fungible(token, alice, 3).unwrap();
        ledger.mint_non_fungible(collection, 1, alice).unwrap();

        let holdings = ledger.holdings(&alice);
        assert_eq!(holdings.len(), 3);
        assert!(holdings.contains(&Holding::native(5)));
        assert!(holdings.contains(&Holding::fungible(token, 3)));
        assert!(holdings.contains(&Holding::non_fungible(collection, 1)));
        assert!(ledger.mint_non_fungible(collection, 1, alice).is_err());
    }
}
