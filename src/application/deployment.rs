//! A fresh ledger with both marketplaces, every module and a router wired up

use chrono::Duration;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::debug;

use crate::domain::asset::{Asset, Holding};
use crate::domain::execution::{Batch, ExecutionReport, InboundTransfer, Module, Router};
use crate::domain::ledger::{BalanceSnapshot, Ledger};
use crate::domain::order::Order;
use crate::infrastructure::marketplace::{
    Bulletin, Marketplace, MarketplaceFactory, MarketplaceKind,
};
use crate::infrastructure::modules::{AdapterModule, ConversionModule, PreconditionModule};
use crate::shared::errors::{AppError, RouterError};

/// How long demo orders stay valid
const ORDER_TTL_HOURS: i64 = 24;

pub struct Deployment {
    pub ledger: Ledger,
    pub router: Arc<Router>,
    pub bazaar: Arc<dyn Marketplace>,
    pub bulletin: Arc<Bulletin>,
    pub bazaar_adapter: Pubkey,
    pub bulletin_adapter: Pubkey,
    pub precondition: Pubkey,
    pub conversion: Pubkey,
    /// The single demo collection every item is minted in
    pub collection: Pubkey,
    pub wrapped: Pubkey,
    next_token_id: u64,
}

impl Deployment {
    pub fn new(sweep_recipient: Option<Pubkey>) -> Self {
        let wrapped = Pubkey::new_unique();
        let ledger = Ledger::new(wrapped);
        let bazaar = MarketplaceFactory::create(MarketplaceKind::Bazaar, Pubkey::new_unique());
        let bulletin = Arc::new(Bulletin::new(Pubkey::new_unique()));

        let bazaar_adapter = AdapterModule::new(Pubkey::new_unique(), bazaar.clone());
        let bulletin_adapter = AdapterModule::new(Pubkey::new_unique(), bulletin.clone());
        let precondition = PreconditionModule::new(Pubkey::new_unique());
        let conversion = ConversionModule::new(Pubkey::new_unique());

        let (bazaar_id, bulletin_id) = (bazaar_adapter.address(), bulletin_adapter.address());
        let (precondition_id, conversion_id) = (precondition.address(), conversion.address());
        let modules: Vec<Arc<dyn Module>> = vec![
            Arc::new(bazaar_adapter),
            Arc::new(bulletin_adapter),
            Arc::new(precondition),
            Arc::new(conversion),
        ];
        let router = Arc::new(Router::new(Pubkey::new_unique(), modules, sweep_recipient));
        debug!(router = %router.address(), modules = router.module_ids().len(), "Deployment ready");

        Self {
            ledger,
            router,
            bazaar,
            bulletin,
            bazaar_adapter: bazaar_id,
            bulletin_adapter: bulletin_id,
            precondition: precondition_id,
            conversion: conversion_id,
            collection: Pubkey::new_unique(),
            wrapped,
            next_token_id: 1,
        }
    }

    /// Router plus every registered module
    pub fn infrastructure(&self) -> Vec<Pubkey> {
        std::iter::once(self.router.address())
            .chain(self.router.module_ids())
            .collect()
    }

    pub fn fund_native(&mut self, holder: Pubkey, amount: u64) -> Result<(), AppError> {
        self.ledger.mint_native(holder, amount)?;
        Ok(())
    }

    /// Mint native value and wrap it
    pub fn fund_wrapped(&mut self, holder: Pubkey, amount: u64) -> Result<(), AppError> {
        self.ledger.mint_native(holder, amount)?;
        self.ledger.wrap(holder, amount)?;
        Ok(())
    }

    /// Mint the next item of the demo collection and return its id
    pub fn mint_item(&mut self, owner: Pubkey) -> Result<u64, AppError> {
        let id = self.next_token_id;
        self.ledger.mint_non_fungible(self.collection, id, owner)?;
        self.next_token_id += 1;
        Ok(id)
    }

    pub fn item(&self, token_id: u64) -> Asset {
        Asset::NonFungible(self.collection, token_id)
    }

    /// Signed native-priced listing on the bazaar, with an optional royalty
    pub fn list_on_bazaar(
        &mut self,
        maker: Pubkey,
        token_id: u64,
        price: u64,
        royalty: Option<(Pubkey, u64)>,
    ) -> Result<Order, AppError> {
        self.ledger
            .set_approval_for_all(self.collection, maker, self.bazaar.address(), true);
        let mut order = Order::listing(
            maker,
            Holding::non_fungible(self.collection, token_id),
            Asset::Native,
            price,
            self.ledger.now() + Duration::hours(ORDER_TTL_HOURS),
        );
        if let Some((recipient, amount)) = royalty.filter(|(_, amount)| *amount > 0) {
            order = order.with_fee(recipient, amount);
        }
        Ok(order.signed())
    }

    /// Wrapped-token offer posted on the bulletin
    pub fn offer_on_bulletin(
        &mut self,
        maker: Pubkey,
        token_id: u64,
        price: u64,
    ) -> Result<Order, AppError> {
        let order = Order::offer(
            maker,
            Holding::non_fungible(self.collection, token_id),
            Asset::Fungible(self.wrapped),
            price,
            self.ledger.now() + Duration::hours(ORDER_TTL_HOURS),
        );
        self.approve_wrapped(maker, self.bulletin.address(), price);
        self.bulletin.post(&mut self.ledger, maker, &order)?;
        Ok(order)
    }

    /// Signed wrapped-token offer on the bazaar
    pub fn offer_on_bazaar(
        &mut self,
        maker: Pubkey,
        token_id: u64,
        price: u64,
    ) -> Result<Order, AppError> {
        let order = Order::offer(
            maker,
            Holding::non_fungible(self.collection, token_id),
            Asset::Fungible(self.wrapped),
            price,
            self.ledger.now() + Duration::hours(ORDER_TTL_HOURS),
        )
        .signed();
        self.approve_wrapped(maker, self.bazaar.address(), price);
        Ok(order)
    }

    fn approve_wrapped(&mut self, owner: Pubkey, spender: Pubkey, amount: u64) {
        let current = self.ledger.allowance(&self.wrapped, &owner, &spender);
        self.ledger
            .approve(self.wrapped, owner, spender, current.saturating_add(amount));
    }

    pub fn execute(
        &mut self,
        caller: Pubkey,
        batch: &Batch,
        value: u64,
    ) -> Result<ExecutionReport, RouterError> {
        self.router.execute(&mut self.ledger, caller, batch, value)
    }

    /// Send `token_id` from `holder` to `module`, carrying `batch` as transfer data
    pub fn transfer_with_batch(
        &mut self,
        holder: Pubkey,
        module: Pubkey,
        token_id: u64,
        batch: &Batch,
    ) -> Result<ExecutionReport, RouterError> {
        let transfer = InboundTransfer {
            from: holder,
            to: module,
            collection: self.collection,
            token_id,
            data: batch.encode()?,
        };
        self.router.transfer_with_batch(&mut self.ledger, transfer)
    }

    pub fn snapshot(&self, actors: &[Pubkey], items: &[u64]) -> BalanceSnapshot {
        let mut assets = vec![Asset::Native, Asset::Fungible(self.wrapped)];
        assets.extend(items.iter().map(|id| self.item(*id)));
        BalanceSnapshot::capture(&self.ledger, actors, &assets)
    }

    /// Anything the router or a module still holds
    pub fn residue(&self) -> Vec<(Pubkey, Holding)> {
        self.infrastructure()
            .into_iter()
            .flat_map(|holder| {
                self.ledger
                    .holdings(&holder)
                    .into_iter()
                    .map(move |holding| (holder, holding))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_registers_every_module() {
        let deployment = Deployment::new(None);
        let ids = deployment.router.module_ids();
        assert_eq!(ids.len(), 4);
        for module in [
            deployment.bazaar_adapter,
            deployment.bulletin_adapter,
            deployment.precondition,
            deployment.conversion,
        ] {
            assert!(ids.contains(&module));
        }
        assert!(deployment.residue().is_empty());
    }

    #[test]
    fn test_item_ids_are_sequential() {
        let mut deployment = Deployment::new(None);
        let owner = Pubkey::new_unique();
        assert_eq!(deployment.mint_item(owner).unwrap(), 1);
        assert_eq!(deployment.mint_item(owner).unwrap(), 2);
        assert_eq!(deployment.ledger.owner_of(&deployment.collection, 2), Some(owner));
    }
}
