//! End-to-end router scenarios: arbitrage, conversion, gating and callbacks

use solana_sdk::pubkey::Pubkey;
use std::fmt;
use tracing::{info, warn};

use super::deployment::Deployment;
use crate::domain::asset::{Asset, Holding};
use crate::domain::execution::{Batch, ExecutionReport, ExecutionStep};
use crate::domain::ledger::BalanceSnapshot;
use crate::domain::order::FillConfig;
use crate::infrastructure::modules::{
    AdapterCall, ConversionCall, ConversionEntry, PreconditionCall,
};
use crate::shared::errors::{AppError, RouterError};

const BPS_DENOMINATOR: u128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Buy a listing and sell the item into a higher offer in one batch
    BuyThenSell,
    /// Fill a wrapped-token offer and unwrap the proceeds
    UnwrapOffer,
    /// A stale premise aborts the batch; the same batch succeeds once it holds
    Precondition,
    /// Fill an offer by transferring the item with the batch attached
    ApprovalLess,
}

impl Scenario {
    pub fn all() -> [Scenario; 4] {
        [
            Scenario::BuyThenSell,
            Scenario::UnwrapOffer,
            Scenario::Precondition,
            Scenario::ApprovalLess,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::BuyThenSell => "buy-then-sell",
            Scenario::UnwrapOffer => "unwrap-offer",
            Scenario::Precondition => "precondition",
            Scenario::ApprovalLess => "approval-less",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Prices in base units of the native asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoParams {
    pub listing_price: u64,
    pub offer_price: u64,
    /// Royalty embedded in listings, paid out of the listing price
    pub royalty_bps: u16,
}

impl Default for DemoParams {
    fn default() -> Self {
        Self {
            listing_price: 2_576_000_000,
            offer_price: 3_000_000_000,
            royalty_bps: 0,
        }
    }
}

impl DemoParams {
    pub fn royalty(&self) -> Result<u64, AppError> {
        if u128::from(self.royalty_bps) > BPS_DENOMINATOR {
            return Err(AppError::ConfigError(format!(
                "royalty_bps {} exceeds 10000",
                self.royalty_bps
            )));
        }
        let royalty =
            u128::from(self.listing_price) * u128::from(self.royalty_bps) / BPS_DENOMINATOR;
        u64::try_from(royalty).map_err(|_| AppError::InvalidAmount(royalty.to_string()))
    }
}

/// One submission made by a scenario
#[derive(Debug)]
pub struct Attempt {
    pub label: &'static str,
    pub result: Result<ExecutionReport, RouterError>,
}

/// Everything a scenario did, for assertions and reporting
#[derive(Debug)]
pub struct ScenarioRun {
    pub scenario: Scenario,
    pub actors: Vec<(&'static str, Pubkey)>,
    pub items: Vec<u64>,
    pub wrapped: Pubkey,
    pub collection: Pubkey,
    pub attempts: Vec<Attempt>,
    pub before: BalanceSnapshot,
    pub after: BalanceSnapshot,
    /// Holdings left in the router or its modules; empty when accounting is exact
    pub residue: Vec<(Pubkey, Holding)>,
}

impl ScenarioRun {
    pub fn actor(&self, name: &str) -> Option<Pubkey> {
        self.actors
            .iter()
            .find(|(label, _)| *label == name)
            .map(|(_, key)| *key)
    }

    pub fn delta(&self, name: &str, asset: &Asset) -> i128 {
        self.actor(name)
            .map(|actor| self.before.delta(&self.after, &actor, asset))
            .unwrap_or(0)
    }

    pub fn succeeded(&self) -> bool {
        self.attempts.last().map(|attempt| attempt.result.is_ok()).unwrap_or(false)
    }
}

/// Run `scenario` against a fresh deployment
pub fn run_scenario(
    scenario: Scenario,
    params: &DemoParams,
    sweep_recipient: Option<Pubkey>,
) -> Result<ScenarioRun, AppError> {
    let mut deployment = Deployment::new(sweep_recipient);
    play(&mut deployment, scenario, params)
}

/// Run `scenario` against an existing deployment
pub fn play(
    deployment: &mut Deployment,
    scenario: Scenario,
    params: &DemoParams,
) -> Result<ScenarioRun, AppError> {
    info!(
        %scenario,
        listing_price = params.listing_price,
        offer_price = params.offer_price,
        "Running scenario"
    );
    let run = match scenario {
        Scenario::BuyThenSell => buy_then_sell(deployment, params)?,
        Scenario::UnwrapOffer => unwrap_offer(deployment, params)?,
        Scenario::Precondition => precondition(deployment, params)?,
        Scenario::ApprovalLess => approval_less(deployment, params)?,
    };
    if !run.residue.is_empty() {
        warn!(%scenario, residue = run.residue.len(), "Infrastructure holds residual assets");
    }
    Ok(run)
}

/// Shared scaffolding: snapshot, submit, snapshot again
struct Recorder {
    scenario: Scenario,
    actors: Vec<(&'static str, Pubkey)>,
    items: Vec<u64>,
    attempts: Vec<Attempt>,
    before: BalanceSnapshot,
}

impl Recorder {
    fn start(
        deployment: &Deployment,
        scenario: Scenario,
        actors: Vec<(&'static str, Pubkey)>,
        items: Vec<u64>,
    ) -> Self {
        let keys: Vec<_> = actors.iter().map(|(_, key)| *key).collect();
        let before = deployment.snapshot(&keys, &items);
        Self { scenario, actors, items, attempts: Vec::new(), before }
    }

    fn record(&mut self, label: &'static str, result: Result<ExecutionReport, RouterError>) {
        match &result {
            Ok(report) => info!(
                label,
                execution_id = %report.execution_id,
                fills = report.fills.len(),
                "Attempt committed"
            ),
            Err(err) => info!(label, error = %err, "Attempt reverted"),
        }
        self.attempts.push(Attempt { label, result });
    }

    fn finish(self, deployment: &Deployment) -> ScenarioRun {
        let keys: Vec<_> = self.actors.iter().map(|(_, key)| *key).collect();
        let after = deployment.snapshot(&keys, &self.items);
        ScenarioRun {
            scenario: self.scenario,
            actors: self.actors,
            items: self.items,
            wrapped: deployment.wrapped,
            collection: deployment.collection,
            attempts: self.attempts,
            before: self.before,
            after,
            residue: deployment.residue(),
        }
    }
}

fn buy_then_sell(
    deployment: &mut Deployment,
    params: &DemoParams,
) -> Result<ScenarioRun, AppError> {
    let (maker_a, maker_b) = (Pubkey::new_unique(), Pubkey::new_unique());
    let (caller, royalty_to) = (Pubkey::new_unique(), Pubkey::new_unique());

    let id = deployment.mint_item(maker_a)?;
    let royalty = Some((royalty_to, params.royalty()?));
    let listing = deployment.list_on_bazaar(maker_a, id, params.listing_price, royalty)?;
    deployment.fund_wrapped(maker_b, params.offer_price)?;
    let offer = deployment.offer_on_bulletin(maker_b, id, params.offer_price)?;
    deployment.fund_native(caller, params.listing_price)?;

    // the listing delivers straight into the module that sells the item on
    let batch = Batch::new(vec![
        ExecutionStep::new(
            deployment.bazaar_adapter,
            &AdapterCall::AcceptListing {
                order: listing,
                fill: FillConfig::atomic(deployment.bulletin_adapter, caller)
                    .with_amount(params.listing_price),
                fees: vec![],
            },
            params.listing_price,
        )?,
        ExecutionStep::new(
            deployment.bulletin_adapter,
            &AdapterCall::AcceptOffer {
                order: offer,
                proof: None,
                fill: FillConfig::atomic(caller, caller),
                fees: vec![],
            },
            0,
        )?,
    ]);

    let actors = vec![
        ("maker A", maker_a),
        ("maker B", maker_b),
        ("caller C", caller),
        ("royalty", royalty_to),
    ];
    let mut recorder = Recorder::start(deployment, Scenario::BuyThenSell, actors, vec![id]);
    let result = deployment.execute(caller, &batch, params.listing_price);
    recorder.record("arbitrage batch", result);
    Ok(recorder.finish(deployment))
}

fn unwrap_offer(deployment: &mut Deployment, params: &DemoParams) -> Result<ScenarioRun, AppError> {
    let (maker_a, taker_b) = (Pubkey::new_unique(), Pubkey::new_unique());

    let id = deployment.mint_item(taker_b)?;
    deployment.fund_wrapped(maker_a, params.offer_price)?;
    let offer = deployment.offer_on_bazaar(maker_a, id, params.offer_price)?;

    let batch = Batch::new(vec![
        ExecutionStep::new(
            deployment.bazaar_adapter,
            &AdapterCall::AcceptOffer {
                order: offer,
                proof: None,
                fill: FillConfig::atomic(deployment.conversion, taker_b),
                fees: vec![],
            },
            0,
        )?,
        ExecutionStep::new(
            deployment.conversion,
            &ConversionCall::Convert(vec![ConversionEntry {
                recipient: taker_b,
                amount: params.offer_price,
                to_native: true,
            }]),
            0,
        )?,
    ]);

    let actors = vec![("maker A", maker_a), ("taker B", taker_b)];
    let mut recorder = Recorder::start(deployment, Scenario::UnwrapOffer, actors, vec![id]);
    let result = deployment.transfer_with_batch(taker_b, deployment.bazaar_adapter, id, &batch);
    recorder.record("offer fill with unwrap", result);
    Ok(recorder.finish(deployment))
}

fn precondition(deployment: &mut Deployment, params: &DemoParams) -> Result<ScenarioRun, AppError> {
    let (maker_a, caller) = (Pubkey::new_unique(), Pubkey::new_unique());
    let holder_d = Pubkey::new_unique();

    let id = deployment.mint_item(maker_a)?;
    let listing = deployment.list_on_bazaar(maker_a, id, params.listing_price, None)?;
    deployment.fund_native(caller, params.listing_price)?;

    let batch = Batch::new(vec![
        ExecutionStep::new(
            deployment.precondition,
            &PreconditionCall::AssertOwnerOrBalance {
                asset: deployment.item(id),
                holder: maker_a,
                amount: 1,
            },
            0,
        )?,
        ExecutionStep::new(
            deployment.bazaar_adapter,
            &AdapterCall::AcceptListing {
                order: listing,
                fill: FillConfig::atomic(caller, caller).with_amount(params.listing_price),
                fees: vec![],
            },
            params.listing_price,
        )?,
    ]);

    let actors = vec![("maker A", maker_a), ("caller C", caller), ("holder D", holder_d)];
    let mut recorder = Recorder::start(deployment, Scenario::Precondition, actors, vec![id]);
    let item = Holding::non_fungible(deployment.collection, id);

    deployment.ledger.transfer(maker_a, holder_d, &item)?;
    let result = deployment.execute(caller, &batch, params.listing_price);
    recorder.record("item moved away", result);

    deployment.ledger.transfer(holder_d, maker_a, &item)?;
    let result = deployment.execute(caller, &batch, params.listing_price);
    recorder.record("item back with maker", result);
    Ok(recorder.finish(deployment))
}

fn approval_less(
    deployment: &mut Deployment,
    params: &DemoParams,
) -> Result<ScenarioRun, AppError> {
    let (holder, maker_b) = (Pubkey::new_unique(), Pubkey::new_unique());

    let wanted = deployment.mint_item(holder)?;
    let other = deployment.mint_item(holder)?;
    deployment.fund_wrapped(maker_b, params.offer_price)?;
    let offer = deployment.offer_on_bulletin(maker_b, wanted, params.offer_price)?;

    let batch = Batch::new(vec![ExecutionStep::new(
        deployment.bulletin_adapter,
        &AdapterCall::AcceptOffer {
            order: offer,
            proof: None,
            fill: FillConfig::atomic(holder, holder),
            fees: vec![],
        },
        0,
    )?]);

    let actors = vec![("holder H", holder), ("maker B", maker_b)];
    let items = vec![wanted, other];
    let mut recorder = Recorder::start(deployment, Scenario::ApprovalLess, actors, items);

    let adapter = deployment.bulletin_adapter;
    let result = deployment.transfer_with_batch(holder, adapter, other, &batch);
    recorder.record("wrong item sent", result);
    let result = deployment.transfer_with_batch(holder, adapter, wanted, &batch);
    recorder.record("offered item sent", result);
    Ok(recorder.finish(deployment))
}
