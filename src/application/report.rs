//! Printable scenario reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt::Write as _;

use super::scenarios::ScenarioRun;
use crate::domain::asset::{Asset, Holding};
use crate::domain::execution::{ExecutionReport, StepOutcome};
use crate::shared::types::{format_delta, Amount, NATIVE_DECIMALS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub succeeded: bool,
    pub attempts: Vec<AttemptSummary>,
    pub balance_changes: Vec<BalanceChange>,
    pub residue: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub label: String,
    pub committed: bool,
    pub execution_id: Option<String>,
    pub error: Option<String>,
    pub steps: Vec<String>,
    pub fills: Vec<FillSummary>,
    pub swept: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSummary {
    pub step: usize,
    pub order_id: String,
    pub marketplace: String,
    pub kind: String,
    pub item: String,
    pub price: String,
    pub fill_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChange {
    pub actor: String,
    pub asset: String,
    pub delta: String,
}

/// Human names for the addresses a run involves
struct Labels<'a> {
    run: &'a ScenarioRun,
}

impl Labels<'_> {
    fn address(&self, key: &Pubkey) -> String {
        self.run
            .actors
            .iter()
            .find(|(_, actor)| actor == key)
            .map(|(label, _)| label.to_string())
            .unwrap_or_else(|| key.to_string())
    }

    fn asset(&self, asset: &Asset) -> String {
        match asset {
            Asset::Native => "native".to_string(),
            Asset::Fungible(token) if *token == self.run.wrapped => "wrapped".to_string(),
            Asset::NonFungible(collection, id) if *collection == self.run.collection => {
                format!("item #{}", id)
            }
            other => other.to_string(),
        }
    }

    fn holding(&self, holding: &Holding) -> String {
        match holding.asset {
            Asset::NonFungible(..) => self.asset(&holding.asset),
            _ => format!(
                "{} {}",
                Amount::from_base_units(holding.amount),
                self.asset(&holding.asset)
            ),
        }
    }

    fn delta(&self, asset: &Asset, delta: i128) -> String {
        match asset {
            Asset::NonFungible(..) if delta > 0 => "received".to_string(),
            Asset::NonFungible(..) => "sent".to_string(),
            _ => format_delta(delta, NATIVE_DECIMALS),
        }
    }
}

impl ScenarioReport {
    pub fn from_run(run: &ScenarioRun) -> Self {
        let labels = Labels { run };
        let attempts = run
            .attempts
            .iter()
            .map(|attempt| match &attempt.result {
                Ok(report) => summarize(&labels, attempt.label, report),
                Err(err) => AttemptSummary {
                    label: attempt.label.to_string(),
                    committed: false,
                    execution_id: None,
                    error: Some(err.to_string()),
                    steps: Vec::new(),
                    fills: Vec::new(),
                    swept: Vec::new(),
                },
            })
            .collect();

        let balance_changes = run
            .before
            .changes(&run.after)
            .into_iter()
            .map(|(actor, asset, delta)| BalanceChange {
                actor: labels.address(&actor),
                asset: labels.asset(&asset),
                delta: labels.delta(&asset, delta),
            })
            .collect();

        let residue = run
            .residue
            .iter()
            .map(|(holder, holding)| format!("{}: {}", holder, labels.holding(holding)))
            .collect();

        Self {
            scenario: run.scenario.name().to_string(),
            succeeded: run.succeeded(),
            attempts,
            balance_changes,
            residue,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let status = if self.succeeded { "ok" } else { "FAILED" };
        let _ = writeln!(out, "== {} [{}]", self.scenario, status);

        for attempt in &self.attempts {
            match (&attempt.execution_id, &attempt.error) {
                (Some(id), _) => {
                    let _ = writeln!(out, "  {}: committed ({})", attempt.label, id);
                }
                (None, Some(err)) => {
                    let _ = writeln!(out, "  {}: reverted - {}", attempt.label, err);
                }
                (None, None) => {
                    let _ = writeln!(out, "  {}: reverted", attempt.label);
                }
            }
            for step in &attempt.steps {
                let _ = writeln!(out, "    step {}", step);
            }
            for fill in &attempt.fills {
                let _ = writeln!(
                    out,
                    "    fill @{} {} {} on {} for {} -> {}",
                    fill.step, fill.kind, fill.item, fill.marketplace, fill.price, fill.fill_to
                );
            }
            for swept in &attempt.swept {
                let _ = writeln!(out, "    swept {}", swept);
            }
        }

        let _ = writeln!(out, "  balance changes:");
        for change in &self.balance_changes {
            let _ = writeln!(out, "    {:<10} {:<10} {}", change.actor, change.asset, change.delta);
        }
        if self.residue.is_empty() {
            let _ = writeln!(out, "  router and modules hold nothing");
        } else {
            for residue in &self.residue {
                let _ = writeln!(out, "  residue {}", residue);
            }
        }
        out
    }
}

fn summarize(labels: &Labels<'_>, label: &str, report: &ExecutionReport) -> AttemptSummary {
    let steps = report
        .steps
        .iter()
        .map(|step| match &step.outcome {
            StepOutcome::Executed => format!("{}: executed", step.index),
            StepOutcome::Skipped { reason, refunded, refund_to } => format!(
                "{}: skipped ({}), refunded {} to {}",
                step.index,
                reason,
                Amount::from_base_units(*refunded),
                labels.address(refund_to)
            ),
        })
        .collect();

    let fills = report
        .fills
        .iter()
        .map(|fill| FillSummary {
            step: fill.step,
            order_id: fill.order_id.to_string(),
            marketplace: fill.marketplace.to_string(),
            kind: fill.kind.as_str().to_string(),
            item: labels.holding(&fill.item),
            price: Amount::from_base_units(fill.price).to_string(),
            fill_to: labels.address(&fill.fill_to),
        })
        .collect();

    let swept = report
        .swept
        .iter()
        .map(|swept| {
            format!(
                "{} from {} to {}",
                labels.holding(&swept.holding),
                swept.from,
                labels.address(&swept.to)
            )
        })
        .collect();

    AttemptSummary {
        label: label.to_string(),
        committed: true,
        execution_id: Some(report.execution_id.to_string()),
        error: None,
        steps,
        fills,
        swept,
    }
}
