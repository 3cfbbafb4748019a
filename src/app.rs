// src/app.rs
use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use tracing::{error, info};

use fillrouter::application::{run_scenario, DemoParams, Scenario, ScenarioReport};
use fillrouter::shared::types::Amount;

use crate::config::Config;

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub log_level: String,
    pub sweep_recipient: Option<Pubkey>,
    pub params: DemoParams,
    pub json: bool,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            sweep_recipient: None,
            params: DemoParams::default(),
            json: false,
        }
    }
}

impl AppCfg {
    /// Config file values over defaults
    pub fn from_config(cfg: Config) -> Result<Self> {
        let mut app_cfg = Self::default();
        if let Some(level) = cfg.logging.level {
            app_cfg.log_level = level;
        }
        if let Some(recipient) = cfg.router.sweep_recipient {
            app_cfg.sweep_recipient = Some(parse_pubkey(&recipient)?);
        }
        if let Some(price) = cfg.demo.listing_price {
            app_cfg.params.listing_price = parse_price(&price)?;
        }
        if let Some(price) = cfg.demo.offer_price {
            app_cfg.params.offer_price = parse_price(&price)?;
        }
        if let Some(bps) = cfg.demo.royalty_bps {
            app_cfg.params.royalty_bps = bps;
        }
        Ok(app_cfg)
    }
}

pub fn parse_pubkey(s: &str) -> Result<Pubkey> {
    Pubkey::from_str(s.trim()).with_context(|| format!("invalid address {}", s))
}

/// Decimal native units to base units
pub fn parse_price(s: &str) -> Result<u64> {
    let amount: Amount = s.parse().with_context(|| format!("invalid price {}", s))?;
    Ok(amount.to_base_units())
}

pub fn run(app_cfg: AppCfg, scenarios: &[Scenario]) -> Result<()> {
    info!(
        listing_price = %Amount::from_base_units(app_cfg.params.listing_price),
        offer_price = %Amount::from_base_units(app_cfg.params.offer_price),
        royalty_bps = app_cfg.params.royalty_bps,
        "Starting fill router demo"
    );

    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let run = run_scenario(*scenario, &app_cfg.params, app_cfg.sweep_recipient)
            .with_context(|| format!("set up scenario {}", scenario))?;
        let report = ScenarioReport::from_run(&run);
        if !report.succeeded {
            error!(scenario = %scenario, "Scenario did not complete");
        }
        reports.push(report);
    }

    if app_cfg.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print!("{}", report.render_text());
        }
    }

    let failed: Vec<_> = reports
        .iter()
        .filter(|r| !r.succeeded)
        .map(|r| r.scenario.as_str())
        .collect();
    if !failed.is_empty() {
        return Err(anyhow::anyhow!("scenarios failed: {}", failed.join(", ")));
    }
    Ok(())
}
