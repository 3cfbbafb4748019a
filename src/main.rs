mod app;
mod config;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::error;

use fillrouter::application::Scenario;
use fillrouter::shared::logging::setup_logging;

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ScenarioArg {
    BuyThenSell,
    UnwrapOffer,
    Precondition,
    ApprovalLess,
    All,
}

impl ScenarioArg {
    fn scenarios(self) -> Vec<Scenario> {
        match self {
            ScenarioArg::BuyThenSell => vec![Scenario::BuyThenSell],
            ScenarioArg::UnwrapOffer => vec![Scenario::UnwrapOffer],
            ScenarioArg::Precondition => vec![Scenario::Precondition],
            ScenarioArg::ApprovalLess => vec![Scenario::ApprovalLess],
            ScenarioArg::All => Scenario::all().to_vec(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Atomic fill router: runs batches across marketplaces against a simulated ledger"
)]
struct Args {
    /// Scenario to run
    #[arg(value_enum, default_value = "all")]
    scenario: ScenarioArg,

    /// Path to config file (optional)
    #[arg(long)]
    config: Option<String>,

    /// Listing price in native units, e.g. 2.576
    #[arg(long)]
    listing_price: Option<String>,

    /// Offer price in native units, e.g. 3.0
    #[arg(long)]
    offer_price: Option<String>,

    /// Royalty embedded in listings, in basis points
    #[arg(long)]
    royalty_bps: Option<u16>,

    /// Recipient of swept residual balances (defaults to the caller)
    #[arg(long)]
    sweep_recipient: Option<String>,

    /// Log level, overridden by RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Create AppCfg with priority: CLI args > Config file > Defaults
    let mut app_cfg = match &args.config {
        Some(path) => app::AppCfg::from_config(config::Config::from_file(path)?)?,
        None => app::AppCfg::default(),
    };
    if let Some(level) = args.log_level {
        app_cfg.log_level = level;
    }
    if let Some(price) = args.listing_price {
        app_cfg.params.listing_price = app::parse_price(&price)?;
    }
    if let Some(price) = args.offer_price {
        app_cfg.params.offer_price = app::parse_price(&price)?;
    }
    if let Some(bps) = args.royalty_bps {
        app_cfg.params.royalty_bps = bps;
    }
    if let Some(recipient) = args.sweep_recipient {
        app_cfg.sweep_recipient = Some(app::parse_pubkey(&recipient)?);
    }
    app_cfg.json = args.json;

    setup_logging(&app_cfg.log_level);

    let scenarios = args.scenario.scenarios();
    if let Err(e) = app::run(app_cfg, &scenarios) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
