use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouterCfg {
    /// Receives anything left in the router or its modules; the caller when unset
    pub sweep_recipient: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingCfg {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DemoCfg {
    /// Decimal native units, e.g. "2.576"
    pub listing_price: Option<String>,
    pub offer_price: Option<String>,
    pub royalty_bps: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterCfg,
    #[serde(default)]
    pub logging: LoggingCfg,
    #[serde(default)]
    pub demo: DemoCfg,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read {}", path.as_ref().display()))?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parse Config.toml")?;
        Ok(cfg)
    }
}
