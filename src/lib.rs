//! Fillrouter - atomic multi-marketplace fill router
//! Built with Domain-Driven Design principles

pub mod domain;
pub mod infrastructure;
pub mod application;
pub mod shared;

// Re-export main types for convenience
pub use domain::asset::{Asset, Holding};
pub use domain::execution::{Batch, ExecutionReport, ExecutionStep, Router};
pub use domain::ledger::Ledger;
pub use domain::order::{FillConfig, Order};
pub use infrastructure::marketplace::{Marketplace, MarketplaceFactory, MarketplaceKind};
pub use infrastructure::modules::{AdapterModule, ConversionModule, PreconditionModule};
