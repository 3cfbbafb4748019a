//! Domain layer - core business logic and entities

pub mod asset;
pub mod execution;
pub mod ledger;
pub mod order;
