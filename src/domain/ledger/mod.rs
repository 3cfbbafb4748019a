//! Ledger domain - the asset state the router settles against

mod balances;
mod events;
mod store;

pub use balances::BalanceSnapshot;
pub use events::{FillCompleted, LedgerEvent, OrderStatus};
pub use store::{Checkpoint, Ledger};
