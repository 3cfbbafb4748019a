//! Step targets registered with the router

pub mod adapter;
pub mod conversion;
pub mod precondition;

pub use adapter::{AdapterCall, AdapterModule};
pub use conversion::{ConversionCall, ConversionEntry, ConversionModule, WrapEntry};
pub use precondition::{PreconditionCall, PreconditionModule};
