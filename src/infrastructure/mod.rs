//! Infrastructure layer - external protocols and the modules that adapt them

pub mod marketplace;
pub mod modules;
