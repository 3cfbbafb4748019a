//! Application layer - deployments, scenarios and their reports

pub mod deployment;
pub mod report;
pub mod scenarios;

pub use deployment::Deployment;
pub use report::ScenarioReport;
pub use scenarios::{play, run_scenario, DemoParams, Scenario, ScenarioRun};
