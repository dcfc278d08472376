pub mod decision;
pub mod orchestrator;
pub mod report;

pub use decision::{decide, EntryAction, InstallReason};
pub use orchestrator::Orchestrator;
pub use report::{EntryOutcome, PlanReport, PlannedStep, RunReport};
