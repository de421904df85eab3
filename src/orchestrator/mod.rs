//! Master coordination: research fan-out to workers and the main
//! trading loop.

mod master;
mod research;

pub use master::{CycleReport, MasterLoop, SystemStatus};
pub use research::ResearchOrchestrator;
