//! anacrond-exec: external command execution and the execution log.

pub mod executor;
pub mod log;

pub use executor::{ExecutionReport, Executor, Outcome, list_scripts, script_exists};
pub use log::{ExecutionLog, ExecutionRecord, LogError};
