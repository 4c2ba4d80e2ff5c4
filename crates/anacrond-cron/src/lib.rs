//! anacrond-cron: the due-job determination and execution engine.
//!
//! Catch-up ("anacron-style") scheduling: jobs carry an interval in whole
//! days derived from their cron-style schedule, and a job is due whenever at
//! least that many days have elapsed since its last attempted run — however
//! long the process was down in between.

pub mod evaluate;
pub mod manager;
pub mod schedule;
pub mod scheduler;

pub use evaluate::due_jobs;
pub use manager::{JobManager, ManageError};
pub use schedule::{ScheduleError, interval_days};
pub use scheduler::{Scheduler, SchedulerHandle};
