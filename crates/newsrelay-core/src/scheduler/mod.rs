mod clock;
mod due;
mod models;
mod queue;
mod service;
pub mod tasks;

pub use clock::{Clock, SystemClock};
pub use due::{next_occurrence, Cadence, DueRules};
pub use models::{
    default_tasks, DueTime, Schedule, ScheduledTask, TaskTarget, CLEANUP_TARGET, CLEANUP_TASK_NAME,
    INGEST_TARGET,
};
pub use queue::{FireEntry, FireQueue};
pub use service::Scheduler;
