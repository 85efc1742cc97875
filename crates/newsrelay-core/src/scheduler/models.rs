use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

pub const INGEST_TARGET: &str = "fetch_and_post_news";
pub const CLEANUP_TARGET: &str = "cleanup_old_articles";
pub const CLEANUP_TASK_NAME: &str = "cleanup_old_articles_daily";

/// Time of day (UTC) a task fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Schedule {
    pub hour: u32,
    pub minute: u32,
}

impl Schedule {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Seconds since midnight
    pub fn seconds_of_day(&self) -> i64 {
        i64::from(self.hour) * 3600 + i64::from(self.minute) * 60
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02} UTC", self.hour, self.minute)
    }
}

/// Routine a task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskTarget {
    Ingest,
    Cleanup,
}

impl TaskTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskTarget::Ingest => INGEST_TARGET,
            TaskTarget::Cleanup => CLEANUP_TARGET,
        }
    }
}

impl FromStr for TaskTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            INGEST_TARGET => Ok(TaskTarget::Ingest),
            CLEANUP_TARGET => Ok(TaskTarget::Cleanup),
            other => Err(Error::UnknownTask(other.to_string())),
        }
    }
}

/// A named, time-scheduled task.
///
/// `target` is kept as stored text so that a record naming a routine this
/// build does not know about can still be loaded, logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub name: String,
    pub target: String,
    pub schedule: Schedule,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
}

impl ScheduledTask {
    pub fn new(name: impl Into<String>, target: TaskTarget, schedule: Schedule) -> Self {
        Self {
            name: name.into(),
            target: target.as_str().to_string(),
            schedule,
            enabled: true,
            last_run: None,
        }
    }
}

/// The task set registered at scheduler start: one ingestion task per hour
/// at minute 0 and a daily cleanup.
pub fn default_tasks(cleanup_hour: u32) -> Vec<ScheduledTask> {
    let mut tasks: Vec<ScheduledTask> = (0..24)
        .map(|hour| {
            ScheduledTask::new(
                format!("news_hour_{:02}", hour),
                TaskTarget::Ingest,
                Schedule::new(hour, 0),
            )
        })
        .collect();

    tasks.push(ScheduledTask::new(
        CLEANUP_TASK_NAME,
        TaskTarget::Cleanup,
        Schedule::new(cleanup_hour % 24, 0),
    ));

    tasks
}

/// Next fire time for a task, as reported across the process boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueTime {
    pub task_name: String,
    pub next_run: DateTime<Utc>,
    pub schedule: Schedule,
    pub last_run: Option<DateTime<Utc>>,
}
