use chrono::{DateTime, Duration, DurationRound, Utc};

use super::models::{Schedule, ScheduledTask};
use crate::config::SchedulerConfig;

const SECONDS_PER_DAY: i64 = 86_400;

/// Spacing class of a task, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Hourly,
    Daily,
}

impl Cadence {
    pub fn of(task_name: &str) -> Self {
        if task_name.contains("cleanup") {
            Cadence::Daily
        } else {
            Cadence::Hourly
        }
    }
}

/// Tolerance and minimum-spacing rules deciding when a task may fire
#[derive(Debug, Clone, Copy)]
pub struct DueRules {
    pub tolerance: Duration,
    pub hourly_spacing: Duration,
    pub daily_spacing: Duration,
}

impl Default for DueRules {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

impl DueRules {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            tolerance: secs(config.tolerance_secs),
            hourly_spacing: secs(config.hourly_min_spacing_secs),
            daily_spacing: secs(config.daily_min_spacing_secs),
        }
    }

    pub fn spacing(&self, cadence: Cadence) -> Duration {
        match cadence {
            Cadence::Hourly => self.hourly_spacing,
            Cadence::Daily => self.daily_spacing,
        }
    }

    /// Whether `now` (to the minute) lies within the tolerance window of the
    /// schedule. The window wraps midnight.
    pub fn in_window(&self, schedule: Schedule, now: DateTime<Utc>) -> bool {
        let now = truncate_to_minute(now);
        let now_secs = now.timestamp().rem_euclid(SECONDS_PER_DAY);
        let diff = (now_secs - schedule.seconds_of_day()).abs();
        let distance = diff.min(SECONDS_PER_DAY - diff);

        distance <= self.tolerance.num_seconds()
    }

    /// A task is due when `now` is inside its window and the last run, if
    /// any, is at least the minimum spacing for its cadence ago
    pub fn is_due(&self, task: &ScheduledTask, now: DateTime<Utc>) -> bool {
        if !self.in_window(task.schedule, now) {
            return false;
        }

        match task.last_run {
            Some(last_run) => {
                let since = truncate_to_minute(now) - last_run;
                since >= self.spacing(Cadence::of(&task.name))
            }
            None => true,
        }
    }

    /// Whether the window around `fire_at` has closed by `now` (to the minute)
    pub fn window_closed(&self, fire_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        fire_at + self.tolerance < truncate_to_minute(now)
    }

    /// Fire time of the earliest occurrence whose window has not yet closed
    pub fn current_or_next_fire(&self, schedule: Schedule, now: DateTime<Utc>) -> DateTime<Utc> {
        let mut fire = occurrence_on(schedule, now) - Duration::days(1);
        while self.window_closed(fire, now) {
            fire += Duration::days(1);
        }
        fire
    }
}

/// Next occurrence of the schedule strictly after `after`
pub fn next_occurrence(schedule: Schedule, after: DateTime<Utc>) -> DateTime<Utc> {
    let today = occurrence_on(schedule, after);
    if today <= after {
        today + Duration::days(1)
    } else {
        today
    }
}

fn occurrence_on(schedule: Schedule, day: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = day
        .date_naive()
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    midnight + Duration::seconds(schedule.seconds_of_day())
}

fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::minutes(1)).unwrap_or(at)
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1000))
}
