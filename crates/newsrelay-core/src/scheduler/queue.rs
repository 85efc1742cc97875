use std::cmp::Reverse;
use std::collections::BinaryHeap;

use chrono::{DateTime, Duration, Utc};

use super::due::DueRules;
use super::models::ScheduledTask;

/// A pending fire time for a named task
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FireEntry {
    pub fire_at: DateTime<Utc>,
    pub task_name: String,
}

/// Min-heap of upcoming fire times, so a tick only looks at tasks whose
/// window has opened
#[derive(Debug, Default)]
pub struct FireQueue {
    heap: BinaryHeap<Reverse<FireEntry>>,
}

impl FireQueue {
    /// Queue the current or next occurrence of every enabled task
    pub fn build(tasks: &[ScheduledTask], rules: &DueRules, now: DateTime<Utc>) -> Self {
        let mut queue = Self::default();
        for task in tasks.iter().filter(|t| t.enabled) {
            queue.push(task.name.clone(), rules.current_or_next_fire(task.schedule, now));
        }
        queue
    }

    pub fn push(&mut self, task_name: String, fire_at: DateTime<Utc>) {
        self.heap.push(Reverse(FireEntry { fire_at, task_name }));
    }

    /// Requeue a task one day after `entry`, skipping days whose window has
    /// already closed
    pub fn push_next_day(&mut self, entry: FireEntry, rules: &DueRules, now: DateTime<Utc>) {
        let mut fire_at = entry.fire_at + Duration::days(1);
        while rules.window_closed(fire_at, now) {
            fire_at += Duration::days(1);
        }
        self.push(entry.task_name, fire_at);
    }

    /// Remove and return every entry whose window has opened by `now`, earliest first
    pub fn pop_open(&mut self, rules: &DueRules, now: DateTime<Utc>) -> Vec<FireEntry> {
        let mut open = Vec::new();
        while let Some(Reverse(next)) = self.heap.peek() {
            if next.fire_at - rules.tolerance > now {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                open.push(entry);
            }
        }
        open
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
