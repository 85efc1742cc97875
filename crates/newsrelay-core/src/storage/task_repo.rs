use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::scheduler::{Schedule, ScheduledTask};
use crate::{Error, Result};

/// Repository for the scheduled task registry
pub struct TaskRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct TaskRow {
    name: String,
    target: String,
    hour: i64,
    minute: i64,
    enabled: i32,
    last_run: Option<DateTime<Utc>>,
}

impl From<TaskRow> for ScheduledTask {
    fn from(row: TaskRow) -> Self {
        ScheduledTask {
            name: row.name,
            target: row.target,
            schedule: Schedule::new(row.hour.clamp(0, 23) as u32, row.minute.clamp(0, 59) as u32),
            enabled: row.enabled != 0,
            last_run: row.last_run,
        }
    }
}

impl<'a> TaskRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert each task unless one with the same name exists; returns how many were created
    pub async fn seed(&self, tasks: &[ScheduledTask]) -> Result<u32> {
        let mut created = 0;

        for task in tasks {
            let result = sqlx::query(
                r#"
                INSERT INTO scheduled_tasks (name, target, hour, minute, enabled, last_run)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(name) DO NOTHING
                "#,
            )
            .bind(&task.name)
            .bind(&task.target)
            .bind(i64::from(task.schedule.hour))
            .bind(i64::from(task.schedule.minute))
            .bind(task.enabled as i32)
            .bind(task.last_run)
            .execute(self.db.pool())
            .await?;

            if result.rows_affected() > 0 {
                created += 1;
            }
        }

        Ok(created)
    }

    pub async fn list_enabled(&self) -> Result<Vec<ScheduledTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT name, target, hour, minute, enabled, last_run
            FROM scheduled_tasks
            WHERE enabled = 1
            ORDER BY hour, minute, name
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(ScheduledTask::from).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<ScheduledTask>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT name, target, hour, minute, enabled, last_run
            FROM scheduled_tasks
            ORDER BY hour, minute, name
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(ScheduledTask::from).collect())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<ScheduledTask>> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            SELECT name, target, hour, minute, enabled, last_run
            FROM scheduled_tasks
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(ScheduledTask::from))
    }

    /// Record an execution attempt
    pub async fn update_last_run(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE scheduled_tasks SET last_run = ? WHERE name = ?")
            .bind(at)
            .bind(name)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TaskNotFound(name.to_string()));
        }
        Ok(())
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let result = sqlx::query("UPDATE scheduled_tasks SET enabled = ? WHERE name = ?")
            .bind(enabled as i32)
            .bind(name)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TaskNotFound(name.to_string()));
        }
        Ok(())
    }
}
