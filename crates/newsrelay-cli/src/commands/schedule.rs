use anyhow::Result;
use chrono::Utc;

use newsrelay_core::{
    scheduler::{default_tasks, next_occurrence},
    storage::{Database, TaskRepository},
    AppConfig,
};

pub async fn run(db: &Database, config: &AppConfig) -> Result<()> {
    let mut tasks = TaskRepository::new(db).list_all().await?;

    if tasks.is_empty() {
        println!("No tasks registered yet; showing the defaults the daemon registers.\n");
        tasks = default_tasks(config.scheduler.cleanup_hour);
    }

    let now = Utc::now();
    let mut rows: Vec<_> = tasks
        .iter()
        .map(|task| (next_occurrence(task.schedule, now), task))
        .collect();
    rows.sort_by_key(|(next, _)| *next);

    println!("{:<28} {:<10} {:<22} {}", "TASK", "AT", "NEXT RUN", "LAST RUN");
    for (next, task) in rows {
        let next_run = if task.enabled {
            next.format("%Y-%m-%d %H:%M").to_string()
        } else {
            "disabled".to_string()
        };
        let last_run = task
            .last_run
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<28} {:<10} {:<22} {}",
            task.name,
            format!("{:02}:{:02}", task.schedule.hour, task.schedule.minute),
            next_run,
            last_run
        );
    }

    Ok(())
}
