use std::sync::Arc;

use chrono::Duration;

use super::clock::Clock;
use super::models::{ScheduledTask, TaskTarget};
use crate::pipeline::{run_cleanup, CleanupReport, IngestionPipeline, RunReport};
use crate::storage::{Database, TaskRepository};

/// Everything a scheduled routine needs, shared by all task executions
#[derive(Clone)]
pub struct TaskContext {
    pub db: Database,
    pub pipeline: Arc<IngestionPipeline>,
    pub retention: Duration,
    pub clock: Arc<dyn Clock>,
}

/// Fetch the feed and deliver new items
pub async fn fetch_and_post_news(pipeline: &IngestionPipeline) -> RunReport {
    pipeline.run().await
}

/// Remove items past the retention horizon
pub async fn cleanup_old_articles(db: &Database, retention: Duration) -> CleanupReport {
    run_cleanup(db, retention).await
}

/// Run one task to completion and record the attempt.
///
/// The routine runs on its own tokio task so a panic inside it is contained
/// here; `last_run` is updated whether the routine succeeded, failed or
/// panicked. A task naming an unknown routine is logged and skipped without
/// touching `last_run`.
pub async fn execute(task: ScheduledTask, ctx: TaskContext) {
    let target: TaskTarget = match task.target.parse() {
        Ok(target) => target,
        Err(e) => {
            tracing::error!(task = %task.name, "Skipping task: {}", e);
            return;
        }
    };

    tracing::info!(task = %task.name, "Starting scheduled task");
    let started = std::time::Instant::now();

    let routine_ctx = ctx.clone();
    let routine = tokio::spawn(async move {
        match target {
            TaskTarget::Ingest => {
                let report = fetch_and_post_news(&routine_ctx.pipeline).await;
                format!(
                    "{}: posted {}/{} new ({} found){}",
                    report.outcome,
                    report.articles_posted,
                    report.new_articles,
                    report.articles_found,
                    report.message.map(|m| format!(", {}", m)).unwrap_or_default()
                )
            }
            TaskTarget::Cleanup => {
                let report = cleanup_old_articles(&routine_ctx.db, routine_ctx.retention).await;
                format!("{}: removed {}", report.outcome, report.removed)
            }
        }
    });

    match routine.await {
        Ok(summary) => {
            tracing::info!(
                task = %task.name,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Completed scheduled task: {}",
                summary
            );
        }
        Err(e) => {
            tracing::error!(task = %task.name, "Scheduled task failed: {}", e);
        }
    }

    let repo = TaskRepository::new(&ctx.db);
    if let Err(e) = repo.update_last_run(&task.name, ctx.clock.now()).await {
        tracing::error!(task = %task.name, "Failed to update last run time: {}", e);
    }
}
