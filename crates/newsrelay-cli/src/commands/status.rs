use anyhow::Result;
use chrono::Utc;

use newsrelay_core::{
    pipeline::{RunKind, RunStatus},
    storage::{Database, NewsRepository, StatusRepository},
};

fn describe(status: &RunStatus) -> String {
    let message = status
        .message
        .as_deref()
        .map(|m| format!(" - {}", m))
        .unwrap_or_default();

    format!(
        "{} at {}, {} posted{}",
        status.outcome,
        status.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        status.articles_posted,
        message
    )
}

pub async fn run(db: &Database, limit: u32) -> Result<()> {
    let statuses = StatusRepository::new(db);
    let stats = NewsRepository::new(db).statistics(Utc::now()).await?;

    println!("Delivered items: {} total, {} today\n", stats.total_posted, stats.posted_today);

    for kind in [RunKind::Ingestion, RunKind::Cleanup] {
        match statuses.latest(kind).await? {
            Some(status) => println!("Last {} run: {}", kind, describe(&status)),
            None => println!("Last {} run: never", kind),
        }
    }

    let recent = statuses.list_recent(limit).await?;
    if !recent.is_empty() {
        println!("\nRecent runs:");
        for status in &recent {
            println!("  [{}] {}", status.kind, describe(status));
        }
    }

    Ok(())
}
