use anyhow::Result;
use chrono::Utc;

use newsrelay_core::storage::{Database, NewsRepository};

pub async fn run(db: &Database, today: bool, limit: u32) -> Result<()> {
    let repo = NewsRepository::new(db);

    let items = if today {
        let mut items = repo.list_for_day(Utc::now().date_naive()).await?;
        items.truncate(limit as usize);
        items
    } else {
        repo.list_recent(limit).await?
    };

    if items.is_empty() {
        println!("No items stored.");
        return Ok(());
    }

    for item in &items {
        let marker = if item.is_posted { "posted" } else { "pending" };
        println!(
            "[{}] {} ({})",
            item.posted_at.format("%Y-%m-%d %H:%M"),
            item.title,
            marker
        );
        println!("    {}", item.link);
    }

    Ok(())
}
