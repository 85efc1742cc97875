use anyhow::Result;
use chrono::{Duration, Utc};

use newsrelay_core::{
    pipeline::run_cleanup,
    storage::Database,
    AppConfig,
};

pub async fn run(config: AppConfig) -> Result<()> {
    println!(
        "Cleaning up items older than {} days...",
        config.general.retention_days
    );

    let db = Database::new(&config).await?;
    let retention = Duration::days(i64::from(config.general.retention_days));
    let report = run_cleanup(&db, retention).await;

    if !report.is_success() {
        anyhow::bail!(
            "cleanup failed: {}",
            report.message.as_deref().unwrap_or("unknown error")
        );
    }

    if report.removed > 0 {
        let cutoff = Utc::now() - retention;
        println!(
            "Deleted {} old items (stored before {}).",
            report.removed,
            cutoff.format("%Y-%m-%d %H:%M UTC")
        );
    } else {
        println!("No items to clean up.");
    }

    Ok(())
}
