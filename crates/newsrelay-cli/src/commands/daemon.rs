use anyhow::Result;
use tracing::info;

use newsrelay_core::{AppConfig, NewsRelay};

/// Run the scheduler until Ctrl+C
pub async fn run(config: AppConfig) -> Result<()> {
    if !config.scheduler.enabled {
        println!("Scheduler is disabled ([scheduler] enabled = false). Nothing to do.");
        return Ok(());
    }

    let tick = config.scheduler.tick_secs;
    let relay = NewsRelay::from_config(config).await?;

    relay.start_scheduler().await?;

    println!(
        "Daemon started (PID: {}). Press Ctrl+C to stop.",
        std::process::id()
    );
    println!("  Tick: {} seconds", tick);
    if let Some(next) = relay.list_due_times().await?.first() {
        println!(
            "  Next task: {} at {}",
            next.task_name,
            next.next_run.format("%Y-%m-%d %H:%M UTC")
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    relay.stop_scheduler().await;
    println!("Daemon stopped.");

    Ok(())
}
