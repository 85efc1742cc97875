use anyhow::Result;

use newsrelay_core::{AppConfig, NewsRelay};

pub async fn run(config: AppConfig) -> Result<()> {
    println!("Fetching news from {}...\n", config.feed.url);

    let relay = NewsRelay::from_config(config).await?;
    let report = relay.run_ingestion_once().await?;

    println!("Outcome:  {}", report.outcome);
    println!("Found:    {}", report.articles_found);
    println!("New:      {}", report.new_articles);
    println!("Posted:   {}", report.articles_posted);
    if let Some(message) = &report.message {
        println!("Message:  {}", message);
    }

    if !report.is_success() {
        anyhow::bail!("run finished with an error");
    }

    Ok(())
}
