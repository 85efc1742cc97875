use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsrelay_core::{storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "newsrelay")]
#[command(author, version, about = "Relays new items from a news feed to a Telegram chat")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler in the foreground until Ctrl+C
    Daemon,
    /// Fetch and deliver news once, now
    Trigger,
    /// Remove items past the retention period
    Cleanup,
    /// Show the latest run status and delivery counters
    Status {
        /// Number of recent status records to list
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: u32,
    },
    /// Show when each scheduled task runs next
    Schedule,
    /// List stored items
    Articles {
        /// Only items stored today (UTC)
        #[arg(short, long)]
        today: bool,
        /// Maximum number of items to list
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Daemon => commands::daemon::run(config).await,
        Commands::Trigger => commands::trigger::run(config).await,
        Commands::Cleanup => commands::cleanup::run(config).await,
        Commands::Status { limit } => {
            let db = Database::new(&config).await?;
            commands::status::run(&db, limit).await
        }
        Commands::Schedule => {
            let db = Database::new(&config).await?;
            commands::schedule::run(&db, &config).await
        }
        Commands::Articles { today, limit } => {
            let db = Database::new(&config).await?;
            commands::articles::run(&db, today, limit).await
        }
    }
}
