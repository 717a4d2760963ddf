use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use polywire_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "polywire")]
#[command(author, version, about = "Deduplicating news poller and prediction market event listener")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every feed once and print new headlines
    Poll {
        /// Show summaries and categories
        #[arg(short, long)]
        verbose: bool,
    },
    /// Poll continuously until interrupted
    Watch {
        /// Seconds between poll cycles (overrides config)
        #[arg(short, long)]
        interval_secs: Option<u64>,
        /// Show summaries and categories
        #[arg(short, long)]
        verbose: bool,
    },
    /// Listen for market events
    Listen {
        /// Keep the market index up to date instead of only logging events
        #[arg(long)]
        index: bool,
    },
    /// Run the event listener and the poll loop together, matching news to markets
    Run,
    /// List configured feeds and their cache validators
    Feeds,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, warnings) = AppConfig::load_with_warnings()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    for warning in warnings {
        tracing::warn!("{}", warning);
    }

    match cli.command {
        Commands::Poll { verbose } => commands::poll::run(&config, verbose).await,
        Commands::Watch {
            interval_secs,
            verbose,
        } => commands::watch::run(&config, interval_secs, verbose).await,
        Commands::Listen { index } => commands::listen::run(&config, index).await,
        Commands::Run => commands::run::run(&config).await,
        Commands::Feeds => commands::feeds::run(&config),
    }
}
