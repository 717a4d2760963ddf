use anyhow::Result;

use polywire_core::poller::single_poll;
use polywire_core::AppConfig;

use super::display::{format_headlines, MAX_PER_SOURCE};

pub async fn run(config: &AppConfig, verbose: bool) -> Result<()> {
    println!("Polling {} feeds...", config.feeds.len());

    let batch = single_poll(config).await?;

    if batch.is_empty() {
        println!("\nNo new articles.");
        return Ok(());
    }

    println!("{}", format_headlines(&batch, MAX_PER_SOURCE, verbose));
    println!("{} new articles.", batch.total_new());

    Ok(())
}
