use anyhow::Result;

use polywire_core::poller::PollerState;
use polywire_core::AppConfig;

pub fn run(config: &AppConfig) -> Result<()> {
    if config.feeds.is_empty() {
        println!("No feeds configured.");
        println!("\nAdd feeds to {}:", AppConfig::config_path().display());
        println!("  [[feeds]]");
        println!("  name = \"Example\"");
        println!("  url = \"https://example.com/rss.xml\"");
        return Ok(());
    }

    let state_path = config.state_path();
    let state = PollerState::try_load(&state_path)?;

    println!("Feeds ({}):\n", config.feeds.len());
    for feed in &config.feeds {
        println!("  {}", feed.name);
        println!("    URL: {}", feed.url);

        let validator = state.validator(&feed.name);
        if let Some(ref etag) = validator.etag {
            println!("    ETag: {}", etag);
        }
        if let Some(ref last_modified) = validator.last_modified {
            println!("    Last-Modified: {}", last_modified);
        }
        println!();
    }

    println!("State file: {}", state_path.display());
    println!("Articles seen: {}", state.seen_count());

    Ok(())
}
