pub mod display;
pub mod feeds;
pub mod listen;
pub mod poll;
pub mod run;
pub mod watch;

use tokio::sync::watch as signal;
use tracing::info;

/// Shutdown flag that flips to true on Ctrl-C
pub fn shutdown_on_ctrl_c() -> signal::Receiver<bool> {
    let (tx, rx) = signal::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = tx.send(true);
    });
    rx
}
