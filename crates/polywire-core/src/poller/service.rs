use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info};

use super::batch::PollBatch;
use super::coordinator::Poller;
use crate::Result;

/// Receives the result of every poll cycle
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn handle(&self, batch: Arc<PollBatch>) -> Result<()>;
}

/// Continuous poll loop: poll, hand off the batch, sleep, repeat
pub struct PollService {
    poller: Poller,
    interval: Duration,
    handler: Arc<dyn BatchHandler>,
}

impl PollService {
    pub fn new(poller: Poller, interval: Duration, handler: Arc<dyn BatchHandler>) -> Self {
        Self {
            poller,
            interval,
            handler,
        }
    }

    /// Run until the shutdown signal flips to true.
    ///
    /// The signal is only observed between cycles; a cycle in progress always
    /// completes and persists its state. Returns the poller so callers can
    /// inspect the final state.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Poller {
        info!(
            "Poll loop started: {} sources every {}s",
            self.poller.sources().len(),
            self.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = Arc::new(self.poller.poll_all().await);
            self.dispatch(batch).await;

            if !wait_for_next_cycle(self.interval, &mut shutdown).await {
                break;
            }
        }

        info!("Poll loop received shutdown signal");
        self.poller
    }

    async fn dispatch(&self, batch: Arc<PollBatch>) {
        let handler = self.handler.clone();
        match tokio::spawn(async move { handler.handle(batch).await }).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Batch handler failed: {}", e),
            Err(e) => error!("Batch handler panicked: {}", e),
        }
    }
}

/// Sleep for `interval`; false if shutdown was requested meanwhile
async fn wait_for_next_cycle(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown.changed() => match changed {
                Ok(()) => {
                    if *shutdown.borrow() {
                        return false;
                    }
                }
                // Sender dropped: no stop can arrive, so sleep out the interval
                Err(_) => {
                    (&mut sleep).await;
                    return true;
                }
            }
        }
    }
}
