use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::handlers::MarketEventHandler;
use super::protocol::{MARKET_ADDED, MARKET_RESOLVED, PAYOUT_LOGS};
use crate::Result;

/// Subscriber invoked with the `data` object of an event
pub type Callback = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

/// Outcome of one `emit` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// In-process publish/subscribe registry keyed by event name.
///
/// Callbacks for one event run in registration order. A failing or panicking
/// callback is logged and skipped; it never reaches the emitter.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<Callback>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, event: impl Into<String>, callback: F)
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers.entry(event.into()).or_default().push(Arc::new(callback));
    }

    /// Wire the three market event slots of `handler`
    pub fn register_handler(&self, handler: Arc<dyn MarketEventHandler>) {
        let h = handler.clone();
        self.subscribe(MARKET_ADDED, move |data| h.on_market_added(data));
        let h = handler.clone();
        self.subscribe(MARKET_RESOLVED, move |data| h.on_market_resolved(data));
        self.subscribe(PAYOUT_LOGS, move |data| handler.on_payout_logs(data));
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Invoke every callback registered under `event` with `data`
    pub fn emit(&self, event: &str, data: &Value) -> DispatchSummary {
        // Snapshot so callbacks run without holding the lock
        let callbacks: Vec<Callback> = match self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(event)
        {
            Some(list) => list.clone(),
            None => return DispatchSummary::default(),
        };

        let mut summary = DispatchSummary::default();
        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(data))) {
                Ok(Ok(())) => summary.delivered += 1,
                Ok(Err(e)) => {
                    summary.failed += 1;
                    tracing::error!(event = %event, "Handler error for {}: {}", event, e);
                }
                Err(payload) => {
                    summary.failed += 1;
                    tracing::error!(
                        event = %event,
                        "Handler panicked for {}: {}",
                        event,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        summary
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
