pub mod config;
pub mod error;
pub mod feed;
pub mod index;
pub mod poller;
pub mod webhook;

pub use config::{AppConfig, FeedSource};
pub use error::{Error, Result};
pub use poller::{PollBatch, PollService, Poller};
pub use webhook::{EventBus, WebhookServer};
