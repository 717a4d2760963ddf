mod batch;
mod coordinator;
mod service;
pub mod state;

pub use batch::{PollBatch, SourceBatch};
pub use coordinator::{poll_sources, single_poll, Poller};
pub use service::{BatchHandler, PollService};
pub use state::PollerState;
