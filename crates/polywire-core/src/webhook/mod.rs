mod bus;
mod handlers;
pub mod protocol;
mod server;

pub use bus::{Callback, DispatchSummary, EventBus};
pub use handlers::{LoggingHandler, MarketEventHandler, MarketIndexHandler};
pub use protocol::{Envelope, EnvelopeError, Market, PayoutLog, ResolvedMarket};
pub use server::{router, ServerState, WebhookServer};
