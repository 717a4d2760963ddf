//! Wire format for inbound market events
//!
//! Every request body is a JSON envelope `{"event": "<name>", "data": {...}}`.
//! The bus only looks at the envelope; the typed payloads below are read by
//! handlers that care about a specific event.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MARKET_ADDED: &str = "market_added";
pub const MARKET_RESOLVED: &str = "market_resolved";
pub const PAYOUT_LOGS: &str = "payout_logs";

/// Reasons an inbound body is rejected
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("{0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("body must be a JSON object")]
    NotAnObject,

    #[error("Missing 'event'")]
    MissingEvent,
}

/// A validated event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Parse a request body. An empty body reads as `{}` and is then
    /// rejected for its missing event; `data` defaults to an empty object.
    pub fn from_slice(body: &[u8]) -> Result<Self, EnvelopeError> {
        let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Map::new())
        } else {
            serde_json::from_slice(body)?
        };

        let Value::Object(mut fields) = payload else {
            return Err(EnvelopeError::NotAnObject);
        };

        let event = match fields.remove("event") {
            Some(Value::String(event)) if !event.is_empty() => event,
            _ => return Err(EnvelopeError::MissingEvent),
        };

        let data = match fields.remove("data") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(data) => data,
        };

        Ok(Self { event, data })
    }
}

/// A newly listed market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub condition_id: String,
    pub question: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMarket {
    pub condition_id: String,
    #[serde(default)]
    pub winning_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutLog {
    pub user_name: String,
    pub market: String,
    pub token: String,
    /// Sent either as a JSON number or a decimal string
    #[serde(deserialize_with = "number_or_string")]
    pub shares_paid: f64,
    #[serde(default)]
    pub is_winner: bool,
    #[serde(default)]
    pub timestamp: String,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Read a list field of `data`, skipping (and logging) malformed elements
fn read_list<T>(data: &Value, field: &str) -> Vec<T>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(items) = data.get(field).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Skipping malformed entry in '{}': {}", field, e);
                None
            }
        })
        .collect()
}

/// Markets listed in a `market_added` payload
pub fn added_markets(data: &Value) -> Vec<Market> {
    read_list(data, "markets")
}

/// Markets listed in a `market_resolved` payload
pub fn resolved_markets(data: &Value) -> Vec<ResolvedMarket> {
    read_list(data, "markets")
}

/// Records listed in a `payout_logs` payload
pub fn payout_logs(data: &Value) -> Vec<PayoutLog> {
    read_list(data, "payouts")
}
