use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            poller: PollerConfig::default(),
            feeds: default_feeds(),
            webhook: WebhookConfig::default(),
            ai: AiConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Entries taken from the top of each feed per cycle
    #[serde(default = "default_max_items")]
    pub max_items_per_feed: usize,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// User-Agent sent with feed requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// HTTP proxy URL for feed fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Override for the persisted poller state file
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_items_per_feed: default_max_items(),
            request_timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            proxy_url: None,
            state_file: None,
        }
    }
}

/// A named feed to poll. Order in the config file is the poll order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_host")]
    pub host: String,
    #[serde(default = "default_webhook_port")]
    pub port: u16,
    /// The only path that accepts events
    #[serde(default = "default_webhook_path")]
    pub path: String,
    /// Upper bound on waiting for in-flight requests when stopping
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_webhook_host(),
            port: default_webhook_port(),
            path: default_webhook_path(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl WebhookConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// OpenAI API key (falls back to OPENAI_API_KEY)
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Markets returned per article when matching
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            embedding_model: default_embedding_model(),
            top_k: default_top_k(),
        }
    }
}

impl AiConfig {
    /// Configured key, or the OPENAI_API_KEY environment variable
    pub fn api_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector collection holding market questions
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Cap on markets accepted from one market_added event
    #[serde(default)]
    pub max_markets: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            max_markets: None,
        }
    }
}

fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("BBC News", "https://feeds.bbci.co.uk/news/rss.xml"),
        FeedSource::new("NPR", "https://feeds.npr.org/1001/rss.xml"),
    ]
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("polywire")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    900 // 15 minutes
}

fn default_max_items() -> usize {
    20
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "RSSNewsPoller/1.0".to_string()
}

fn default_webhook_host() -> String {
    "0.0.0.0".to_string()
}

fn default_webhook_port() -> u16 {
    8001
}

fn default_webhook_path() -> String {
    "/market-event".to_string()
}

fn default_shutdown_timeout() -> u64 {
    2
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_collection() -> String {
    "markets".to_string()
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        let (config, warnings) = Self::load_with_warnings()?;
        for warning in warnings {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// Like [`AppConfig::load`], but hands back the warnings instead of
    /// logging them, for callers that set up logging from the config.
    pub fn load_with_warnings() -> crate::Result<(Self, Vec<String>)> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        let mut warnings = Vec::new();
        if let Ok(raw) = std::env::var("RSS_TIMEOUT_SECS") {
            warnings.extend(config.apply_timeout_override(&raw));
        }

        config.validate()?;
        Ok((config, warnings))
    }

    /// Apply an `RSS_TIMEOUT_SECS` value; returns a warning if it is unusable
    fn apply_timeout_override(&mut self, raw: &str) -> Option<String> {
        match raw.trim().parse::<f64>() {
            Ok(secs) if secs > 0.0 && secs.is_finite() => {
                self.poller.request_timeout_secs = secs.ceil() as u64;
                None
            }
            _ => Some(format!("Ignoring invalid RSS_TIMEOUT_SECS value: {}", raw)),
        }
    }

    /// Parse configuration from TOML content
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Reject feed lists the poller cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let mut names = HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(crate::Error::Config(format!(
                    "Feed with URL {} has an empty name",
                    feed.url
                )));
            }
            if !names.insert(feed.name.as_str()) {
                return Err(crate::Error::Config(format!(
                    "Duplicate feed name: {}",
                    feed.name
                )));
            }
            Url::parse(&feed.url).map_err(|e| {
                crate::Error::Config(format!("Invalid URL for feed '{}': {}", feed.name, e))
            })?;
        }

        if !self.webhook.path.starts_with('/') {
            return Err(crate::Error::Config(format!(
                "Webhook path must start with '/': {}",
                self.webhook.path
            )));
        }

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/polywire/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("polywire")
            .join("config.toml")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    /// Get the poller state file path
    pub fn state_path(&self) -> PathBuf {
        match &self.poller.state_file {
            Some(path) => expand_tilde(path),
            None => self.data_dir().join("rss_poller_state.json"),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poller.interval_secs)
    }
}
