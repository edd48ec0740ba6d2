//! Relay configuration.
//!
//! Values arrive as raw strings (env vars, CLI flags). Anything absent,
//! non-numeric or zero falls back to the default instead of failing startup.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_BATCH_LIMIT: u32 = 100;
pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_TOPIC: &str = "message_topic";

pub const ENV_POLL_INTERVAL_MS: &str = "RELAY_POLL_INTERVAL_MS";
pub const ENV_BATCH_LIMIT: &str = "RELAY_BATCH_LIMIT";
pub const ENV_WORKERS: &str = "RELAY_WORKERS";
pub const ENV_TOPIC: &str = "RELAY_TOPIC";

/// Unparsed configuration values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRelayConfig {
    pub poll_interval_ms: Option<String>,
    pub batch_limit: Option<String>,
    pub workers: Option<String>,
    pub topic: Option<String>,
}

impl RawRelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read every key through `lookup` (env, a map in tests, ...).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            poll_interval_ms: lookup(ENV_POLL_INTERVAL_MS),
            batch_limit: lookup(ENV_BATCH_LIMIT),
            workers: lookup(ENV_WORKERS),
            topic: lookup(ENV_TOPIC),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub poll_interval: Duration,
    /// Upper bound on messages fetched per cycle.
    pub batch_limit: u32,
    pub workers: usize,
    pub topic: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            batch_limit: DEFAULT_BATCH_LIMIT,
            workers: DEFAULT_WORKERS,
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_raw(&RawRelayConfig::from_env())
    }

    pub fn from_raw(raw: &RawRelayConfig) -> Self {
        let poll_interval_ms = parse_positive(
            ENV_POLL_INTERVAL_MS,
            raw.poll_interval_ms.as_deref(),
            DEFAULT_POLL_INTERVAL_MS,
        );
        let topic = match raw.topic.as_deref().map(str::trim) {
            Some(topic) if !topic.is_empty() => topic.to_string(),
            _ => DEFAULT_TOPIC.to_string(),
        };

        Self {
            poll_interval: Duration::from_millis(poll_interval_ms),
            batch_limit: parse_positive(ENV_BATCH_LIMIT, raw.batch_limit.as_deref(), DEFAULT_BATCH_LIMIT),
            workers: parse_positive(ENV_WORKERS, raw.workers.as_deref(), DEFAULT_WORKERS),
            topic,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_batch_limit(mut self, batch_limit: u32) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

fn parse_positive<T>(key: &str, raw: Option<&str>, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    let Some(value) = raw else {
        return default;
    };
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed > T::default() => parsed,
        _ => {
            warn!(key, value, "invalid configuration value; using default");
            default
        }
    }
}
