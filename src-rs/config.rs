use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing for a [`TaskPoller`](crate::poller::TaskPoller).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PollerConfig {
    /// Delay between the end of one fetch and the start of the next.
    pub interval: Duration,
    /// Upper bound on a single status fetch.
    pub fetch_timeout: Duration,
}

impl PollerConfig {
    pub fn new(interval: Duration, fetch_timeout: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }
        if fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("fetch timeout"));
        }
        Ok(Self {
            interval,
            fetch_timeout,
        })
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|value| !value.trim().is_empty());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// When set, every route except `/health` requires `Authorization: Bearer <token>`.
    pub token: Option<String>,
    pub store_path: Option<PathBuf>,
    /// Simulated time spent per image by the `menu-analysis` job.
    pub analysis_step_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            token: None,
            store_path: None,
            analysis_step_delay: Duration::from_millis(750),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; `MENUCHAT_TASKS_PORT` wins over `PORT`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match non_empty(&lookup, "MENUCHAT_TASKS_PORT").or_else(|| non_empty(&lookup, "PORT")) {
            Some(raw) => parse_value::<u16>("port", &raw)?,
            None => defaults.port,
        };
        let analysis_step_delay = match non_empty(&lookup, "MENUCHAT_TASKS_STEP_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_value::<u64>("MENUCHAT_TASKS_STEP_DELAY_MS", &raw)?),
            None => defaults.analysis_step_delay,
        };
        Ok(Self {
            port,
            token: non_empty(&lookup, "MENUCHAT_TASKS_TOKEN"),
            store_path: non_empty(&lookup, "MENUCHAT_TASKS_STORE").map(PathBuf::from),
            analysis_step_delay,
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
