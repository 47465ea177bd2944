use std::time::Duration;

use menuchat_tasks::jobs::menu_analysis;
use menuchat_tasks::{ClientConfig, ConfigError, PollerConfig};
use serde_json::{json, Value};

#[derive(Clone, Debug)]
pub struct CLIConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub interval_ms: u64,
    pub fetch_timeout_ms: u64,
    pub debug: bool,
}

impl CLIConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url).with_token(self.token.clone())
    }

    pub fn poller_config(&self) -> Result<PollerConfig, ConfigError> {
        PollerConfig::new(
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.fetch_timeout_ms),
        )
    }
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Exit,
    Help,
    Submit { kind: String, payload: Value },
    Analyze { images: Vec<String> },
    Watch(String),
    Status(String),
    Tasks(usize),
    Interval(Option<u64>),
    Debug(Option<bool>),
    Config,
    Base(Option<String>),
    Token(Option<String>),
    Unknown(String),
}

impl Command {
    /// Parses one non-empty REPL line. A line without a leading `/` is a
    /// list of images for a `menu-analysis` job.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let Some(body) = line.strip_prefix('/') else {
            let images = line.split_whitespace().map(str::to_string).collect();
            return Ok(Self::Analyze { images });
        };
        let (cmd, rest) = match body.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (body, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());
        let command = match cmd {
            "exit" | "quit" => Self::Exit,
            "help" => Self::Help,
            "submit" => {
                let (kind, raw) = match rest.split_once(char::is_whitespace) {
                    Some((kind, raw)) => (kind, raw.trim()),
                    None => (rest, ""),
                };
                if kind.is_empty() {
                    return Err("usage: /submit <kind> [json]".to_string());
                }
                let payload = if raw.is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(raw).map_err(|err| format!("invalid payload: {err}"))?
                };
                Self::Submit {
                    kind: kind.to_string(),
                    payload,
                }
            }
            "watch" => Self::Watch(arg.ok_or("usage: /watch <taskId>")?),
            "status" => Self::Status(arg.ok_or("usage: /status <taskId>")?),
            "tasks" => Self::Tasks(rest.parse().unwrap_or(10)),
            "interval" => match arg {
                None => Self::Interval(None),
                Some(raw) => match raw.parse::<u64>() {
                    Ok(ms) if ms > 0 => Self::Interval(Some(ms)),
                    _ => return Err("interval must be a positive number of milliseconds".to_string()),
                },
            },
            "debug" => match arg {
                None => Self::Debug(None),
                Some(raw) => Self::Debug(Some(parse_on_off(&raw).ok_or("invalid debug flag")?)),
            },
            "config" => Self::Config,
            "base" => Self::Base(arg),
            "token" => Self::Token(arg),
            other => Self::Unknown(other.to_string()),
        };
        Ok(command)
    }
}

/// Payload for a `menu-analysis` job over the given images.
pub fn analysis_payload(images: &[String]) -> (String, Value) {
    (menu_analysis::KIND.to_string(), json!({ "images": images }))
}

pub fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
