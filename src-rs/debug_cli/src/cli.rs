use clap::Parser;

use crate::models::CLIConfig;

/// Interactive client for the MenuChat task backend.
#[derive(Debug, Parser)]
#[command(name = "menuchat-tasks-cli", version)]
pub struct Args {
    /// Base URL of the task backend.
    #[arg(long = "base", env = "MENUCHAT_TASKS_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Bearer token sent with every request.
    #[arg(long, env = "MENUCHAT_TASKS_TOKEN")]
    pub token: Option<String>,

    /// Delay between status fetches.
    #[arg(long, env = "MENUCHAT_TASKS_INTERVAL_MS", default_value_t = 2000)]
    pub interval_ms: u64,

    /// Upper bound on a single status fetch.
    #[arg(long, env = "MENUCHAT_TASKS_FETCH_TIMEOUT_MS", default_value_t = 10_000)]
    pub fetch_timeout_ms: u64,

    /// Print transient fetch errors and full snapshots.
    #[arg(long, env = "MENUCHAT_TASKS_DEBUG")]
    pub debug: bool,
}

impl From<Args> for CLIConfig {
    fn from(args: Args) -> Self {
        Self {
            base_url: args.base_url,
            token: args.token.filter(|token| !token.trim().is_empty()),
            interval_ms: args.interval_ms,
            fetch_timeout_ms: args.fetch_timeout_ms,
            debug: args.debug,
        }
    }
}

pub fn parse_config() -> CLIConfig {
    Args::parse().into()
}
