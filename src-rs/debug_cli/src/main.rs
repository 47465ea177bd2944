mod cli;
mod models;
mod render;
mod repl;
mod signals;

use std::process::ExitCode;

use repl::REPL;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let config = cli::parse_config();

    let default_filter = if config.debug { "menuchat_tasks=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            render::error(&format!("failed to start runtime: {err}"));
            return ExitCode::FAILURE;
        }
    };
    let mut repl = match REPL::new(config, runtime) {
        Ok(repl) => repl,
        Err(err) => {
            render::error(&err);
            return ExitCode::FAILURE;
        }
    };
    repl.run();
    ExitCode::SUCCESS
}
