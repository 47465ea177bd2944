use std::process::ExitCode;

use menuchat_tasks::api::TaskServer;
use menuchat_tasks::ServerConfig;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "menuchat_tasks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let server = match TaskServer::new(config) {
        Ok(server) => server,
        Err(err) => {
            error!("failed to initialise server: {err}");
            return ExitCode::FAILURE;
        }
    };

    match server.start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("server error: {err}");
            ExitCode::FAILURE
        }
    }
}
