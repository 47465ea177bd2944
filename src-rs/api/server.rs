use std::future::Future;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::api::handlers::{
    handle_get_task, handle_health, handle_submit, handle_tasks, require_token, AppState,
};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::jobs::{menu_analysis, JobRegistry, JobRunner};
use crate::task::TaskStore;

pub struct TaskServer {
    pub config: ServerConfig,
    state: AppState,
}

impl TaskServer {
    /// Server with the built-in `menu-analysis` job.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let registry = JobRegistry::new();
        registry.register(
            menu_analysis::KIND,
            menu_analysis::handler(config.analysis_step_delay),
        )?;
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: ServerConfig, registry: JobRegistry) -> Result<Self, ServerError> {
        let store = match &config.store_path {
            Some(path) => TaskStore::open(path.clone())?,
            None => TaskStore::new(None),
        };
        let runner = Arc::new(JobRunner::new(Arc::new(store), Arc::new(registry)));
        let state = AppState {
            runner,
            token: config.token.as_deref().map(Arc::from),
        };
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        let protected = Router::new()
            .route("/tasks", get(handle_tasks))
            .route("/tasks/:task_id", get(handle_get_task))
            .route("/jobs/:kind", post(handle_submit))
            .route_layer(middleware::from_fn_with_state(self.state.clone(), require_token));

        Router::new()
            .route("/health", get(handle_health))
            .merge(protected)
            .with_state(self.state.clone())
    }

    /// Binds `0.0.0.0:<port>` and serves until Ctrl-C.
    pub async fn start(&self) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr).map_err(|err| ServerError::Bind(err.to_string()))?;
        self.serve(listener, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
    }

    /// Serves on an already-bound listener until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|err| ServerError::Bind(err.to_string()))?;
        listener
            .set_nonblocking(true)
            .map_err(|err| ServerError::Bind(err.to_string()))?;
        info!(%addr, kinds = ?self.state.runner.registry().kinds(), "task server listening");

        axum::Server::from_tcp(listener)
            .map_err(|err| ServerError::Bind(err.to_string()))?
            .serve(self.router().into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| ServerError::Serve(err.to_string()))
    }
}
