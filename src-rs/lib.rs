pub mod config;
pub mod error;

#[path = "task/lib.rs"]
pub mod task;
#[path = "client/lib.rs"]
pub mod client;
#[path = "poller/lib.rs"]
pub mod poller;
#[path = "jobs/lib.rs"]
pub mod jobs;
#[path = "api/lib.rs"]
pub mod api;

pub use client::{TaskApi, TaskClient};
pub use config::{ClientConfig, PollerConfig, ServerConfig};
pub use error::{ConfigError, FetchError, RegistryError, ServerError, StoreError, SubmitError};
pub use poller::{track_job, PollerState, TaskObserver, TaskPoller};
pub use task::{Task, TaskError, TaskStatus, TaskStore};
