use async_trait::async_trait;
use serde_json::Value;

use crate::error::{FetchError, SubmitError};
use crate::task::Task;

/// Backend job API as seen by the submitter and the poller.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Creates a job of the given kind and returns its task id. Never retries.
    async fn submit(&self, kind: &str, payload: Value) -> Result<String, SubmitError>;

    /// Reads the current snapshot of a task.
    async fn fetch(&self, task_id: &str) -> Result<Task, FetchError>;
}
