use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::registry::JobRegistry;
use super::types::{JobHandler, ProgressReporter};
use crate::error::RegistryError;
use crate::task::{Task, TaskError, TaskStore};

/// Creates tasks for submitted jobs and drives their handlers on the tokio runtime.
pub struct JobRunner {
    store: Arc<TaskStore>,
    registry: Arc<JobRegistry>,
}

impl JobRunner {
    pub fn new(store: Arc<TaskStore>, registry: Arc<JobRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Creates a pending task and starts its job in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, kind: &str, payload: Value) -> Result<Task, RegistryError> {
        let handler = self.registry.handler(kind)?;
        let task = self.store.create(kind);
        tokio::spawn(run_job(
            self.store.clone(),
            task.task_id.clone(),
            handler,
            payload,
        ));
        Ok(task)
    }
}

async fn run_job(store: Arc<TaskStore>, task_id: String, handler: JobHandler, payload: Value) {
    if let Err(err) = store.mark_processing(&task_id) {
        warn!(task_id = %task_id, "job not started: {err}");
        return;
    }

    let reporter = ProgressReporter::new(store.clone(), &task_id);
    // The handler runs in its own task so a panic fails the job instead of the runner.
    let outcome = tokio::spawn(handler(payload, reporter)).await;
    let recorded = match outcome {
        Ok(Ok(result)) => store.complete(&task_id, result),
        Ok(Err(error)) => store.fail(&task_id, error),
        Err(err) => store.fail(
            &task_id,
            TaskError::new(format!("job aborted: {err}")).with_code("panicked"),
        ),
    };

    match recorded {
        Ok(task) => info!(task_id = %task_id, kind = %task.kind, status = %task.status, "job finished"),
        Err(err) => warn!(task_id = %task_id, "job outcome dropped: {err}"),
    }
}
