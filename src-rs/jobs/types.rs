use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::task::{TaskError, TaskStore};

/// Boxed future returned by a [`JobHandler`].
pub type JobFuture = Pin<Box<dyn Future<Output = Result<Value, TaskError>> + Send>>;

/// Runs one job to completion, reporting progress along the way.
pub type JobHandler = Arc<dyn Fn(Value, ProgressReporter) -> JobFuture + Send + Sync>;

/// Writes a running job's progress into the task store.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<TaskStore>,
    task_id: String,
}

impl ProgressReporter {
    pub fn new(store: Arc<TaskStore>, task_id: &str) -> Self {
        Self {
            store,
            task_id: task_id.to_string(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn report(&self, progress: u8, message: &str) {
        if let Err(err) = self.store.report_progress(&self.task_id, progress, message) {
            debug!(task_id = %self.task_id, "progress dropped: {err}");
        }
    }
}

pub struct JobEntry {
    pub kind: String,
    pub handler: JobHandler,
}
