use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use super::driver::TaskPoller;
use super::observer::TaskObserver;
use crate::client::TaskApi;
use crate::config::PollerConfig;
use crate::error::SubmitError;

/// Submits a job and starts polling the task it created.
///
/// A submission failure is returned as-is and no poller is created.
pub async fn track_job(
    api: Arc<dyn TaskApi>,
    kind: &str,
    payload: Value,
    config: PollerConfig,
    observer: Arc<dyn TaskObserver>,
) -> Result<TaskPoller, SubmitError> {
    let task_id = api.submit(kind, payload).await?;
    info!(task_id = %task_id, kind, "job accepted");
    let poller = TaskPoller::new(api, config, observer);
    poller.start(&task_id);
    Ok(poller)
}
