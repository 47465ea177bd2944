use serde_json::Value;
use tracing::{info, warn};

use super::state::PollEvent;
use crate::error::FetchError;
use crate::task::TaskError;

/// Side-effect boundary of a [`TaskPoller`](super::TaskPoller).
///
/// Callbacks run on the poller's driver task, outside any internal lock, so
/// they may call back into the poller (for example to `stop()` it).
pub trait TaskObserver: Send + Sync {
    /// Every non-terminal snapshot.
    fn on_progress(&self, _progress: u8, _message: &str) {}

    /// Exactly once, on the transition into `completed`.
    fn on_complete(&self, _result: &Value) {}

    /// Exactly once, on the transition into `failed`.
    fn on_error(&self, _error: &TaskError) {}

    /// A single status fetch failed; polling continues.
    fn on_transient_error(&self, _error: &FetchError) {}
}

pub(crate) fn dispatch(observer: &dyn TaskObserver, task_id: &str, events: Vec<PollEvent>) {
    for event in events {
        match event {
            PollEvent::Progress { progress, message } => observer.on_progress(progress, &message),
            PollEvent::Completed(result) => {
                info!(task_id, "task completed");
                observer.on_complete(&result);
            }
            PollEvent::Failed(error) => {
                info!(task_id, error = %error, "task failed");
                observer.on_error(&error);
            }
            PollEvent::TransientError(err) => {
                warn!(task_id, "status fetch failed, retrying on next tick: {err}");
                observer.on_transient_error(&err);
            }
        }
    }
}
