//! Timer-free core of the task poller.
//!
//! `idle → loading → polling → settled`, with `stopped` reachable from
//! `loading` and `polling`. The async driver feeds fetch outcomes in through
//! [`PollerCore::apply`] and turns the returned [`PollEvent`]s into observer
//! callbacks.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::task::{Task, TaskError, TaskStatus};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PollerState {
    /// No task id yet.
    #[default]
    Idle,
    /// First fetch for the current task has not produced a snapshot.
    Loading,
    /// At least one non-terminal snapshot observed; fetching on a timer.
    Polling,
    /// Terminal snapshot observed (or the task is unknown to the backend).
    Settled,
    /// Observation cancelled by the caller. The job itself may still run.
    Stopped,
}

impl PollerState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Loading | Self::Polling)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollEvent {
    Progress { progress: u8, message: String },
    Completed(Value),
    Failed(TaskError),
    TransientError(FetchError),
}

/// Identifies one fetch attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    pub task_id: String,
    pub seq: u64,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct PollerCore {
    state: PollerState,
    task_id: Option<String>,
    snapshot: Option<Task>,
    last_error: Option<FetchError>,
    generation: u64,
    next_seq: u64,
    applied_seq: u64,
}

impl PollerCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn snapshot(&self) -> Option<&Task> {
        self.snapshot.as_ref()
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// Bumped on every successful `start`; outcomes from older runs are ignored.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Begins tracking `task_id`. Returns `false` without changing anything
    /// while another observation is still loading or polling.
    pub fn start(&mut self, task_id: &str) -> bool {
        if self.state.is_active() {
            if self.task_id.as_deref() != Some(task_id) {
                warn!(
                    current = self.task_id.as_deref().unwrap_or_default(),
                    requested = task_id,
                    "already tracking a task, stop it first"
                );
            }
            return false;
        }
        self.generation += 1;
        self.state = PollerState::Loading;
        self.task_id = Some(task_id.to_string());
        self.snapshot = None;
        self.last_error = None;
        self.applied_seq = 0;
        true
    }

    /// Idempotent; only an active observation can be stopped.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_active() {
            return false;
        }
        self.state = PollerState::Stopped;
        true
    }

    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        if !self.state.is_active() {
            return None;
        }
        let task_id = self.task_id.clone()?;
        self.next_seq += 1;
        Some(FetchTicket {
            task_id,
            seq: self.next_seq,
            generation: self.generation,
        })
    }

    pub fn apply(&mut self, ticket: &FetchTicket, outcome: Result<Task, FetchError>) -> Vec<PollEvent> {
        if ticket.generation != self.generation || !self.state.is_active() {
            debug!(seq = ticket.seq, "discarding outcome for inactive observation");
            return Vec::new();
        }
        if ticket.seq <= self.applied_seq {
            debug!(seq = ticket.seq, applied = self.applied_seq, "discarding out-of-order outcome");
            return Vec::new();
        }
        self.applied_seq = ticket.seq;

        match outcome {
            Ok(task) => self.apply_snapshot(ticket, task),
            Err(err) if err.is_transient() => self.transient(err),
            Err(err) => {
                self.state = PollerState::Settled;
                let error = TaskError::new(format!("task {} not found", ticket.task_id)).with_code("not_found");
                self.last_error = Some(err);
                vec![PollEvent::Failed(error)]
            }
        }
    }

    fn apply_snapshot(&mut self, ticket: &FetchTicket, mut task: Task) -> Vec<PollEvent> {
        if task.task_id != ticket.task_id {
            return self.transient(FetchError::Decode(format!(
                "snapshot for {} while polling {}",
                task.task_id, ticket.task_id
            )));
        }

        task.progress = task.progress.min(100);
        if let Some(previous) = &self.snapshot {
            task.progress = task.progress.max(previous.progress);
        }
        if let Err(reason) = task.check_invariants() {
            warn!(task_id = %task.task_id, "inconsistent snapshot: {reason}");
        }
        self.last_error = None;

        let events = match task.status {
            TaskStatus::Pending | TaskStatus::Processing => {
                self.state = PollerState::Polling;
                vec![PollEvent::Progress {
                    progress: task.progress,
                    message: task.progress_message.clone(),
                }]
            }
            TaskStatus::Completed => {
                self.state = PollerState::Settled;
                vec![PollEvent::Completed(task.result.clone().unwrap_or(Value::Null))]
            }
            TaskStatus::Failed => {
                self.state = PollerState::Settled;
                let error = task
                    .error
                    .clone()
                    .unwrap_or_else(|| TaskError::new("task failed without an error message"));
                vec![PollEvent::Failed(error)]
            }
        };
        self.snapshot = Some(task);
        events
    }

    fn transient(&mut self, err: FetchError) -> Vec<PollEvent> {
        self.last_error = Some(err.clone());
        vec![PollEvent::TransientError(err)]
    }
}
