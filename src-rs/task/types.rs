use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// `completed` and `failed` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Snapshot of a server-tracked unit of work, as served by `GET /tasks/{taskId}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub progress_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Checks the snapshot against the task model rules.
    ///
    /// A completed task may omit `result` (treated as `null`), but a failed task
    /// must carry an `error`, and neither field may appear before a terminal
    /// status.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.progress > 100 {
            return Err(format!("progress {} out of range", self.progress));
        }
        match self.status {
            TaskStatus::Pending | TaskStatus::Processing => {
                if self.result.is_some() || self.error.is_some() {
                    return Err(format!("{} task carries a result or error", self.status));
                }
                if self.completed_at.is_some() {
                    return Err(format!("{} task has completedAt", self.status));
                }
            }
            TaskStatus::Completed => {
                if self.error.is_some() {
                    return Err("completed task carries an error".to_string());
                }
            }
            TaskStatus::Failed => {
                if self.error.is_none() {
                    return Err("failed task has no error".to_string());
                }
                if self.result.is_some() {
                    return Err("failed task carries a result".to_string());
                }
            }
        }
        Ok(())
    }
}
