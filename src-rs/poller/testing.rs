use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::observer::TaskObserver;
use crate::client::TaskApi;
use crate::error::{FetchError, SubmitError};
use crate::task::{Task, TaskError, TaskStatus};

pub fn snap(id: &str, status: TaskStatus, progress: u8) -> Task {
    Task {
        task_id: id.to_string(),
        kind: "menu-analysis".to_string(),
        status,
        progress,
        progress_message: format!("at {progress}"),
        result: (status == TaskStatus::Completed).then(|| json!({"sections": 3})),
        error: (status == TaskStatus::Failed).then(|| TaskError::new("invalid file")),
        created_at: Utc::now(),
        completed_at: status.is_terminal().then(Utc::now),
    }
}

/// Serves scripted fetch outcomes in order, then repeats the last one.
pub struct ScriptedApi {
    script: Mutex<VecDeque<Result<Task, FetchError>>>,
    last: Mutex<Option<Result<Task, FetchError>>>,
    fetches: AtomicUsize,
    delay: Duration,
    accept_submissions: bool,
}

impl ScriptedApi {
    pub fn new(script: Vec<Result<Task, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            delay: Duration::ZERO,
            accept_submissions: true,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn rejecting_submissions(mut self) -> Self {
        self.accept_submissions = false;
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskApi for ScriptedApi {
    async fn submit(&self, _kind: &str, _payload: Value) -> Result<String, SubmitError> {
        if self.accept_submissions {
            Ok("t1".to_string())
        } else {
            Err(SubmitError::Status {
                status: 422,
                body: "bad payload".to_string(),
            })
        }
    }

    async fn fetch(&self, _task_id: &str) -> Result<Task, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match next {
            Some(outcome) => {
                *last = Some(outcome.clone());
                outcome
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(FetchError::Network("script exhausted".to_string()))),
        }
    }
}

#[derive(Default)]
pub struct Recorder {
    progress: Mutex<Vec<u8>>,
    completed: Mutex<Vec<Value>>,
    failed: Mutex<Vec<TaskError>>,
    transient: Mutex<Vec<FetchError>>,
}

impl Recorder {
    pub fn progress(&self) -> Vec<u8> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn completed(&self) -> Vec<Value> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn failed(&self) -> Vec<TaskError> {
        self.failed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn transient(&self) -> Vec<FetchError> {
        self.transient.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TaskObserver for Recorder {
    fn on_progress(&self, progress: u8, _message: &str) {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(progress);
    }

    fn on_complete(&self, result: &Value) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result.clone());
    }

    fn on_error(&self, error: &TaskError) {
        self.failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }

    fn on_transient_error(&self, error: &FetchError) {
        self.transient
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }
}
