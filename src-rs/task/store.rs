use std::collections::HashMap;
use std::fs;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{Task, TaskError, TaskStatus};
use crate::error::StoreError;

static COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Backend-side registry of tasks, optionally mirrored to a JSON file.
pub struct TaskStore {
    path: Option<PathBuf>,
    tasks: RwLock<HashMap<String, Task>>,
    // Held from snapshot to rename so files land in snapshot order.
    save_lock: Mutex<()>,
}

impl TaskStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            tasks: RwLock::new(HashMap::new()),
            save_lock: Mutex::new(()),
        }
    }

    /// Opens a persisted store. A missing file yields an empty store.
    ///
    /// Tasks that were still pending or processing when the file was written
    /// belonged to a job runner that no longer exists, so they are failed with
    /// code `interrupted`.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let mut tasks = HashMap::new();
        if path.exists() {
            let data = fs::read_to_string(&path).map_err(|err| StoreError::Load(err.to_string()))?;
            let list: Vec<Task> =
                serde_json::from_str(&data).map_err(|err| StoreError::Load(err.to_string()))?;
            let now = Utc::now();
            for mut task in list {
                if !task.is_terminal() {
                    warn!(task_id = %task.task_id, "failing task interrupted by restart");
                    task.status = TaskStatus::Failed;
                    task.error = Some(
                        TaskError::new("task interrupted by server restart").with_code("interrupted"),
                    );
                    task.completed_at = Some(now);
                }
                tasks.insert(task.task_id.clone(), task);
            }
        }
        let store = Self {
            path: Some(path),
            tasks: RwLock::new(tasks),
            save_lock: Mutex::new(()),
        };
        store.save_if_needed();
        Ok(store)
    }

    pub fn create(&self, kind: &str) -> Task {
        let id = next_id();
        let task = Task {
            task_id: id.clone(),
            kind: kind.to_string(),
            status: TaskStatus::Pending,
            progress: 0,
            progress_message: "Queued".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, task.clone());
        debug!(task_id = %task.task_id, kind, "task created");
        self.save_if_needed();
        task
    }

    pub fn mark_processing(&self, id: &str) -> Result<Task, StoreError> {
        self.transition(id, |task| {
            task.status = TaskStatus::Processing;
        })
    }

    /// Records progress; the stored value never decreases and is capped at 100.
    pub fn report_progress(&self, id: &str, progress: u8, message: &str) -> Result<Task, StoreError> {
        self.transition(id, |task| {
            task.status = TaskStatus::Processing;
            task.progress = task.progress.max(progress.min(100));
            task.progress_message = message.to_string();
        })
    }

    pub fn complete(&self, id: &str, result: Value) -> Result<Task, StoreError> {
        self.transition(id, |task| {
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.progress_message = "Completed".to_string();
            task.result = Some(result);
            task.completed_at = Some(Utc::now());
        })
    }

    pub fn fail(&self, id: &str, error: TaskError) -> Result<Task, StoreError> {
        self.transition(id, |task| {
            task.status = TaskStatus::Failed;
            task.progress_message = "Failed".to_string();
            task.error = Some(error);
            task.completed_at = Some(Utc::now());
        })
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Newest first.
    pub fn list(&self, limit: usize) -> Vec<Task> {
        let map = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
        let mut items: Vec<Task> = map.values().cloned().collect();
        items.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.task_id.cmp(&a.task_id))
        });
        items.truncate(limit);
        items
    }

    fn transition<F>(&self, id: &str, apply: F) -> Result<Task, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        let updated = {
            let mut map = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
            let task = map
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if task.is_terminal() {
                return Err(StoreError::AlreadyTerminal {
                    id: id.to_string(),
                    status: task.status,
                });
            }
            apply(task);
            task.clone()
        };
        self.save_if_needed();
        Ok(updated)
    }

    fn save_if_needed(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let serialized = {
            let map = self.tasks.read().unwrap_or_else(PoisonError::into_inner);
            let mut list: Vec<&Task> = map.values().collect();
            list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            serde_json::to_string_pretty(&list)
        };
        let serialized = match serialized {
            Ok(serialized) => serialized,
            Err(err) => {
                warn!("failed to serialize tasks: {err}");
                return;
            }
        };
        let tmp = tmp_path(path);
        if let Err(err) = fs::write(&tmp, serialized).and_then(|()| fs::rename(&tmp, path)) {
            warn!(path = %path.display(), "failed to persist tasks: {err}");
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn next_id() -> String {
    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("task_{}_{}", Utc::now().timestamp_millis(), count)
}
