use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::types::{JobEntry, JobHandler};
use crate::error::RegistryError;

pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, kind: &str, handler: JobHandler) -> Result<(), RegistryError> {
        if kind.trim().is_empty() || kind.contains('/') {
            return Err(RegistryError::InvalidKind);
        }

        let mut map = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(kind) {
            return Err(RegistryError::Duplicate(kind.to_string()));
        }
        map.insert(
            kind.to_string(),
            JobEntry {
                kind: kind.to_string(),
                handler,
            },
        );
        Ok(())
    }

    pub fn handler(&self, kind: &str) -> Result<JobHandler, RegistryError> {
        let map = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        map.get(kind)
            .map(|entry| entry.handler.clone())
            .ok_or_else(|| RegistryError::Unknown(kind.to_string()))
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> Vec<String> {
        let map = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut kinds: Vec<String> = map.values().map(|entry| entry.kind.clone()).collect();
        kinds.sort();
        kinds
    }

}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::jobs::types::{JobFuture, ProgressReporter};

    fn echo() -> JobHandler {
        Arc::new(|payload: Value, _reporter: ProgressReporter| -> JobFuture {
            Box::pin(async move { Ok(payload) })
        })
    }

    #[test]
    fn registers_and_looks_up() {
        let registry = JobRegistry::new();
        registry.register("echo", echo()).unwrap();
        assert!(registry.handler("echo").is_ok());
        assert_eq!(registry.kinds(), vec!["echo".to_string()]);
    }

    #[test]
    fn rejects_duplicates_and_bad_names() {
        let registry = JobRegistry::new();
        registry.register("echo", echo()).unwrap();
        assert_eq!(
            registry.register("echo", echo()),
            Err(RegistryError::Duplicate("echo".to_string()))
        );
        assert_eq!(registry.register("  ", echo()), Err(RegistryError::InvalidKind));
        assert_eq!(registry.register("a/b", echo()), Err(RegistryError::InvalidKind));
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let registry = JobRegistry::new();
        assert_eq!(
            registry.handler("menu-analysis").err(),
            Some(RegistryError::Unknown("menu-analysis".to_string()))
        );
    }
}
