use std::time::Duration;

use thiserror::Error;

use crate::task::TaskStatus;

/// A job could not be created; no tracking begins.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission failed: network error: {0}")]
    Network(String),

    #[error("submission failed: http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("submission failed: malformed response: {0}")]
    MalformedResponse(String),
}

/// A single status fetch failed.
///
/// Everything except [`FetchError::NotFound`] is transient: the job may still
/// be progressing server-side and the next scheduled poll retries it.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed task snapshot: {0}")]
    Decode(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task {id} is already {status}")]
    AlreadyTerminal { id: String, status: TaskStatus },

    #[error("failed to load tasks: {0}")]
    Load(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("invalid job kind")]
    InvalidKind,

    #[error("job kind already registered: {0}")]
    Duplicate(String),

    #[error("unknown job kind: {0}")]
    Unknown(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to bind listener: {0}")]
    Bind(String),

    #[error("server error: {0}")]
    Serve(String),
}
