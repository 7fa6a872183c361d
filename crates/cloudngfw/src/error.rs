//! Error types for the convergence core

use std::fmt;
use thiserror::Error;

/// Category of a failure reported by the remote API client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The addressed object does not exist
    NotFound,
    /// The object exists but the request conflicts with its current state
    Conflict,
    /// Throttling, timeouts and server-side failures
    Transient,
    /// Anything else: bad requests, authorization, unknown codes
    Fatal,
}

impl RemoteErrorKind {
    /// Classify an HTTP-style status code
    pub fn from_status(code: u16) -> Self {
        match code {
            404 => RemoteErrorKind::NotFound,
            409 => RemoteErrorKind::Conflict,
            408 | 429 => RemoteErrorKind::Transient,
            500..=599 => RemoteErrorKind::Transient,
            _ => RemoteErrorKind::Fatal,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteErrorKind::NotFound => write!(f, "not found"),
            RemoteErrorKind::Conflict => write!(f, "conflict"),
            RemoteErrorKind::Transient => write!(f, "transient"),
            RemoteErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Error produced by a remote client call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} remote error{}: {message}", .code.map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub code: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    /// Build from a status code and the response message
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::from_status(code),
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_status(404, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

/// Cloud NGFW core errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Malformed identifier '{id}': {reason}")]
    MalformedIdentifier { id: String, reason: String },

    #[error("Conflicting values for {name}: '{explicit}' (field) vs '{tagged}' (tag)")]
    AttributeConflict {
        name: String,
        explicit: String,
        tagged: String,
    },

    #[error("Missing required attribute: {0}")]
    MissingRequiredAttribute(String),

    #[error("Status fetch for {resource} failed: {source}")]
    RemoteFetch {
        resource: String,
        #[source]
        source: RemoteError,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("{resource} reached failure status {status}")]
    TerminalFailure { resource: String, status: String },

    #[error(
        "Timed out waiting for {resource} after {attempts} attempts (last status: {last_status}); the change may still converge"
    )]
    PollTimedOut {
        resource: String,
        last_status: String,
        attempts: u32,
    },

    #[error("Wait for {0} cancelled")]
    Cancelled(String),

    #[error("Deadline exceeded while waiting for {0}")]
    DeadlineExceeded(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    Config(#[from] cloudngfw_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        CloudError::MalformedIdentifier {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Remote object is gone; only ever true for errors raised by the client
    pub fn is_not_found(&self) -> bool {
        match self {
            CloudError::Remote(e) => e.is_not_found(),
            CloudError::RemoteFetch { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether repeating the whole operation later might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CloudError::Remote(e) => e.kind == RemoteErrorKind::Transient,
            CloudError::RemoteFetch { source, .. } => source.kind == RemoteErrorKind::Transient,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
