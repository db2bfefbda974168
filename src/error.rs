use crate::models::BackendTarget;
use std::fmt;
use thiserror::Error;

/// How a remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connection,
    Http(u16),
    Protocol,
    /// The backend answered but rejected the request (duplicate content, validation).
    Application,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::Connection => f.write_str("connection error"),
            FailureKind::Http(status) => write!(f, "HTTP {}", status),
            FailureKind::Protocol => f.write_str("protocol error"),
            FailureKind::Application => f.write_str("rejected"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: FailureKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the failure looks like a wrong address, key or path.
    pub fn suggests_configuration(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::Connection => true,
            FailureKind::Http(status) => matches!(status, 401 | 403 | 404),
            FailureKind::Protocol | FailureKind::Application => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    MissingBackend(BackendTarget),
    #[error("{target} {field} is not set")]
    MissingField {
        target: BackendTarget,
        field: &'static str,
    },
    #[error("invalid {target} address '{address}': {reason}")]
    InvalidAddress {
        target: BackendTarget,
        address: String,
        reason: String,
    },
    #[error("failed to read configuration: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum HelparrError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("local storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("local storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("no quality profile selected")]
    NoProfileSelected,
}

impl HelparrError {
    pub fn suggests_configuration(&self) -> bool {
        match self {
            HelparrError::Config(_) => true,
            HelparrError::Remote(e) => e.suggests_configuration(),
            HelparrError::Storage(_)
            | HelparrError::Encoding(_)
            | HelparrError::NoProfileSelected => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HelparrError>;
