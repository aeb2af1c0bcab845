use thiserror::Error;

use crate::driver::DriverError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TicketeraError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing credentials. Set TICKETERA_EMAIL and TICKETERA_PASSWORD or fill [credentials] in ticketera.toml.")]
    NoCredentials,

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Browser driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    SessionLost(#[from] SessionLost),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The authenticated session or its navigation context is gone. Fatal for the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("session lost: {reason}")]
pub struct SessionLost {
    pub reason: String,
}

impl SessionLost {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<DriverError> for SessionLost {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::SessionLost(reason) => Self { reason },
            other => Self {
                reason: other.to_string(),
            },
        }
    }
}

/// Record-scoped failures. Always recovered at the orchestrator's per-record boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// An expected signal never showed up, even after retries.
    #[error("{target} did not respond: {detail}")]
    TransientUi { target: String, detail: String },

    #[error("document already has a ticket")]
    Duplicate,

    /// Every locator strategy for a required control failed.
    #[error("could not locate {target} (tried: {})", attempted.join("; "))]
    LocatorExhausted {
        target: String,
        attempted: Vec<String>,
        /// Leading text of the page when the lookup gave up.
        excerpt: String,
    },

    /// The remote system showed an error banner nobody recognises.
    #[error("rejected by remote: {banner}")]
    Rejected { banner: String },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The driver refused an action in a way retrying will not fix.
    #[error("{target} failed: {detail}")]
    Interaction { target: String, detail: String },
}

/// Classifies a record failure for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// The record itself is unusable or the remote refused it.
    Business,
    /// The remote UI did not behave as expected.
    System,
}

impl RecordError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RecordError::Duplicate | RecordError::Rejected { .. } | RecordError::InvalidRecord(_) => {
                FailureKind::Business
            }
            RecordError::TransientUi { .. }
            | RecordError::LocatorExhausted { .. }
            | RecordError::Interaction { .. } => FailureKind::System,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Business => write!(f, "Business"),
            FailureKind::System => write!(f, "System"),
        }
    }
}
