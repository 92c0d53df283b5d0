//! Error types for job execution.

use bulkedit_core::{ActorId, ContentModel, CoreError, DocumentRef, Role, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for job operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// How a job error is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Recorded against the document, never retried.
    Fatal,
    /// Reported as a no-op success, never retried.
    Soft,
    /// Retried with backoff while attempts remain.
    Transient,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry.
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Errors a job can end with.
#[derive(Error, Debug)]
pub enum JobError {
    /// The planned title is not a legal title.
    #[error("invalid title {title:?}: {reason}")]
    InvalidTitle { title: String, reason: String },

    /// A role the job targets no longer exists on the document.
    #[error("slot {role:?} does not exist on {document}")]
    SlotMissing { document: DocumentRef, role: Role },

    /// A targeted slot does not hold plain text.
    #[error("slot {role:?} on {document} holds {model} content, not plain text")]
    UnsupportedContentType {
        document: DocumentRef,
        role: Role,
        model: ContentModel,
    },

    /// The rename cannot happen.
    #[error("cannot move {document} to {new_title:?}: {reason}")]
    MoveConflict {
        document: DocumentRef,
        new_title: String,
        reason: String,
    },

    /// The actor no longer holds the replace capability for the document.
    #[error("{actor} may no longer replace text in {document}")]
    PermissionExpired { actor: ActorId, document: DocumentRef },

    /// The actor is not a registered identity.
    #[error("{0} is not a registered identity")]
    UnknownActor(ActorId),

    /// The document no longer exists.
    #[error("document {0} no longer exists")]
    DocumentMissing(DocumentRef),

    /// Slot content kept reading back with the unreadable marker.
    #[error("slot {role:?} on {document} stayed unreadable after {attempts} reads")]
    Unreadable {
        document: DocumentRef,
        role: Role,
        attempts: u32,
    },

    /// A transient storage error persisted through every retry.
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    /// Storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The job's rule could not be used.
    #[error("rule error: {0}")]
    Rule(CoreError),

    /// A queued job record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JobError {
    /// Classify the error for retry and reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionExpired { .. } => ErrorKind::Soft,
            Self::Storage(e) if e.is_transient() => ErrorKind::Transient,
            _ => ErrorKind::Fatal,
        }
    }

    /// Whether the document belongs on the "could not be processed" list.
    pub fn is_unprocessable(&self) -> bool {
        matches!(self, Self::MoveConflict { .. } | Self::InvalidTitle { .. })
    }
}

impl From<CoreError> for JobError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Storage(e) => Self::Storage(e),
            CoreError::InvalidTitle { title, reason } => Self::InvalidTitle { title, reason },
            other => Self::Rule(other),
        }
    }
}
