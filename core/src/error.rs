//! Error types for match location, planning and corpus access.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while locating matches or planning replacements.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The rule itself is malformed (empty target).
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// The scope cannot be queried (no namespaces, zero limit).
    #[error("scope error: {0}")]
    Scope(String),

    /// The rule is a regex that does not compile.
    #[error("pattern error in {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    /// A regex rule was run against a corpus without a pattern operator.
    #[error("corpus does not support regular expression queries")]
    RegexUnsupported,

    /// A planned title violates title legality rules.
    #[error("invalid title {title:?}: {reason}")]
    InvalidTitle { title: String, reason: String },

    /// Corpus storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Build a pattern error for the given source pattern.
    pub fn pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            source: Box::new(source),
        }
    }

    /// Build an invalid-title error.
    pub fn invalid_title(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTitle {
            title: title.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must block a whole submission before any preview.
    pub fn is_pre_commit(&self) -> bool {
        matches!(
            self,
            Self::InvalidRule(_) | Self::Scope(_) | Self::Pattern { .. } | Self::RegexUnsupported
        )
    }
}

/// Storage-specific errors reported by corpus implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The document does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The write was based on a revision that is no longer the latest.
    #[error("edit conflict on {document}: expected revision {expected}, found {actual}")]
    Conflict {
        document: String,
        expected: u64,
        actual: u64,
    },

    /// A rename destination is already occupied.
    #[error("title already taken: {0}")]
    TitleTaken(String),

    /// A temporary failure; the operation may succeed if retried.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// Failed to read a snapshot or record.
    #[error("failed to read: {0}")]
    Read(String),

    /// Failed to write a snapshot or record.
    #[error("failed to write: {0}")]
    Write(String),
}

impl StorageError {
    /// Whether retrying the same operation against fresh state may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pre_commit_classification() {
        assert!(CoreError::Scope("no namespaces".to_string()).is_pre_commit());
        assert!(CoreError::RegexUnsupported.is_pre_commit());
        assert!(!CoreError::invalid_title("", "empty").is_pre_commit());
        assert!(!CoreError::Storage(StorageError::Transient("busy".into())).is_pre_commit());
    }

    #[test]
    fn test_transient_storage_errors() {
        assert!(StorageError::Transient("timeout".into()).is_transient());
        assert!(
            StorageError::Conflict {
                document: "0:Foo".into(),
                expected: 1,
                actual: 2
            }
            .is_transient()
        );
        assert!(!StorageError::TitleTaken("0:Foo".into()).is_transient());
    }
}
