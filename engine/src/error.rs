//! Error types for the replace engine.

use bulkedit_core::CoreError;
use bulkedit_jobs::JobError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while previewing or committing a submission.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Locating, planning or corpus access failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Creating or queueing jobs failed.
    #[error(transparent)]
    Job(#[from] JobError),

    /// The submission is inconsistent.
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    /// A line of a bulk rule file is malformed.
    #[error("rule file line {line}: {message}")]
    RulesFile { line: usize, message: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the error blocked the submission before any preview existed.
    pub fn is_pre_commit(&self) -> bool {
        match self {
            Self::Core(e) => e.is_pre_commit(),
            Self::InvalidSubmission(_) => true,
            _ => false,
        }
    }
}
