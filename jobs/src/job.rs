//! Job records and their execution state.

use std::collections::BTreeSet;
use std::fmt;

use bulkedit_core::{DocumentRef, RevisionId, Role, Rule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attribution::Attribution;
use crate::error::{ErrorKind, JobError, Result};

/// Options for rename jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveOptions {
    /// Leave a redirect at the old title.
    pub create_redirect: bool,

    /// Add the new title to the actor's watch set.
    pub watch: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            create_redirect: true,
            watch: false,
        }
    }
}

/// What a job changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum JobMode {
    /// Replace text in slot content. No roles means every slot.
    Edit {
        #[serde(default)]
        roles: BTreeSet<Role>,
    },
    /// Rename the document.
    Move(MoveOptions),
}

/// One independently executable replacement against one document.
///
/// A job owns copies of its rule and attribution and is never modified
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: Uuid,

    /// Target document as located.
    pub document: DocumentRef,

    /// Rule to apply.
    pub rule: Rule,

    /// Edit or rename.
    pub mode: JobMode,

    /// Who the change is attributed to.
    pub attribution: Attribution,

    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a content edit job.
    pub fn edit(
        document: DocumentRef,
        rule: Rule,
        roles: impl IntoIterator<Item = Role>,
        attribution: Attribution,
    ) -> Self {
        Self::new(
            document,
            rule,
            JobMode::Edit {
                roles: roles.into_iter().collect(),
            },
            attribution,
        )
    }

    /// Create a rename job.
    pub fn rename(
        document: DocumentRef,
        rule: Rule,
        options: MoveOptions,
        attribution: Attribution,
    ) -> Self {
        Self::new(document, rule, JobMode::Move(options), attribution)
    }

    fn new(document: DocumentRef, rule: Rule, mode: JobMode, attribution: Attribution) -> Self {
        Self {
            id: Uuid::new_v4(),
            document,
            rule,
            mode,
            attribution,
            created_at: Utc::now(),
        }
    }

    /// Encode as the opaque record handed to a queue.
    pub fn to_payload(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a queued record.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(payload)?)
    }
}

/// Execution state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Validating,
    Applying,
    Committed,
    Skipped,
    Failed,
}

impl JobState {
    /// Whether no further transitions happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Skipped | Self::Failed)
    }

    /// Whether the state machine allows moving to `next`.
    ///
    /// Non-terminal states may fall back to `Pending` when a transient
    /// error is retried.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Validating)
                | (Pending, Failed)
                | (Validating, Applying)
                | (Validating, Skipped)
                | (Validating, Failed)
                | (Validating, Pending)
                | (Applying, Committed)
                | (Applying, Skipped)
                | (Applying, Failed)
                | (Applying, Pending)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Applying => "applying",
            Self::Committed => "committed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub from: JobState,
    pub to: JobState,
    pub at: DateTime<Utc>,
}

/// Mutable execution record for one run of a job.
#[derive(Debug, Clone)]
pub struct JobExecution {
    job: Job,
    state: JobState,
    history: Vec<StateChange>,
    attempts: u32,
}

impl JobExecution {
    /// Start tracking a job in `Pending`.
    pub fn new(job: Job) -> Self {
        Self {
            job,
            state: JobState::Pending,
            history: Vec::new(),
            attempts: 0,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every transition so far, oldest first.
    pub fn history(&self) -> &[StateChange] {
        &self.history
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub(crate) fn transition(&mut self, to: JobState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "illegal job transition {} -> {to}",
            self.state
        );
        self.history.push(StateChange {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
    }
}

/// Final result of running a job.
#[derive(Debug)]
pub struct JobOutcome {
    /// Job that ran.
    pub job_id: Uuid,

    /// Target document as located.
    pub document: DocumentRef,

    /// Terminal state.
    pub state: JobState,

    /// Why the job failed, when it did.
    pub error: Option<JobError>,

    /// Revision created by an edit.
    pub revision: Option<RevisionId>,

    /// Title after a rename.
    pub new_title: Option<String>,

    /// Attempts made.
    pub attempts: u32,

    /// State changes, oldest first.
    pub history: Vec<StateChange>,

    /// When the job reached its terminal state.
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    /// Committed, skipped, or failed softly.
    pub fn is_success(&self) -> bool {
        match &self.error {
            Some(e) => e.kind() == ErrorKind::Soft,
            None => self.state != JobState::Failed,
        }
    }
}
