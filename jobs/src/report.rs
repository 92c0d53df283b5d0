//! Per-batch outcome report.

use bulkedit_core::DocumentRef;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::job::{JobOutcome, JobState};

/// A document a job could not handle, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document: DocumentRef,
    pub reason: String,
}

/// Mixed outcome of a batch of jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Documents changed.
    pub committed: Vec<DocumentRef>,

    /// Documents with nothing left to replace.
    pub skipped: Vec<DocumentRef>,

    /// Documents the actor may no longer change. Not treated as errors.
    pub permission_expired: Vec<DocumentRef>,

    /// Renames that conflicted and titles that were illegal.
    pub unprocessable: Vec<DocumentFailure>,

    /// Every other failure.
    pub failed: Vec<DocumentFailure>,
}

impl BatchReport {
    /// Build a report from outcomes.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = JobOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report.sort();
        report
    }

    /// Add one outcome.
    pub fn record(&mut self, outcome: JobOutcome) {
        match (outcome.state, outcome.error) {
            (JobState::Committed, _) => self.committed.push(outcome.document),
            (JobState::Skipped, _) => self.skipped.push(outcome.document),
            (_, Some(err)) if err.kind() == ErrorKind::Soft => {
                self.permission_expired.push(outcome.document);
            }
            (_, Some(err)) => {
                let failure = DocumentFailure {
                    document: outcome.document,
                    reason: err.to_string(),
                };
                if err.is_unprocessable() {
                    self.unprocessable.push(failure);
                } else {
                    self.failed.push(failure);
                }
            }
            (state, None) => self.failed.push(DocumentFailure {
                document: outcome.document,
                reason: format!("ended in {state} without an error"),
            }),
        }
    }

    /// Order every list by `(namespace, title)`.
    pub fn sort(&mut self) {
        self.committed.sort();
        self.skipped.sort();
        self.permission_expired.sort();
        self.unprocessable.sort_by(|a, b| a.document.cmp(&b.document));
        self.failed.sort_by(|a, b| a.document.cmp(&b.document));
    }

    /// Number of outcomes recorded.
    pub fn total(&self) -> usize {
        self.committed.len()
            + self.skipped.len()
            + self.permission_expired.len()
            + self.unprocessable.len()
            + self.failed.len()
    }

    /// Whether anything needs the caller's attention.
    pub fn has_failures(&self) -> bool {
        !self.unprocessable.is_empty() || !self.failed.is_empty()
    }

    /// One-line human summary.
    pub fn summary_line(&self) -> String {
        format!(
            "{} committed, {} skipped, {} permission expired, {} could not be processed, {} failed",
            self.committed.len(),
            self.skipped.len(),
            self.permission_expired.len(),
            self.unprocessable.len(),
            self.failed.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use bulkedit_core::{ActorId, DocumentId, NamespaceId, StorageError};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn outcome(id: u64, state: JobState, error: Option<JobError>) -> JobOutcome {
        JobOutcome {
            job_id: Uuid::new_v4(),
            document: DocumentRef::new(DocumentId(id), NamespaceId::MAIN, format!("Doc{id}")),
            state,
            error,
            revision: None,
            new_title: None,
            attempts: 1,
            history: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_outcomes_are_bucketed() {
        let page = DocumentRef::new(DocumentId(9), NamespaceId::MAIN, "Doc9");
        let report = BatchReport::from_outcomes([
            outcome(2, JobState::Committed, None),
            outcome(1, JobState::Committed, None),
            outcome(3, JobState::Skipped, None),
            outcome(
                4,
                JobState::Failed,
                Some(JobError::PermissionExpired {
                    actor: ActorId::new("Ann"),
                    document: page.clone(),
                }),
            ),
            outcome(
                5,
                JobState::Failed,
                Some(JobError::MoveConflict {
                    document: page,
                    new_title: "Report".into(),
                    reason: "destination title exists".into(),
                }),
            ),
            outcome(
                6,
                JobState::Failed,
                Some(JobError::Storage(StorageError::Write("disk full".into()))),
            ),
        ]);

        let committed: Vec<_> = report.committed.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(committed, vec!["Doc1", "Doc2"]);
        assert_eq!(report.total(), 6);
        assert!(report.has_failures());
        assert_eq!(
            report.summary_line(),
            "2 committed, 1 skipped, 1 permission expired, 1 could not be processed, 1 failed"
        );
    }
}
