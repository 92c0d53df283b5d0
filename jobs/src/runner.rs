//! Runs one job through validation, application and commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bulkedit_core::{
    CoreError, Document, DocumentStore, RenameRequest, ReplacementPlanner, RevisionEdit,
    RevisionId, Role, SlotContent, StorageError, TitlePolicy,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::authority::{Authority, Right};
use crate::error::{ErrorKind, JobError, Result};
use crate::job::{Job, JobExecution, JobMode, JobOutcome, JobState, MoveOptions};
use crate::retry::RetryPolicy;

/// Text that appears in slot content read while the store is overloaded.
pub const DEFAULT_UNREADABLE_MARKER: &str =
    "<span class=\"error\">Expansion depth limit exceeded</span>";

/// Job execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Jobs run at once by a batch worker.
    pub concurrency: usize,

    /// Retry for transient storage errors and revision conflicts.
    pub retry: RetryPolicy,

    /// Re-reads of slot content that came back with the unreadable marker.
    pub unreadable_retry: RetryPolicy,

    /// Marker identifying unreadable slot content. `None` disables the check.
    pub unreadable_marker: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            unreadable_retry: RetryPolicy::without_backoff(10),
            unreadable_marker: Some(DEFAULT_UNREADABLE_MARKER.to_string()),
        }
    }
}

impl JobConfig {
    /// Set the worker concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the transient-error retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the unreadable-content retry policy.
    pub fn with_unreadable_retry(mut self, retry: RetryPolicy) -> Self {
        self.unreadable_retry = retry;
        self
    }
}

/// What an attempt achieved.
enum Applied {
    Edited(RevisionId),
    Moved(String),
    Unchanged,
}

/// Executes jobs against the authoritative store.
pub struct JobRunner {
    store: Arc<dyn DocumentStore>,
    authority: Arc<dyn Authority>,
    config: JobConfig,
    titles: TitlePolicy,
}

impl JobRunner {
    /// Create a runner with default settings.
    pub fn new(store: Arc<dyn DocumentStore>, authority: Arc<dyn Authority>) -> Self {
        Self {
            store,
            authority,
            config: JobConfig::default(),
            titles: TitlePolicy::default(),
        }
    }

    /// Use the given execution settings.
    pub fn with_config(mut self, config: JobConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the given title policy for renames.
    pub fn with_title_policy(mut self, titles: TitlePolicy) -> Self {
        self.titles = titles;
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run a job to a terminal state.
    ///
    /// Transient storage errors restart the job from `Pending` against
    /// fresh state until the retry budget is spent. Nothing is written
    /// before every targeted slot has been planned.
    pub async fn run(&self, job: Job) -> JobOutcome {
        let mut execution = JobExecution::new(job);

        loop {
            let attempt = execution.begin_attempt();
            let result = self.attempt(&mut execution).await;

            match result {
                Ok(applied) => return self.finish(execution, Ok(applied)),
                Err(JobError::Storage(source)) if source.is_transient() => {
                    if self.config.retry.allows_retry(attempt) {
                        let delay = self.config.retry.delay_for(attempt);
                        warn!(
                            "Job {} on {} hit {source}; retrying in {delay:?}",
                            execution.job().id,
                            execution.job().document
                        );
                        execution.transition(JobState::Pending);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let err = JobError::RetriesExhausted {
                        attempts: attempt,
                        source,
                    };
                    return self.finish(execution, Err(err));
                }
                Err(err) => return self.finish(execution, Err(err)),
            }
        }
    }

    async fn attempt(&self, execution: &mut JobExecution) -> Result<Applied> {
        execution.transition(JobState::Validating);
        let job = execution.job().clone();
        let actor = &job.attribution.actor;

        if !self.authority.is_registered(actor).await {
            return Err(JobError::UnknownActor(actor.clone()));
        }
        if !self.authority.can_replace(actor, &job.document).await {
            return Err(JobError::PermissionExpired {
                actor: actor.clone(),
                document: job.document.clone(),
            });
        }
        let document = self.load(&job).await?;
        let planner = ReplacementPlanner::new(&job.rule, self.titles.clone())?;

        execution.transition(JobState::Applying);
        match &job.mode {
            JobMode::Edit { roles } => self.apply_edit(&job, document, roles, &planner).await,
            JobMode::Move(options) => self.apply_move(&job, document, *options, &planner).await,
        }
    }

    async fn load(&self, job: &Job) -> Result<Document> {
        self.store
            .load(job.document.id)
            .await?
            .ok_or_else(|| JobError::DocumentMissing(job.document.clone()))
    }

    async fn apply_edit(
        &self,
        job: &Job,
        document: Document,
        roles: &BTreeSet<Role>,
        planner: &ReplacementPlanner,
    ) -> Result<Applied> {
        let roles: Vec<Role> = if roles.is_empty() {
            document.roles().cloned().collect()
        } else {
            roles.iter().cloned().collect()
        };
        let document = self.read_slots(job, document, &roles).await?;

        let mut staged = BTreeMap::new();
        for role in &roles {
            let Some(slot) = document.slot(role) else {
                return Err(JobError::SlotMissing {
                    document: document.reference(),
                    role: role.clone(),
                });
            };
            let plan = planner.plan_content(&slot.text);
            debug!("Planned {} replacements in {} ({role})", plan.match_count, job.document);
            if !plan.is_noop() {
                staged.insert(role.clone(), SlotContent::with_model(slot.model.clone(), plan.text));
            }
        }

        if staged.is_empty() {
            return Ok(Applied::Unchanged);
        }

        let attribution = &job.attribution;
        let flags = attribution.edit_flags(
            self.authority.has_right(&attribution.actor, Right::Bot).await,
            self.authority.has_right(&attribution.actor, Right::Patrol).await
                || self.authority.has_right(&attribution.actor, Right::Autopatrol).await,
        );
        let revision = self
            .store
            .save_revision(RevisionEdit {
                document: document.id,
                base_revision: document.latest_revision,
                slots: staged,
                actor: attribution.actor.clone(),
                summary: attribution.summary.clone(),
                flags,
            })
            .await?;
        Ok(Applied::Edited(revision))
    }

    /// Check every role and re-read while any slot carries the unreadable
    /// marker.
    async fn read_slots(&self, job: &Job, mut document: Document, roles: &[Role]) -> Result<Document> {
        let policy = &self.config.unreadable_retry;
        let mut reads = 1;

        loop {
            let mut unreadable = None;
            for role in roles {
                let Some(slot) = document.slot(role) else {
                    return Err(JobError::SlotMissing {
                        document: document.reference(),
                        role: role.clone(),
                    });
                };
                if !slot.is_plain_text() {
                    return Err(JobError::UnsupportedContentType {
                        document: document.reference(),
                        role: role.clone(),
                        model: slot.model.clone(),
                    });
                }
                if let Some(marker) = &self.config.unreadable_marker
                    && slot.text.contains(marker.as_str())
                {
                    unreadable = Some(role.clone());
                }
            }

            let Some(role) = unreadable else {
                return Ok(document);
            };
            if !policy.allows_retry(reads) {
                return Err(JobError::Unreadable {
                    document: document.reference(),
                    role,
                    attempts: reads,
                });
            }

            debug!("Slot {role} of {} unreadable on read {reads}; reading again", job.document);
            tokio::time::sleep(policy.delay_for(reads)).await;
            document = self.load(job).await?;
            reads += 1;
        }
    }

    async fn apply_move(
        &self,
        job: &Job,
        document: Document,
        options: MoveOptions,
        planner: &ReplacementPlanner,
    ) -> Result<Applied> {
        let new_title = planner.plan_title(&document.title)?;
        if new_title == document.title {
            return Ok(Applied::Unchanged);
        }

        let reference = document.reference();
        let conflict = |reason: &str| JobError::MoveConflict {
            document: reference.clone(),
            new_title: new_title.clone(),
            reason: reason.to_string(),
        };

        if self
            .store
            .lookup(document.namespace, &new_title)
            .await?
            .is_some()
        {
            return Err(conflict("destination title exists"));
        }
        let actor = &job.attribution.actor;
        if !self.authority.can_move(actor, &reference, &new_title).await {
            return Err(conflict("not permitted to move"));
        }

        let renamed = self
            .store
            .rename(RenameRequest {
                document: document.id,
                new_title: new_title.clone(),
                actor: actor.clone(),
                reason: job.attribution.summary.clone(),
                create_redirect: options.create_redirect,
            })
            .await;
        match renamed {
            Ok(()) => {}
            Err(CoreError::Storage(StorageError::TitleTaken(_))) => {
                return Err(conflict("destination title exists"));
            }
            Err(e) => return Err(e.into()),
        }

        if options.watch {
            self.store.watch(actor, document.namespace, &new_title).await?;
        }
        Ok(Applied::Moved(new_title))
    }

    fn finish(&self, mut execution: JobExecution, result: Result<Applied>) -> JobOutcome {
        let job = execution.job();
        let (job_id, document) = (job.id, job.document.clone());
        let mut outcome = JobOutcome {
            job_id,
            document,
            state: JobState::Failed,
            error: None,
            revision: None,
            new_title: None,
            attempts: execution.attempts(),
            history: Vec::new(),
            finished_at: Utc::now(),
        };

        match result {
            Ok(Applied::Edited(revision)) => {
                execution.transition(JobState::Committed);
                info!("Job {job_id} committed {revision} to {}", outcome.document);
                outcome.revision = Some(revision);
            }
            Ok(Applied::Moved(new_title)) => {
                execution.transition(JobState::Committed);
                info!("Job {job_id} moved {} to {new_title}", outcome.document);
                outcome.new_title = Some(new_title);
            }
            Ok(Applied::Unchanged) => {
                execution.transition(JobState::Skipped);
                info!("Job {job_id} skipped {}: nothing to replace", outcome.document);
            }
            Err(err) => {
                execution.transition(JobState::Failed);
                match err.kind() {
                    ErrorKind::Soft => info!("Job {job_id} on {} ended: {err}", outcome.document),
                    _ => warn!("Job {job_id} on {} failed: {err}", outcome.document),
                }
                outcome.error = Some(err);
            }
        }

        outcome.state = execution.state();
        outcome.history = execution.history().to_vec();
        outcome
    }
}
