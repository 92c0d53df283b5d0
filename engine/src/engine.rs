//! Replace engine implementation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bulkedit_core::{
    ActorId, ContextExtractor, CorpusSnapshot, DocumentRef, DocumentStore, MatchLocator,
    MatchResult, MemoryCorpus, Namespace, ReplacementPlanner, Role, Rule,
};
use bulkedit_jobs::{
    Attribution, Authority, BatchReport, BatchWorker, Job, JobMode, JobQueue, JobRunner,
    MemoryQueue,
};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::filter::{FilterHook, FilterPurpose, PassThrough};
use crate::submission::{
    CommitReceipt, EditCandidate, MoveCandidate, Preview, PreviewWarning, RuleRun, Selection,
    Submission, Unmovable,
};
use crate::summary::render_summary;

/// Locates, previews and commits bulk replacements.
///
/// The engine only creates jobs; running them is up to whoever drains the
/// queue ([`ReplaceEngine::run_queued`] does so in-process).
pub struct ReplaceEngine {
    /// Configuration.
    config: EngineConfig,

    /// Possibly stale read view used for location and previews.
    snapshot: Arc<dyn CorpusSnapshot>,

    /// Authoritative store, used to check rename destinations and by jobs.
    store: Arc<dyn DocumentStore>,

    /// Permission seam.
    authority: Arc<dyn Authority>,

    /// Where committed jobs go.
    queue: Arc<dyn JobQueue>,

    /// Candidate veto.
    filter: Arc<dyn FilterHook>,

    locator: MatchLocator,
    extractor: ContextExtractor,
}

impl ReplaceEngine {
    /// Create a new engine builder.
    pub fn builder() -> ReplaceEngineBuilder {
        ReplaceEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// The namespace catalog, ordered by index, with the main namespace
    /// named `(main)`.
    pub async fn namespaces(&self) -> Result<Vec<Namespace>> {
        let mut namespaces = self.snapshot.namespaces().await?;
        namespaces.sort_by_key(|ns| ns.index);
        Ok(namespaces
            .into_iter()
            .map(|ns| Namespace {
                name: ns.display_name().to_string(),
                index: ns.index,
            })
            .collect())
    }

    /// Locate candidates and render what would change.
    ///
    /// Fails before producing anything when the rule, the scope or the
    /// corpus capabilities make the submission impossible.
    pub async fn preview(&self, submission: &Submission) -> Result<Preview> {
        let mut preview = self.locate(submission).await?;
        preview.warnings = self.warnings(submission, &preview).await?;
        info!(
            "Preview for {:?}: {} edits, {} moves, {} unmovable, {} filtered out",
            submission.rule.target,
            preview.edits.len(),
            preview.moves.len(),
            preview.unmovable.len(),
            preview.filtered_out.len()
        );
        Ok(preview)
    }

    /// Candidates after the filter hook, without warnings.
    async fn locate(&self, submission: &Submission) -> Result<Preview> {
        let rule = &submission.rule;
        let planner = ReplacementPlanner::new(rule, self.config.titles.clone())?;
        let mut preview = Preview::default();

        match &submission.mode {
            JobMode::Edit { roles } => {
                let matches: Vec<MatchResult> = self
                    .locator
                    .find_content_matches_in_roles(rule, &submission.scope, roles)
                    .await?;
                let (matches, filtered_out) =
                    self.apply_filter(FilterPurpose::Edit, matches, |m| &m.document);
                preview.filtered_out = filtered_out;
                preview.edits = matches
                    .into_iter()
                    .map(|m| EditCandidate {
                        snippet: self.extractor.render(&m.text, &m.offsets),
                        match_count: m.offsets.len(),
                        document: m.document,
                        role: m.role,
                    })
                    .collect();
            }
            JobMode::Move(_) => {
                let documents: Vec<DocumentRef> = self
                    .locator
                    .find_title_matches(rule, &submission.scope)
                    .await?
                    .into_iter()
                    .map(|doc| doc.reference())
                    .collect();
                let (documents, filtered_out) =
                    self.apply_filter(FilterPurpose::Rename, documents, |d| d);
                preview.filtered_out = filtered_out;

                let actor = self.actor(submission);
                for document in documents {
                    match self.check_move(&planner, &actor, &document).await? {
                        Ok(new_title) => {
                            preview.moves.push(MoveCandidate { document, new_title });
                        }
                        Err(reason) => preview.unmovable.push(Unmovable { document, reason }),
                    }
                }
            }
        }

        Ok(preview)
    }

    /// Locate candidates again and queue one job per selected document.
    ///
    /// Edit jobs bundle every selected role of a document. Unmovable and
    /// filtered-out candidates never become jobs.
    pub async fn commit(
        &self,
        submission: &Submission,
        selection: &Selection,
    ) -> Result<CommitReceipt> {
        let preview = self.locate(submission).await?;
        let attribution = self.attribution(submission);

        let jobs: Vec<Job> = match &submission.mode {
            JobMode::Edit { .. } => {
                let mut bundles: BTreeMap<DocumentRef, BTreeSet<Role>> = BTreeMap::new();
                for edit in preview.edits {
                    if selection.includes(edit.document.id, Some(&edit.role)) {
                        bundles.entry(edit.document).or_default().insert(edit.role);
                    }
                }
                bundles
                    .into_iter()
                    .map(|(document, roles)| {
                        Job::edit(document, submission.rule.clone(), roles, attribution.clone())
                    })
                    .collect()
            }
            JobMode::Move(options) => preview
                .moves
                .into_iter()
                .filter(|m| selection.includes(m.document.id, None))
                .map(|m| {
                    Job::rename(m.document, submission.rule.clone(), *options, attribution.clone())
                })
                .collect(),
        };

        let job_ids = jobs.iter().map(|job| job.id).collect();
        let jobs_created = self.queue.push(jobs).await?;
        info!(
            "Queued {jobs_created} jobs for {:?} on behalf of {}",
            submission.rule.target, attribution.actor
        );

        Ok(CommitReceipt {
            jobs_created,
            job_ids,
            filtered_out: preview.filtered_out.len(),
        })
    }

    /// Run each rule as its own edit submission.
    ///
    /// A dry run only lists the documents each rule would touch.
    pub async fn submit_rules(
        &self,
        rules: Vec<Rule>,
        prototype: &Submission,
        dry_run: bool,
    ) -> Result<Vec<RuleRun>> {
        if !matches!(prototype.mode, JobMode::Edit { .. }) {
            return Err(EngineError::InvalidSubmission(
                "bulk rules only support content edits".to_string(),
            ));
        }

        let mut runs = Vec::with_capacity(rules.len());
        for rule in rules {
            let submission = prototype.with_rule(rule);
            let documents = self.preview(&submission).await?.edited_documents();
            let jobs_created = if dry_run || documents.is_empty() {
                0
            } else {
                self.commit(&submission, &Selection::All).await?.jobs_created
            };
            debug!(
                "Rule {:?}: {} documents, {jobs_created} jobs",
                submission.rule.target,
                documents.len()
            );
            runs.push(RuleRun {
                rule: submission.rule,
                documents,
                jobs_created,
            });
        }
        Ok(runs)
    }

    /// A runner for jobs created by this engine.
    pub fn runner(&self) -> JobRunner {
        JobRunner::new(Arc::clone(&self.store), Arc::clone(&self.authority))
            .with_config(self.config.jobs.clone())
            .with_title_policy(self.config.titles.clone())
    }

    /// Drain the queue in-process and report the batch.
    pub async fn run_queued(&self) -> BatchReport {
        BatchWorker::new(Arc::clone(&self.queue), Arc::new(self.runner()))
            .run_batch()
            .await
    }

    fn actor(&self, submission: &Submission) -> ActorId {
        self.config
            .replace_actor
            .clone()
            .unwrap_or_else(|| submission.actor.clone())
    }

    fn attribution(&self, submission: &Submission) -> Attribution {
        let summary = match &submission.summary {
            Some(summary) if !summary.trim().is_empty() => summary.clone(),
            _ => render_summary(&self.config.summary_template, &submission.rule),
        };
        Attribution::new(self.actor(submission), summary)
            .with_bot_edit(submission.bot_edit)
            .with_announce(submission.announce)
    }

    /// Keep the items whose document survives the hook.
    fn apply_filter<T>(
        &self,
        purpose: FilterPurpose,
        items: Vec<T>,
        document: impl Fn(&T) -> &DocumentRef,
    ) -> (Vec<T>, Vec<DocumentRef>) {
        let mut candidates: Vec<DocumentRef> = Vec::new();
        for item in &items {
            let doc = document(item);
            if !candidates.contains(doc) {
                candidates.push(doc.clone());
            }
        }

        let kept: BTreeSet<DocumentRef> = self
            .filter
            .filter_candidates(purpose, &candidates)
            .into_iter()
            .collect();
        let filtered_out: Vec<DocumentRef> = candidates
            .into_iter()
            .filter(|doc| !kept.contains(doc))
            .collect();
        if !filtered_out.is_empty() {
            info!("Filter hook dropped {} candidates", filtered_out.len());
        }

        let items = items
            .into_iter()
            .filter(|item| kept.contains(document(item)))
            .collect();
        (items, filtered_out)
    }

    /// The planned title, or why the document cannot be renamed.
    async fn check_move(
        &self,
        planner: &ReplacementPlanner,
        actor: &ActorId,
        document: &DocumentRef,
    ) -> Result<std::result::Result<String, String>> {
        let new_title = match planner.plan_title(&document.title) {
            Ok(title) => title,
            Err(e) => return Ok(Err(e.to_string())),
        };
        if new_title == document.title {
            return Ok(Err("title would not change".to_string()));
        }
        if self.store.lookup(document.namespace, &new_title).await?.is_some() {
            return Ok(Err(format!("{new_title:?} already exists")));
        }
        if !self.authority.can_move(actor, document, &new_title).await {
            return Ok(Err("not permitted to move".to_string()));
        }
        Ok(Ok(new_title))
    }

    async fn warnings(
        &self,
        submission: &Submission,
        preview: &Preview,
    ) -> Result<Vec<PreviewWarning>> {
        let mut warnings = Vec::new();
        let rule = &submission.rule;

        if rule.replacement.is_empty() {
            warnings.push(PreviewWarning::BlankReplacement);
        } else if !rule.is_regex && !preview.is_empty() {
            let existing = Rule::literal(rule.replacement.clone(), "");
            let documents: Vec<DocumentRef> = if preview.edits.is_empty() {
                self.locator
                    .find_title_matches(&existing, &submission.scope)
                    .await?
                    .into_iter()
                    .map(|doc| doc.reference())
                    .collect()
            } else {
                let mut documents: Vec<DocumentRef> = self
                    .locator
                    .find_content_matches(&existing, &submission.scope)
                    .await?
                    .into_iter()
                    .map(|m| m.document)
                    .collect();
                documents.dedup();
                documents
            };
            let purpose = if preview.edits.is_empty() {
                FilterPurpose::Rename
            } else {
                FilterPurpose::Edit
            };
            let (documents, _) = self.apply_filter(purpose, documents, |d| d);
            if !documents.is_empty() {
                warnings.push(PreviewWarning::ReplacementExists {
                    documents: documents.len(),
                });
            }
        }

        let resolved = submission
            .scope
            .resolve(self.config.default_limit, &self.config.titles)?;
        if let Some(category) = resolved.category
            && !self.snapshot.category_exists(&category).await?
        {
            warnings.push(PreviewWarning::MissingCategory { category });
        }

        Ok(warnings)
    }
}

/// Builder for the replace engine.
pub struct ReplaceEngineBuilder {
    config: EngineConfig,
    snapshot: Option<Arc<dyn CorpusSnapshot>>,
    store: Option<Arc<dyn DocumentStore>>,
    authority: Option<Arc<dyn Authority>>,
    queue: Option<Arc<dyn JobQueue>>,
    filter: Option<Arc<dyn FilterHook>>,
}

impl ReplaceEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            snapshot: None,
            store: None,
            authority: None,
            queue: None,
            filter: None,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Read candidates from this snapshot.
    pub fn with_snapshot(mut self, snapshot: Arc<dyn CorpusSnapshot>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Write through this store.
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use one in-memory corpus as both snapshot and store.
    pub fn with_memory_corpus(self, corpus: Arc<MemoryCorpus>) -> Self {
        self.with_snapshot(corpus.clone()).with_store(corpus)
    }

    /// Ask this authority for permissions.
    pub fn with_authority(mut self, authority: Arc<dyn Authority>) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Queue jobs here instead of a fresh in-memory queue.
    pub fn with_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Veto candidates with this hook.
    pub fn with_filter(mut self, filter: Arc<dyn FilterHook>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<ReplaceEngine> {
        self.config.validate()?;
        let snapshot = self
            .snapshot
            .ok_or_else(|| EngineError::Config("a corpus snapshot is required".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| EngineError::Config("a document store is required".to_string()))?;
        let authority = self
            .authority
            .ok_or_else(|| EngineError::Config("an authority is required".to_string()))?;

        let locator = MatchLocator::new(Arc::clone(&snapshot))
            .with_default_limit(self.config.default_limit)
            .with_title_policy(self.config.titles.clone());
        let extractor = ContextExtractor::new(self.config.snippet.clone());

        info!("Replace engine ready (default limit {})", self.config.default_limit);
        Ok(ReplaceEngine {
            snapshot,
            store,
            authority,
            queue: self.queue.unwrap_or_else(|| Arc::new(MemoryQueue::new())),
            filter: self.filter.unwrap_or_else(|| Arc::new(PassThrough)),
            locator,
            extractor,
            config: self.config,
        })
    }
}

impl Default for ReplaceEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
