//! Rule submissions, previews and commit receipts.

use std::collections::BTreeSet;

use bulkedit_core::{ActorId, DocumentId, DocumentRef, Role, Rule, ScopeFilter};
use bulkedit_jobs::{JobMode, MoveOptions};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rule, where to apply it, how, and on whose behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub rule: Rule,
    pub scope: ScopeFilter,
    pub mode: JobMode,

    /// Submitting identity.
    pub actor: ActorId,

    /// Edit summary; the configured template applies when unset.
    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub bot_edit: bool,

    /// Show the changes in recent-changes feeds.
    #[serde(default = "default_announce")]
    pub announce: bool,
}

fn default_announce() -> bool {
    true
}

impl Submission {
    /// Replace text in slot content.
    pub fn edit(rule: Rule, scope: ScopeFilter, actor: impl Into<ActorId>) -> Self {
        Self::new(rule, scope, JobMode::Edit { roles: BTreeSet::new() }, actor.into())
    }

    /// Rename matching documents.
    pub fn rename(
        rule: Rule,
        scope: ScopeFilter,
        options: MoveOptions,
        actor: impl Into<ActorId>,
    ) -> Self {
        Self::new(rule, scope, JobMode::Move(options), actor.into())
    }

    fn new(rule: Rule, scope: ScopeFilter, mode: JobMode, actor: ActorId) -> Self {
        Self {
            rule,
            scope,
            mode,
            actor,
            summary: None,
            bot_edit: false,
            announce: true,
        }
    }

    /// Restrict an edit to these slot roles.
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        if let JobMode::Edit { roles: current } = &mut self.mode {
            current.extend(roles);
        }
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_bot_edit(mut self, bot_edit: bool) -> Self {
        self.bot_edit = bot_edit;
        self
    }

    pub fn with_announce(mut self, announce: bool) -> Self {
        self.announce = announce;
        self
    }

    /// Same submission with a different rule.
    pub fn with_rule(&self, rule: Rule) -> Self {
        Self {
            rule,
            ..self.clone()
        }
    }
}

/// Which previewed candidates to turn into jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every candidate.
    #[default]
    All,
    /// Every candidate slot of these documents.
    Documents(BTreeSet<DocumentId>),
    /// These `(document, role)` pairs. For renames only the document counts.
    Slots(BTreeSet<(DocumentId, Role)>),
}

impl Selection {
    pub(crate) fn includes(&self, document: DocumentId, role: Option<&Role>) -> bool {
        match self {
            Self::All => true,
            Self::Documents(ids) => ids.contains(&document),
            Self::Slots(pairs) => match role {
                Some(role) => pairs.contains(&(document, role.clone())),
                None => pairs.iter().any(|(id, _)| *id == document),
            },
        }
    }
}

/// One slot that would be edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditCandidate {
    pub document: DocumentRef,
    pub role: Role,
    /// Highlighted context around the matches.
    pub snippet: String,
    pub match_count: usize,
}

/// One document that would be renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveCandidate {
    pub document: DocumentRef,
    pub new_title: String,
}

/// A matching document that cannot be renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unmovable {
    pub document: DocumentRef,
    pub reason: String,
}

/// Something the caller should confirm before committing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewWarning {
    /// The replacement is empty, so the change is hard to undo.
    BlankReplacement,
    /// The replacement text already occurs in this many documents in
    /// scope, so the change is hard to undo.
    ReplacementExists { documents: usize },
    /// The scope names a category that has no category page.
    MissingCategory { category: String },
}

/// Everything a caller needs to confirm a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub edits: Vec<EditCandidate>,
    pub moves: Vec<MoveCandidate>,
    pub unmovable: Vec<Unmovable>,
    /// Candidates dropped by the filter hook.
    pub filtered_out: Vec<DocumentRef>,
    pub warnings: Vec<PreviewWarning>,
}

impl Preview {
    /// Whether nothing would change.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.moves.is_empty()
    }

    /// Distinct documents that would be edited, in order.
    pub fn edited_documents(&self) -> Vec<DocumentRef> {
        let mut documents: Vec<DocumentRef> = Vec::new();
        for edit in &self.edits {
            if documents.last() != Some(&edit.document) {
                documents.push(edit.document.clone());
            }
        }
        documents
    }
}

/// What a commit handed to the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    /// Jobs accepted by the queue.
    pub jobs_created: usize,
    pub job_ids: Vec<Uuid>,
    /// Candidates dropped by the filter hook.
    pub filtered_out: usize,
}

/// Result of one rule of a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRun {
    pub rule: Rule,
    /// Documents that matched and survived the filter.
    pub documents: Vec<DocumentRef>,
    /// Zero on a dry run.
    pub jobs_created: usize,
}
