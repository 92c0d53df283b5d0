//! Corpus access seams.
//!
//! Two traits split the document store the way it is deployed: a
//! [`CorpusSnapshot`] answers scoped queries from a possibly stale read
//! replica, and a [`DocumentStore`] reads and writes the primary copy.
//! Jobs never trust snapshot results; they revalidate against the store.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{
    ActorId, Document, DocumentId, DocumentRef, Namespace, NamespaceId, RevisionId, Role,
    SlotContent,
};
use crate::error::Result;
use crate::scope::ResolvedScope;

/// Predicate a corpus evaluates natively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchCondition {
    /// Substring containment, verbatim.
    Contains(String),

    /// The corpus engine's pattern operator.
    Regex(String),
}

/// A scoped query against the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusQuery {
    /// Namespaces to search.
    pub namespaces: BTreeSet<NamespaceId>,

    /// Category membership filter (normalized key).
    pub category: Option<String>,

    /// Title prefix filter (normalized key).
    pub title_prefix: Option<String>,

    /// Slot roles to search; empty means every role. Applied before
    /// `limit`.
    pub roles: BTreeSet<Role>,

    /// Maximum number of rows.
    pub limit: usize,

    /// What to match.
    pub condition: MatchCondition,
}

impl CorpusQuery {
    /// Build a query from a resolved scope.
    pub fn new(scope: &ResolvedScope, condition: MatchCondition) -> Self {
        Self {
            namespaces: scope.namespaces.clone(),
            category: scope.category.clone(),
            title_prefix: scope.title_prefix.clone(),
            roles: BTreeSet::new(),
            limit: scope.limit,
            condition,
        }
    }

    /// Restrict a slot query to these roles.
    pub fn with_roles(mut self, roles: BTreeSet<Role>) -> Self {
        self.roles = roles;
        self
    }

    /// Whether a slot with this role is searched.
    pub fn includes_role(&self, role: &Role) -> bool {
        self.roles.is_empty() || self.roles.contains(role)
    }
}

/// One matching slot returned by a content query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRow {
    /// Owning document.
    pub document: DocumentRef,

    /// Slot role.
    pub role: Role,

    /// Slot text at snapshot time.
    pub text: String,
}

/// Read-only, possibly stale view of the corpus.
#[async_trait]
pub trait CorpusSnapshot: Send + Sync {
    /// Whether [`MatchCondition::Regex`] is supported.
    fn supports_regex(&self) -> bool;

    /// The namespace catalog.
    async fn namespaces(&self) -> Result<Vec<Namespace>>;

    /// Whether a category with this key has a category page.
    async fn category_exists(&self, category: &str) -> Result<bool>;

    /// Slots whose latest content matches, ordered by `(namespace, title)`.
    async fn select_slots(&self, query: &CorpusQuery) -> Result<Vec<SlotRow>>;

    /// Documents whose title matches, ordered by `(namespace, title)`.
    async fn select_documents(&self, query: &CorpusQuery) -> Result<Vec<Document>>;
}

/// Moderation metadata attached to a saved revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditFlags {
    /// Marked as a minor edit.
    pub minor: bool,

    /// Marked as a bot edit.
    pub bot: bool,

    /// Recorded as already patrolled.
    pub patrolled: bool,

    /// Hidden from recent-changes feeds and watchlists.
    pub suppress_recent_changes: bool,
}

/// A new revision to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionEdit {
    /// Document being edited.
    pub document: DocumentId,

    /// Revision the new content was planned against.
    pub base_revision: RevisionId,

    /// Replacement content for the changed slots only.
    pub slots: BTreeMap<Role, SlotContent>,

    /// Acting identity.
    pub actor: ActorId,

    /// Edit summary.
    pub summary: String,

    /// Moderation flags.
    pub flags: EditFlags,
}

/// A rename to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRequest {
    /// Document being renamed.
    pub document: DocumentId,

    /// New title key in the same namespace.
    pub new_title: String,

    /// Acting identity.
    pub actor: ActorId,

    /// Reason recorded with the rename.
    pub reason: String,

    /// Leave a redirect at the old title.
    pub create_redirect: bool,
}

/// Authoritative document store used by jobs.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load the current state of a document.
    async fn load(&self, id: DocumentId) -> Result<Option<Document>>;

    /// Look up a document by namespace and title.
    async fn lookup(&self, namespace: NamespaceId, title: &str) -> Result<Option<DocumentRef>>;

    /// Persist a new revision. Fails with a conflict when `base_revision`
    /// is no longer the latest.
    async fn save_revision(&self, edit: RevisionEdit) -> Result<RevisionId>;

    /// Rename a document atomically. Fails with `TitleTaken` when the
    /// destination exists.
    async fn rename(&self, request: RenameRequest) -> Result<()>;

    /// Add a title to an identity's watch set.
    async fn watch(&self, actor: &ActorId, namespace: NamespaceId, title: &str) -> Result<()>;
}
