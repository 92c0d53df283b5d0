//! In-memory corpus.
//!
//! `MemoryCorpus` implements both [`CorpusSnapshot`] and [`DocumentStore`]
//! over a single shared state, keeps a revision log and rename log for
//! inspection, and can be saved to or loaded from a JSON snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::corpus::{
    CorpusQuery, CorpusSnapshot, DocumentStore, EditFlags, MatchCondition, RenameRequest,
    RevisionEdit, SlotRow,
};
use crate::document::{
    ActorId, Document, DocumentId, DocumentRef, Namespace, NamespaceId, RevisionId, Role,
    SlotContent,
};
use crate::error::{CoreError, Result, StorageError};
use crate::rule::build_regex;

/// A committed revision, as recorded by the memory corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    /// Revision id.
    pub id: RevisionId,

    /// Edited document.
    pub document: DocumentId,

    /// Roles whose content changed.
    pub roles: Vec<Role>,

    /// Acting identity.
    pub actor: ActorId,

    /// Edit summary.
    pub summary: String,

    /// Moderation flags.
    pub flags: EditFlags,

    /// When the revision was saved.
    pub timestamp: DateTime<Utc>,
}

/// A completed rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRecord {
    /// Renamed document.
    pub document: DocumentId,

    /// Title before the rename.
    pub from: String,

    /// Title after the rename.
    pub to: String,

    /// Acting identity.
    pub actor: ActorId,

    /// Recorded reason.
    pub reason: String,

    /// Redirect left at the old title, if any.
    pub redirect: Option<DocumentId>,

    /// When the rename happened.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CorpusState {
    supports_regex: bool,
    namespaces: Vec<Namespace>,
    documents: BTreeMap<DocumentId, Document>,
    categories: BTreeMap<String, BTreeSet<DocumentId>>,
    watchlists: BTreeMap<ActorId, BTreeSet<(NamespaceId, String)>>,
    revisions: Vec<RevisionRecord>,
    renames: Vec<RenameRecord>,
    next_document: u64,
    next_revision: u64,
}

impl CorpusState {
    fn find_title(&self, namespace: NamespaceId, title: &str) -> Option<&Document> {
        self.documents
            .values()
            .find(|doc| doc.namespace == namespace && doc.title == title)
    }

    fn allocate_revision(&mut self) -> RevisionId {
        self.next_revision += 1;
        RevisionId(self.next_revision)
    }

    fn insert_document(
        &mut self,
        namespace: NamespaceId,
        title: &str,
        slots: BTreeMap<Role, SlotContent>,
    ) -> Result<DocumentRef> {
        if self.find_title(namespace, title).is_some() {
            return Err(StorageError::TitleTaken(format!("{namespace}:{title}")).into());
        }
        if slots.is_empty() {
            return Err(StorageError::Write(format!(
                "{namespace}:{title}: a document needs at least one slot"
            ))
            .into());
        }

        self.next_document += 1;
        let id = DocumentId(self.next_document);
        let latest_revision = self.allocate_revision();
        let doc = Document {
            id,
            namespace,
            title: title.to_string(),
            slots,
            latest_revision,
        };
        let reference = doc.reference();
        self.documents.insert(id, doc);
        Ok(reference)
    }

    fn in_scope(&self, doc: &Document, query: &CorpusQuery) -> bool {
        if !query.namespaces.contains(&doc.namespace) {
            return false;
        }
        if let Some(prefix) = &query.title_prefix
            && !doc.title.starts_with(prefix.as_str())
        {
            return false;
        }
        if let Some(category) = &query.category {
            return self
                .categories
                .get(category)
                .is_some_and(|members| members.contains(&doc.id));
        }
        true
    }

    fn scoped_documents(&self, query: &CorpusQuery) -> Vec<&Document> {
        let mut docs: Vec<&Document> = self
            .documents
            .values()
            .filter(|doc| self.in_scope(doc, query))
            .collect();
        docs.sort_by(|a, b| (a.namespace, &a.title).cmp(&(b.namespace, &b.title)));
        docs
    }

    fn namespace_prefix(&self, namespace: NamespaceId) -> String {
        self.namespaces
            .iter()
            .find(|ns| ns.index == namespace)
            .filter(|ns| !ns.name.is_empty())
            .map(|ns| format!("{}:", ns.name))
            .unwrap_or_default()
    }
}

/// Evaluates a [`MatchCondition`] the way a database operator would.
enum Predicate {
    Contains(String),
    Regex(regex::Regex),
}

impl Predicate {
    fn new(condition: &MatchCondition, supports_regex: bool) -> Result<Self> {
        match condition {
            MatchCondition::Contains(needle) => Ok(Self::Contains(needle.clone())),
            MatchCondition::Regex(_) if !supports_regex => Err(CoreError::RegexUnsupported),
            MatchCondition::Regex(pattern) => Ok(Self::Regex(build_regex(pattern)?)),
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(needle) => text.contains(needle.as_str()),
            Self::Regex(regex) => regex.is_match(text),
        }
    }
}

/// Corpus held entirely in memory.
pub struct MemoryCorpus {
    state: RwLock<CorpusState>,

    /// Mirrors `state.supports_regex`; read without taking the lock.
    supports_regex: bool,
}

impl MemoryCorpus {
    /// Create an empty corpus with the standard namespace catalog and
    /// regex support enabled.
    pub fn new() -> Self {
        let state = CorpusState {
            supports_regex: true,
            namespaces: default_namespaces(),
            ..CorpusState::default()
        };
        Self::from_state(state)
    }

    fn from_state(state: CorpusState) -> Self {
        Self {
            supports_regex: state.supports_regex,
            state: RwLock::new(state),
        }
    }

    /// Enable or disable the regex operator.
    pub fn with_regex_support(self, enabled: bool) -> Self {
        let mut state = self.state.into_inner();
        state.supports_regex = enabled;
        Self::from_state(state)
    }

    /// Replace the namespace catalog.
    pub fn with_namespaces(self, namespaces: Vec<Namespace>) -> Self {
        let mut state = self.state.into_inner();
        state.namespaces = namespaces;
        Self::from_state(state)
    }

    /// Insert a document with the given slots.
    pub async fn insert(
        &self,
        namespace: NamespaceId,
        title: &str,
        slots: impl IntoIterator<Item = (Role, SlotContent)>,
    ) -> Result<DocumentRef> {
        let reference = self
            .state
            .write()
            .await
            .insert_document(namespace, title, slots.into_iter().collect())?;
        debug!("Inserted document {reference}");
        Ok(reference)
    }

    /// Insert a document with a single main markup slot.
    pub async fn insert_text(
        &self,
        namespace: NamespaceId,
        title: &str,
        text: &str,
    ) -> Result<DocumentRef> {
        self.insert(namespace, title, [(Role::main(), SlotContent::wikitext(text))])
            .await
    }

    /// Add a document to a category (by normalized category key).
    pub async fn add_to_category(&self, document: DocumentId, category: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.documents.contains_key(&document) {
            return Err(StorageError::NotFound(document.to_string()).into());
        }
        state
            .categories
            .entry(category.to_string())
            .or_default()
            .insert(document);
        Ok(())
    }

    /// Overwrite a slot outside the revision workflow, e.g. to simulate a
    /// concurrent edit.
    pub async fn overwrite_slot(
        &self,
        document: DocumentId,
        role: Role,
        content: SlotContent,
    ) -> Result<RevisionId> {
        let mut state = self.state.write().await;
        let revision = state.allocate_revision();
        let doc = state
            .documents
            .get_mut(&document)
            .ok_or_else(|| StorageError::NotFound(document.to_string()))?;
        doc.slots.insert(role, content);
        doc.latest_revision = revision;
        Ok(revision)
    }

    /// Remove a slot, e.g. to simulate a role dropped by a later edit.
    pub async fn remove_slot(&self, document: DocumentId, role: &Role) -> Result<()> {
        let mut state = self.state.write().await;
        let revision = state.allocate_revision();
        let doc = state
            .documents
            .get_mut(&document)
            .ok_or_else(|| StorageError::NotFound(document.to_string()))?;
        doc.slots.remove(role);
        doc.latest_revision = revision;
        Ok(())
    }

    /// Current state of a document by title.
    pub async fn document_by_title(&self, namespace: NamespaceId, title: &str) -> Option<Document> {
        self.state.read().await.find_title(namespace, title).cloned()
    }

    /// Revisions saved through [`DocumentStore::save_revision`] for a document.
    pub async fn revisions(&self, document: DocumentId) -> Vec<RevisionRecord> {
        self.state
            .read()
            .await
            .revisions
            .iter()
            .filter(|r| r.document == document)
            .cloned()
            .collect()
    }

    /// All renames performed.
    pub async fn renames(&self) -> Vec<RenameRecord> {
        self.state.read().await.renames.clone()
    }

    /// Titles an identity watches.
    pub async fn watchlist(&self, actor: &ActorId) -> BTreeSet<(NamespaceId, String)> {
        self.state
            .read()
            .await
            .watchlists
            .get(actor)
            .cloned()
            .unwrap_or_default()
    }

    /// Load a corpus from a JSON snapshot file.
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| StorageError::Read(format!("{}: {e}", path.display())))?;
        let state: CorpusState = serde_json::from_str(&content)?;
        info!(
            "Loaded corpus snapshot with {} documents from {}",
            state.documents.len(),
            path.display()
        );
        Ok(Self::from_state(state))
    }

    /// Write the corpus to a JSON snapshot file.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&*self.state.read().await)?;

        // Write atomically using a temp file
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StorageError::Write(format!("{}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, path)
            .await
            .map_err(|e| StorageError::Write(format!("{}: {e}", path.display())))?;

        debug!("Saved corpus snapshot to {}", path.display());
        Ok(())
    }
}

impl Default for MemoryCorpus {
    fn default() -> Self {
        Self::new()
    }
}

fn default_namespaces() -> Vec<Namespace> {
    vec![
        Namespace::new(0, ""),
        Namespace::new(1, "Talk"),
        Namespace::new(2, "User"),
        Namespace::new(4, "Project"),
        Namespace::new(10, "Template"),
        Namespace::new(12, "Help"),
        Namespace::new(14, "Category"),
    ]
}

#[async_trait]
impl CorpusSnapshot for MemoryCorpus {
    fn supports_regex(&self) -> bool {
        self.supports_regex
    }

    async fn namespaces(&self) -> Result<Vec<Namespace>> {
        Ok(self.state.read().await.namespaces.clone())
    }

    async fn category_exists(&self, category: &str) -> Result<bool> {
        Ok(self
            .state
            .read()
            .await
            .find_title(NamespaceId::CATEGORY, category)
            .is_some())
    }

    async fn select_slots(&self, query: &CorpusQuery) -> Result<Vec<SlotRow>> {
        let state = self.state.read().await;
        let predicate = Predicate::new(&query.condition, self.supports_regex)?;

        let mut rows = Vec::new();
        'docs: for doc in state.scoped_documents(query) {
            for (role, slot) in doc.slots.iter().filter(|(role, _)| query.includes_role(role)) {
                if rows.len() >= query.limit {
                    break 'docs;
                }
                if predicate.matches(&slot.text) {
                    rows.push(SlotRow {
                        document: doc.reference(),
                        role: role.clone(),
                        text: slot.text.clone(),
                    });
                }
            }
        }

        debug!("Slot query matched {} rows", rows.len());
        Ok(rows)
    }

    async fn select_documents(&self, query: &CorpusQuery) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        let predicate = Predicate::new(&query.condition, self.supports_regex)?;

        let docs: Vec<Document> = state
            .scoped_documents(query)
            .into_iter()
            .filter(|doc| predicate.matches(&doc.title))
            .take(query.limit)
            .cloned()
            .collect();

        debug!("Title query matched {} documents", docs.len());
        Ok(docs)
    }
}

#[async_trait]
impl DocumentStore for MemoryCorpus {
    async fn load(&self, id: DocumentId) -> Result<Option<Document>> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn lookup(&self, namespace: NamespaceId, title: &str) -> Result<Option<DocumentRef>> {
        Ok(self
            .state
            .read()
            .await
            .find_title(namespace, title)
            .map(Document::reference))
    }

    async fn save_revision(&self, edit: RevisionEdit) -> Result<RevisionId> {
        let mut state = self.state.write().await;

        let latest = state
            .documents
            .get(&edit.document)
            .map(|doc| doc.latest_revision)
            .ok_or_else(|| StorageError::NotFound(edit.document.to_string()))?;
        if latest != edit.base_revision {
            return Err(StorageError::Conflict {
                document: edit.document.to_string(),
                expected: edit.base_revision.0,
                actual: latest.0,
            }
            .into());
        }

        let revision = state.allocate_revision();
        let roles: Vec<Role> = edit.slots.keys().cloned().collect();
        if let Some(doc) = state.documents.get_mut(&edit.document) {
            doc.slots.extend(edit.slots);
            doc.latest_revision = revision;
        }
        state.revisions.push(RevisionRecord {
            id: revision,
            document: edit.document,
            roles,
            actor: edit.actor,
            summary: edit.summary,
            flags: edit.flags,
            timestamp: Utc::now(),
        });

        debug!("Saved revision {revision} of {}", edit.document);
        Ok(revision)
    }

    async fn rename(&self, request: RenameRequest) -> Result<()> {
        let mut state = self.state.write().await;

        let (namespace, from) = state
            .documents
            .get(&request.document)
            .map(|doc| (doc.namespace, doc.title.clone()))
            .ok_or_else(|| StorageError::NotFound(request.document.to_string()))?;
        if state.find_title(namespace, &request.new_title).is_some() {
            return Err(StorageError::TitleTaken(format!("{namespace}:{}", request.new_title)).into());
        }

        let revision = state.allocate_revision();
        if let Some(doc) = state.documents.get_mut(&request.document) {
            doc.title = request.new_title.clone();
            doc.latest_revision = revision;
        }

        let redirect = if request.create_redirect {
            let target = format!("{}{}", state.namespace_prefix(namespace), request.new_title);
            let slots = BTreeMap::from([(
                Role::main(),
                SlotContent::wikitext(format!("#REDIRECT [[{target}]]")),
            )]);
            Some(state.insert_document(namespace, &from, slots)?.id)
        } else {
            None
        };

        info!("Renamed {namespace}:{from} to {namespace}:{}", request.new_title);
        state.renames.push(RenameRecord {
            document: request.document,
            from,
            to: request.new_title,
            actor: request.actor,
            reason: request.reason,
            redirect,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn watch(&self, actor: &ActorId, namespace: NamespaceId, title: &str) -> Result<()> {
        self.state
            .write()
            .await
            .watchlists
            .entry(actor.clone())
            .or_default()
            .insert((namespace, title.to_string()));
        Ok(())
    }
}
