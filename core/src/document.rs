//! Document model: namespaces, slots and references.
//!
//! A [`Document`] is a versioned unit of corpus content addressed by
//! namespace and title. Its content is split into named slots; most
//! documents only carry the [`Role::main`] slot.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric namespace index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(pub i32);

impl NamespaceId {
    /// The main (article) namespace.
    pub const MAIN: NamespaceId = NamespaceId(0);

    /// The category namespace.
    pub const CATEGORY: NamespaceId = NamespaceId(14);
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable document identifier, unchanged by renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Revision identifier; strictly increasing per corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub u64);

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Name of a content slot within a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Create a role from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The primary content slot every document has.
    pub fn main() -> Self {
        Self("main".to_string())
    }

    /// The role name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity a change is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Create an actor id from a user name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The user name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActorId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ActorId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content model of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentModel {
    /// Markup text.
    Wikitext,
    /// Plain text.
    Text,
    /// Stylesheet source.
    Css,
    /// Script source.
    JavaScript,
    /// JSON document stored as text.
    Json,
    /// Anything else (binary or structured data).
    Other(String),
}

impl ContentModel {
    /// Whether slots of this model hold plain replaceable text.
    pub fn is_plain_text(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for ContentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wikitext => f.write_str("wikitext"),
            Self::Text => f.write_str("text"),
            Self::Css => f.write_str("css"),
            Self::JavaScript => f.write_str("javascript"),
            Self::Json => f.write_str("json"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// The content of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotContent {
    /// Content model.
    pub model: ContentModel,

    /// Serialized content.
    pub text: String,
}

impl SlotContent {
    /// Create a markup-text slot.
    pub fn wikitext(text: impl Into<String>) -> Self {
        Self {
            model: ContentModel::Wikitext,
            text: text.into(),
        }
    }

    /// Create a slot with an explicit model.
    pub fn with_model(model: ContentModel, text: impl Into<String>) -> Self {
        Self {
            model,
            text: text.into(),
        }
    }

    /// Capability check used before any replacement is planned.
    pub fn is_plain_text(&self) -> bool {
        self.model.is_plain_text()
    }
}

/// Lightweight reference to a document.
///
/// Ordering is `(namespace, title, id)`, which is the order every
/// locator result is returned in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Namespace the document lives in.
    pub namespace: NamespaceId,

    /// Title key (underscores instead of spaces).
    pub title: String,

    /// Stable identifier.
    pub id: DocumentId,
}

impl DocumentRef {
    /// Create a new reference.
    pub fn new(id: DocumentId, namespace: NamespaceId, title: impl Into<String>) -> Self {
        Self {
            namespace,
            title: title.into(),
            id,
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.title)
    }
}

/// A document as seen at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier.
    pub id: DocumentId,

    /// Namespace.
    pub namespace: NamespaceId,

    /// Title key.
    pub title: String,

    /// Content slots by role. Never empty.
    pub slots: BTreeMap<Role, SlotContent>,

    /// Latest revision at the time this view was taken.
    pub latest_revision: RevisionId,
}

impl Document {
    /// Get a reference to this document.
    pub fn reference(&self) -> DocumentRef {
        DocumentRef::new(self.id, self.namespace, self.title.clone())
    }

    /// Get a slot by role.
    pub fn slot(&self, role: &Role) -> Option<&SlotContent> {
        self.slots.get(role)
    }

    /// All roles present on this document.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.slots.keys()
    }
}

/// One entry of the corpus namespace catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace index.
    pub index: NamespaceId,

    /// Canonical name; empty for the main namespace.
    pub name: String,
}

impl Namespace {
    /// Create a catalog entry.
    pub fn new(index: i32, name: impl Into<String>) -> Self {
        Self {
            index: NamespaceId(index),
            name: name.into(),
        }
    }

    /// Name for display, with the main namespace shown as `(main)`.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "(main)"
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_refs_sort_by_namespace_then_title() {
        let mut refs = vec![
            DocumentRef::new(DocumentId(1), NamespaceId(4), "Alpha"),
            DocumentRef::new(DocumentId(2), NamespaceId(0), "Zeta"),
            DocumentRef::new(DocumentId(3), NamespaceId(0), "Beta"),
        ];
        refs.sort();

        let titles: Vec<_> = refs.iter().map(ToString::to_string).collect();
        assert_eq!(titles, vec!["0:Beta", "0:Zeta", "4:Alpha"]);
    }

    #[test]
    fn test_plain_text_capability() {
        assert!(SlotContent::wikitext("x").is_plain_text());
        assert!(SlotContent::with_model(ContentModel::Json, "{}").is_plain_text());
        assert!(!SlotContent::with_model(ContentModel::Other("image".into()), "").is_plain_text());
    }

    #[test]
    fn test_main_namespace_display_name() {
        assert_eq!(Namespace::new(0, "").display_name(), "(main)");
        assert_eq!(Namespace::new(10, "Template").display_name(), "Template");
    }
}
