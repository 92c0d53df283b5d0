//! # Bulk Edit Core
//!
//! Read-side building blocks for bulk search-and-replace over a versioned
//! document corpus:
//!
//! - **Rules**: literal or regex targets with a replacement string
//! - **Match location**: scoped queries against a corpus snapshot
//! - **Preview snippets**: merged, escaped, highlighted context
//! - **Planning**: pure content and title replacement
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Bulk Edit Core                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Rule + ScopeFilter ──► MatchLocator ──► MatchResult            │
//! │                              │                 │                │
//! │                              ▼                 ▼                │
//! │                      CorpusSnapshot     ContextExtractor        │
//! │                                                                 │
//! │  DocumentStore ◄── (jobs) ──► ReplacementPlanner ──► TitlePolicy│
//! │                                                                 │
//! │  MemoryCorpus: CorpusSnapshot + DocumentStore, JSON snapshots   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bulkedit_core::{MatchLocator, MemoryCorpus, NamespaceId, Rule, ScopeFilter};
//!
//! let corpus = Arc::new(MemoryCorpus::load_snapshot("corpus.json").await?);
//! let locator = MatchLocator::new(corpus);
//!
//! let matches = locator
//!     .find_content_matches(&Rule::literal("foo", "bar"), &ScopeFilter::new([NamespaceId::MAIN]))
//!     .await?;
//! ```

pub mod corpus;
pub mod document;
pub mod error;
pub mod locator;
pub mod memory;
pub mod planner;
pub mod rule;
pub mod scope;
pub mod snippet;
pub mod title;

pub use corpus::{
    CorpusQuery, CorpusSnapshot, DocumentStore, EditFlags, MatchCondition, RenameRequest,
    RevisionEdit, SlotRow,
};
pub use document::{
    ActorId, ContentModel, Document, DocumentId, DocumentRef, Namespace, NamespaceId, RevisionId,
    Role, SlotContent,
};
pub use error::{CoreError, Result, StorageError};
pub use locator::{MatchLocator, MatchResult};
pub use memory::{MemoryCorpus, RenameRecord, RevisionRecord};
pub use planner::{ContentPlan, ReplacementPlanner, plan_content, plan_title};
pub use rule::{CompiledRule, MatchSpan, Rule, build_regex, translate_replacement};
pub use scope::{ResolvedScope, ScopeFilter};
pub use snippet::{ContextExtractor, MatchInterval, SnippetConfig, extract_snippet, merge_intervals};
pub use title::TitlePolicy;
