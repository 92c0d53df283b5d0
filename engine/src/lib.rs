//! # Replace Engine
//!
//! This crate ties bulk search-and-replace together:
//!
//! - **Preview**: locate candidates, render snippets, plan renames, warn
//! - **Commit**: turn the selected candidates into attributable jobs
//! - **Bulk rules**: apply a tab-separated rule file one rule at a time
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Replace Engine                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   Submission ──► MatchLocator ──► FilterHook ──► Preview        │
//! │                                                    │            │
//! │                                       Selection ───┤            │
//! │                                                    ▼            │
//! │                                     Job per document ──► Queue  │
//! │                                                          │      │
//! │                         BatchWorker ◄────────────────────┘      │
//! │                              │                                  │
//! │                              ▼                                  │
//! │                  JobRunner ──► DocumentStore                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bulkedit_engine::{ReplaceEngine, Selection, Submission};
//!
//! let engine = ReplaceEngine::builder()
//!     .with_memory_corpus(corpus)
//!     .with_authority(authority)
//!     .build()?;
//!
//! let submission = Submission::edit(Rule::literal("foo", "bar"), scope, "Ann");
//! let preview = engine.preview(&submission).await?;
//! engine.commit(&submission, &Selection::All).await?;
//! let report = engine.run_queued().await;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod rules_file;
pub mod submission;
pub mod summary;

pub use config::EngineConfig;
pub use engine::{ReplaceEngine, ReplaceEngineBuilder};
pub use error::{EngineError, Result};
pub use filter::{FilterHook, FilterPurpose, PassThrough};
pub use rules_file::{load_rules, parse_rules};
pub use submission::{
    CommitReceipt, EditCandidate, MoveCandidate, Preview, PreviewWarning, RuleRun, Selection,
    Submission, Unmovable,
};
pub use summary::{DEFAULT_SUMMARY_TEMPLATE, render_summary};

// Re-export from dependencies for convenience
pub use bulkedit_core::{MemoryCorpus, NamespaceId, Role, Rule, ScopeFilter};
pub use bulkedit_jobs::{BatchReport, MoveOptions, StaticAuthority};
