//! Locating rule matches in a corpus snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::{CorpusQuery, CorpusSnapshot, MatchCondition};
use crate::document::{Document, DocumentRef, Role};
use crate::error::{CoreError, Result};
use crate::rule::{MatchSpan, Rule};
use crate::scope::{ResolvedScope, ScopeFilter};
use crate::title::TitlePolicy;

/// One slot of one document with at least one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Document the slot belongs to.
    pub document: DocumentRef,

    /// Slot role.
    pub role: Role,

    /// Match positions within `text`, ordered and non-overlapping.
    pub offsets: Vec<MatchSpan>,

    /// Slot text at snapshot time.
    pub text: String,
}

/// Finds candidate documents and slots for a rule within a scope.
///
/// Results come from a snapshot and may be stale; callers that modify
/// documents must revalidate against the authoritative store.
pub struct MatchLocator {
    snapshot: Arc<dyn CorpusSnapshot>,
    default_limit: usize,
    titles: TitlePolicy,
}

impl MatchLocator {
    /// Create a locator over a snapshot.
    pub fn new(snapshot: Arc<dyn CorpusSnapshot>) -> Self {
        Self {
            snapshot,
            default_limit: 250,
            titles: TitlePolicy::default(),
        }
    }

    /// Set the limit used when a scope has none.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the title policy used to normalize scope keys.
    pub fn with_title_policy(mut self, titles: TitlePolicy) -> Self {
        self.titles = titles;
        self
    }

    /// The snapshot this locator reads.
    pub fn snapshot(&self) -> &Arc<dyn CorpusSnapshot> {
        &self.snapshot
    }

    /// Find slots whose content matches the rule, ordered by
    /// `(namespace, title)` and capped at the scope limit.
    pub async fn find_content_matches(
        &self,
        rule: &Rule,
        scope: &ScopeFilter,
    ) -> Result<Vec<MatchResult>> {
        self.find_content_matches_in_roles(rule, scope, &BTreeSet::new())
            .await
    }

    /// Like [`Self::find_content_matches`], searching only the given slot
    /// roles. The scope limit counts matching slots of those roles; an
    /// empty set searches every role.
    pub async fn find_content_matches_in_roles(
        &self,
        rule: &Rule,
        scope: &ScopeFilter,
        roles: &BTreeSet<Role>,
    ) -> Result<Vec<MatchResult>> {
        let compiled = rule.compile()?;
        let resolved = self.resolve(rule, scope)?;

        let query = CorpusQuery::new(&resolved, condition_for(rule)).with_roles(roles.clone());
        let rows = self.snapshot.select_slots(&query).await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let offsets = compiled.find_spans(&row.text);
            if offsets.is_empty() {
                // The corpus dialect can disagree with ours on edge cases.
                debug!("Dropping {} ({}): no matches in rule dialect", row.document, row.role);
                continue;
            }
            results.push(MatchResult {
                document: row.document,
                role: row.role,
                offsets,
                text: row.text,
            });
        }

        results.sort_by(|a, b| {
            (a.document.namespace, &a.document.title, &a.role)
                .cmp(&(b.document.namespace, &b.document.title, &b.role))
        });
        debug!("Found {} content matches for {:?}", results.len(), rule.target);
        Ok(results)
    }

    /// Find documents whose title matches the rule, ordered by
    /// `(namespace, title)` and capped at the scope limit.
    pub async fn find_title_matches(
        &self,
        rule: &Rule,
        scope: &ScopeFilter,
    ) -> Result<Vec<Document>> {
        let compiled = rule.compile()?;
        let resolved = self.resolve(rule, scope)?;

        let query = CorpusQuery::new(&resolved, condition_for(rule));
        let mut docs: Vec<Document> = self
            .snapshot
            .select_documents(&query)
            .await?
            .into_iter()
            .filter(|doc| compiled.is_match(&doc.title))
            .collect();

        docs.sort_by(|a, b| (a.namespace, &a.title).cmp(&(b.namespace, &b.title)));
        debug!("Found {} title matches for {:?}", docs.len(), rule.target);
        Ok(docs)
    }

    fn resolve(&self, rule: &Rule, scope: &ScopeFilter) -> Result<ResolvedScope> {
        let resolved = scope.resolve(self.default_limit, &self.titles)?;
        if rule.is_regex && !self.snapshot.supports_regex() {
            return Err(CoreError::RegexUnsupported);
        }
        Ok(resolved)
    }
}

fn condition_for(rule: &Rule) -> MatchCondition {
    if rule.is_regex {
        MatchCondition::Regex(rule.target.clone())
    } else {
        MatchCondition::Contains(rule.target.clone())
    }
}
