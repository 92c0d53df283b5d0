//! Scope filters restricting which documents a rule applies to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::document::NamespaceId;
use crate::error::{CoreError, Result};
use crate::title::TitlePolicy;

/// Filter restricting which documents a rule is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    /// Namespaces to search. Must not be empty.
    pub namespaces: BTreeSet<NamespaceId>,

    /// Only documents that are members of this category.
    pub category: Option<String>,

    /// Only documents whose title starts with this literal prefix.
    pub title_prefix: Option<String>,

    /// Maximum number of results; the configured default applies when unset.
    pub limit: Option<usize>,
}

impl ScopeFilter {
    /// Create a scope over the given namespaces.
    pub fn new(namespaces: impl IntoIterator<Item = NamespaceId>) -> Self {
        Self {
            namespaces: namespaces.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Restrict to members of a category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Restrict to titles with a prefix.
    pub fn with_title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.title_prefix = Some(prefix.into());
        self
    }

    /// Cap the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check the scope invariants.
    pub fn validate(&self) -> Result<()> {
        if self.namespaces.is_empty() {
            return Err(CoreError::Scope("at least one namespace is required".to_string()));
        }
        if self.limit == Some(0) {
            return Err(CoreError::Scope("limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Validate and resolve the scope into normalized query terms.
    ///
    /// Blank category and prefix strings count as unset.
    pub fn resolve(&self, default_limit: usize, titles: &TitlePolicy) -> Result<ResolvedScope> {
        self.validate()?;

        let limit = self.limit.unwrap_or(default_limit);
        if limit == 0 {
            return Err(CoreError::Scope("default limit must be at least 1".to_string()));
        }

        let category = self
            .category
            .as_deref()
            .map(|c| titles.normalize(c))
            .filter(|c| !c.is_empty());
        let title_prefix = self
            .title_prefix
            .as_deref()
            .map(|p| titles.normalize(p))
            .filter(|p| !p.is_empty());

        Ok(ResolvedScope {
            namespaces: self.namespaces.clone(),
            category,
            title_prefix,
            limit,
        })
    }
}

/// A validated scope with normalized category/prefix keys and a concrete limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    /// Namespaces to search (non-empty).
    pub namespaces: BTreeSet<NamespaceId>,

    /// Normalized category key.
    pub category: Option<String>,

    /// Normalized title prefix.
    pub title_prefix: Option<String>,

    /// Result cap (at least 1).
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_namespaces_rejected() {
        let err = ScopeFilter::default().validate().unwrap_err();
        assert!(matches!(err, CoreError::Scope(_)));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = ScopeFilter::new([NamespaceId::MAIN]).with_limit(0).validate().unwrap_err();
        assert!(matches!(err, CoreError::Scope(_)));
    }

    #[test]
    fn test_resolve_normalizes_and_defaults() {
        let resolved = ScopeFilter::new([NamespaceId::MAIN])
            .with_category("project docs")
            .with_title_prefix("draft ")
            .resolve(250, &TitlePolicy::default())
            .unwrap();

        assert_eq!(resolved.category.as_deref(), Some("Project_docs"));
        assert_eq!(resolved.title_prefix.as_deref(), Some("Draft"));
        assert_eq!(resolved.limit, 250);
    }

    #[test]
    fn test_blank_category_is_unset() {
        let resolved = ScopeFilter::new([NamespaceId::MAIN])
            .with_category("  ")
            .with_limit(5)
            .resolve(250, &TitlePolicy::default())
            .unwrap();

        assert_eq!(resolved.category, None);
        assert_eq!(resolved.limit, 5);
    }
}
