//! Configuration for the replace engine.

use std::path::Path;

use bulkedit_core::{ActorId, SnippetConfig, TitlePolicy};
use bulkedit_jobs::JobConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::summary::DEFAULT_SUMMARY_TEMPLATE;

/// Configuration for the replace engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Result cap applied when a scope sets none.
    pub default_limit: usize,

    /// Identity every change is attributed to, overriding the submitter.
    pub replace_actor: Option<ActorId>,

    /// Edit summary used when a submission has none. `%f` is the target,
    /// `%r` the replacement.
    pub summary_template: String,

    /// Preview snippet rendering.
    pub snippet: SnippetConfig,

    /// Title normalization and legality.
    pub titles: TitlePolicy,

    /// Job execution.
    pub jobs: JobConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: 250,
            replace_actor: None,
            summary_template: DEFAULT_SUMMARY_TEMPLATE.to_string(),
            snippet: SnippetConfig::default(),
            titles: TitlePolicy::default(),
            jobs: JobConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        debug!("Loaded engine configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(EngineError::Config("default_limit must be at least 1".to_string()));
        }
        if self.jobs.concurrency == 0 {
            return Err(EngineError::Config("jobs.concurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Set the default result cap.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Attribute every change to this identity.
    pub fn with_replace_actor(mut self, actor: impl Into<ActorId>) -> Self {
        self.replace_actor = Some(actor.into());
        self
    }

    /// Set the default summary template.
    pub fn with_summary_template(mut self, template: impl Into<String>) -> Self {
        self.summary_template = template.into();
        self
    }

    /// Set the snippet configuration.
    pub fn with_snippet(mut self, snippet: SnippetConfig) -> Self {
        self.snippet = snippet;
        self
    }

    /// Set the title policy.
    pub fn with_titles(mut self, titles: TitlePolicy) -> Self {
        self.titles = titles;
        self
    }

    /// Set the job configuration.
    pub fn with_jobs(mut self, jobs: JobConfig) -> Self {
        self.jobs = jobs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_limit, 250);
        assert_eq!(config.snippet.context_chars, 40);
        assert_eq!(config.snippet.newline_glyph, '\u{21B5}');
        assert_eq!(config.jobs.retry.max_attempts, 3);
        assert_eq!(config.jobs.unreadable_retry.max_attempts, 10);
        assert_eq!(config.jobs.unreadable_retry.initial_backoff_ms, 0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_limit = 50
            replace_actor = "ReplaceBot"

            [snippet]
            context_chars = 10

            [jobs.retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.default_limit, 50);
        assert_eq!(config.replace_actor, Some(ActorId::new("ReplaceBot")));
        assert_eq!(config.snippet.context_chars, 10);
        assert_eq!(config.snippet.ellipsis, "...");
        assert_eq!(config.jobs.retry.max_attempts, 5);
        assert_eq!(config.jobs.retry.initial_backoff_ms, 50);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = EngineConfig::from_toml_str("default_limit = 0").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.toml");
        tokio::fs::write(&path, "summary_template = \"bulk: %f -> %r\"\n")
            .await
            .unwrap();

        let config = EngineConfig::load(&path).await.unwrap();
        assert_eq!(config.summary_template, "bulk: %f -> %r");
    }
}
