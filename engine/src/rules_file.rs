//! Bulk rule files.
//!
//! One rule per line: `target<TAB>replacement[<TAB>anything]`. A third
//! field, whatever it holds, marks the rule as a regex. Lines without a
//! tab are comments.

use std::path::Path;

use bulkedit_core::Rule;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Parse the contents of a rule file.
pub fn parse_rules(text: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if !line.contains('\t') {
            continue;
        }

        let mut fields = line.splitn(3, '\t');
        let target = fields.next().unwrap_or_default();
        let replacement = fields.next().unwrap_or_default();
        let is_regex = fields.next().is_some();

        let rule = Rule {
            target: target.to_string(),
            replacement: replacement.to_string(),
            is_regex,
        };
        rule.validate().map_err(|e| EngineError::RulesFile {
            line: index + 1,
            message: e.to_string(),
        })?;
        rules.push(rule);
    }

    debug!("Parsed {} rules", rules.len());
    Ok(rules)
}

/// Read and parse a rule file.
pub async fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    parse_rules(&text)
}
