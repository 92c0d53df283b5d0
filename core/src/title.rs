//! Title normalization and legality rules.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Characters that may never appear in a title.
const FORBIDDEN_CHARS: &[char] = &['#', '<', '>', '[', ']', '|', '{', '}', '\u{FFFD}'];

/// Rules a title must satisfy, and how raw input is normalized to the
/// stored title key form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitlePolicy {
    /// Maximum title length in bytes.
    pub max_bytes: usize,

    /// Upper-case the first character when normalizing.
    pub capitalize_first: bool,
}

impl Default for TitlePolicy {
    fn default() -> Self {
        Self {
            max_bytes: 255,
            capitalize_first: true,
        }
    }
}

impl TitlePolicy {
    /// Normalize raw text to a title key: spaces become underscores, runs
    /// of underscores collapse, leading and trailing underscores are
    /// dropped, and the first character is optionally upper-cased.
    pub fn normalize(&self, raw: &str) -> String {
        let mut key = String::with_capacity(raw.len());
        let mut pending_underscore = false;

        for c in raw.chars() {
            if c == ' ' || c == '_' {
                pending_underscore = !key.is_empty();
                continue;
            }
            if pending_underscore {
                key.push('_');
                pending_underscore = false;
            }
            key.push(c);
        }

        if self.capitalize_first {
            let mut chars = key.chars();
            if let Some(first) = chars.next() {
                return first.to_uppercase().chain(chars).collect();
            }
        }
        key
    }

    /// Normalize and validate a title, returning the legal key.
    pub fn validate(&self, raw: &str) -> Result<String> {
        let key = self.normalize(raw);

        if key.is_empty() {
            return Err(CoreError::invalid_title(raw, "title is empty"));
        }
        if let Some(c) = key
            .chars()
            .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
        {
            return Err(CoreError::invalid_title(
                raw,
                format!("contains forbidden character {c:?}"),
            ));
        }
        if key.starts_with(':') {
            return Err(CoreError::invalid_title(raw, "starts with a colon"));
        }
        if key == "." || key == ".." {
            return Err(CoreError::invalid_title(raw, "is a relative path"));
        }
        if key.starts_with("./")
            || key.starts_with("../")
            || key.contains("/./")
            || key.contains("/../")
            || key.ends_with("/.")
            || key.ends_with("/..")
        {
            return Err(CoreError::invalid_title(raw, "contains a relative path segment"));
        }
        if key.contains("~~~") {
            return Err(CoreError::invalid_title(raw, "contains a signature sequence"));
        }
        if key.len() > self.max_bytes {
            return Err(CoreError::invalid_title(
                raw,
                format!("longer than {} bytes", self.max_bytes),
            ));
        }

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_spaces_and_case() {
        let policy = TitlePolicy::default();
        assert_eq!(policy.normalize("  draft  report "), "Draft_report");
        assert_eq!(policy.normalize("__a__b__"), "A_b");
        assert_eq!(policy.normalize("ärger"), "Ärger");
    }

    #[test]
    fn test_normalize_keeps_case_when_disabled() {
        let policy = TitlePolicy {
            capitalize_first: false,
            ..TitlePolicy::default()
        };
        assert_eq!(policy.normalize("iPhone notes"), "iPhone_notes");
    }

    #[test]
    fn test_rejects_illegal_titles() {
        let policy = TitlePolicy::default();
        for bad in ["", "   ", "A[b]", "Tab\there", ":Lead", "..", "a/../b", "Sig~~~", "a|b"] {
            let err = policy.validate(bad).unwrap_err();
            assert!(matches!(err, CoreError::InvalidTitle { .. }), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_rejects_overlong_titles() {
        let policy = TitlePolicy {
            max_bytes: 4,
            ..TitlePolicy::default()
        };
        assert!(policy.validate("Abcd").is_ok());
        assert!(policy.validate("Abcde").is_err());
    }

    #[test]
    fn test_accepts_ordinary_title() {
        assert_eq!(TitlePolicy::default().validate("Report 2024").unwrap(), "Report_2024");
    }
}
