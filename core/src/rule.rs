//! Replacement rules and their compiled matchers.
//!
//! Literal rules match by plain substring containment, verbatim. Regex
//! rules use the `regex` crate with Unicode enabled and greed swapped, so
//! `a+` is lazy and `a+?` is greedy.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A target pattern, its replacement, and whether the pattern is a regex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Text or pattern to look for. Never empty.
    pub target: String,

    /// Replacement text. For regex rules `$1`, `${1}` and `\1` refer to
    /// capture groups.
    pub replacement: String,

    /// Whether `target` is a regular expression.
    pub is_regex: bool,
}

impl Rule {
    /// Create a literal rule.
    pub fn literal(target: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            replacement: replacement.into(),
            is_regex: false,
        }
    }

    /// Create a regex rule.
    pub fn regex(target: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            replacement: replacement.into(),
            is_regex: true,
        }
    }

    /// Check the rule invariants without keeping the compiled form.
    pub fn validate(&self) -> Result<()> {
        self.compile().map(|_| ())
    }

    /// Compile the rule into a reusable matcher.
    pub fn compile(&self) -> Result<CompiledRule> {
        if self.target.is_empty() {
            return Err(CoreError::InvalidRule("target must not be empty".to_string()));
        }

        let matcher = if self.is_regex {
            let regex = build_regex(&self.target)?;
            Matcher::Pattern {
                regex,
                template: translate_replacement(&self.replacement),
            }
        } else {
            Matcher::Literal {
                needle: self.target.clone(),
            }
        };

        Ok(CompiledRule {
            rule: self.clone(),
            matcher,
        })
    }
}

/// Build a regex in the rule dialect: Unicode-aware, ungreedy by default.
pub fn build_regex(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .unicode(true)
        .swap_greed(true)
        .build()
        .map_err(|e| CoreError::pattern(pattern, e))
}

/// Byte range of one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchSpan {
    /// Byte offset of the first matched byte.
    pub start: usize,

    /// Length of the match in bytes.
    pub len: usize,
}

impl MatchSpan {
    /// Create a span.
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// Byte offset one past the last matched byte.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Whether the match is zero-length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal { needle: String },
    Pattern { regex: Regex, template: String },
}

/// A validated rule ready to search and substitute.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    matcher: Matcher,
}

impl CompiledRule {
    /// The rule this was compiled from.
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Whether the text contains at least one match.
    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Literal { needle } => text.contains(needle.as_str()),
            Matcher::Pattern { regex, .. } => regex.is_match(text),
        }
    }

    /// All non-overlapping matches, ordered by offset.
    pub fn find_spans(&self, text: &str) -> Vec<MatchSpan> {
        match &self.matcher {
            Matcher::Literal { needle } => text
                .match_indices(needle.as_str())
                .map(|(start, m)| MatchSpan::new(start, m.len()))
                .collect(),
            Matcher::Pattern { regex, .. } => regex
                .find_iter(text)
                .map(|m| MatchSpan::new(m.start(), m.len()))
                .collect(),
        }
    }

    /// Replace every match, returning the new text and the number of
    /// substitutions performed.
    pub fn replace_all(&self, text: &str) -> (String, usize) {
        match &self.matcher {
            Matcher::Literal { needle } => {
                let count = text.matches(needle.as_str()).count();
                if count == 0 {
                    return (text.to_string(), 0);
                }
                (text.replace(needle.as_str(), &self.rule.replacement), count)
            }
            Matcher::Pattern { regex, template } => {
                let mut out = String::with_capacity(text.len());
                let mut last = 0;
                let mut count = 0;
                for caps in regex.captures_iter(text) {
                    let whole = caps.get_match();
                    out.push_str(&text[last..whole.start()]);
                    caps.expand(template, &mut out);
                    last = whole.end();
                    count += 1;
                }
                out.push_str(&text[last..]);
                (out, count)
            }
        }
    }
}

/// Rewrite numbered back-references to the `${n}` form the regex crate
/// expands unambiguously. Any other `$` becomes a literal dollar sign.
pub fn translate_replacement(replacement: &str) -> String {
    let chars: Vec<char> = replacement.chars().collect();
    let mut out = String::with_capacity(replacement.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                let (group, next) = take_group(&chars, i + 1);
                out.push_str(&format!("${{{group}}}"));
                i = next;
            }
            '$' if chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                let (group, next) = take_group(&chars, i + 1);
                out.push_str(&format!("${{{group}}}"));
                i = next;
            }
            '$' if chars.get(i + 1) == Some(&'{') => {
                let (group, next) = take_group(&chars, i + 2);
                if !group.is_empty() && chars.get(next) == Some(&'}') {
                    out.push_str(&format!("${{{group}}}"));
                    i = next + 1;
                } else {
                    out.push_str("$$");
                    i += 1;
                }
            }
            '$' => {
                out.push_str("$$");
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Read up to two ASCII digits starting at `from`.
fn take_group(chars: &[char], from: usize) -> (String, usize) {
    let mut group = String::new();
    let mut i = from;
    while i < chars.len() && group.len() < 2 && chars[i].is_ascii_digit() {
        group.push(chars[i]);
        i += 1;
    }
    (group, i)
}
