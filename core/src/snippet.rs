//! Highlighted preview snippets.
//!
//! Matches close to each other share one excerpt: a match is merged into
//! the current interval when the gap from the interval end to the match is
//! shorter than twice the context width. Each interval is widened by the
//! context width on both sides, cut with an ellipsis where it stops short
//! of the document boundary, escaped for display and highlighted at the
//! offsets that were found, never by searching again.
//!
//! Distances and widths are counted in extended grapheme clusters, so an
//! excerpt never splits a character or a combining sequence.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::rule::{CompiledRule, MatchSpan, Rule};

/// How snippets are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    /// Context width on each side of an interval, in graphemes.
    pub context_chars: usize,

    /// Marker placed where an excerpt is cut short.
    pub ellipsis: String,

    /// Inserted before each highlighted match.
    pub highlight_open: String,

    /// Inserted after each highlighted match.
    pub highlight_close: String,

    /// Shown in place of each line break.
    pub newline_glyph: char,

    /// Render runs of spaces with non-breaking spaces so they stay visible.
    pub preserve_spaces: bool,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            context_chars: 40,
            ellipsis: "...".to_string(),
            highlight_open: "<mark>".to_string(),
            highlight_close: "</mark>".to_string(),
            newline_glyph: '\u{21B5}',
            preserve_spaces: true,
        }
    }
}

impl SnippetConfig {
    /// Set the context width.
    pub fn with_context_chars(mut self, context_chars: usize) -> Self {
        self.context_chars = context_chars;
        self
    }

    /// Set the highlight markers.
    pub fn with_highlight(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.highlight_open = open.into();
        self.highlight_close = close.into();
        self
    }
}

/// A run of matches that share one excerpt. Offsets are bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchInterval {
    /// Start of the first match.
    pub start: usize,

    /// Furthest end of any merged match.
    pub end: usize,

    /// The merged matches, in order.
    pub matches: Vec<MatchSpan>,
}

/// Grapheme boundaries of a text, for converting byte offsets.
struct Graphemes {
    /// Byte offset of every grapheme start, followed by the text length.
    bounds: Vec<usize>,
}

impl Graphemes {
    fn new(text: &str) -> Self {
        let mut bounds: Vec<usize> = text.grapheme_indices(true).map(|(i, _)| i).collect();
        bounds.push(text.len());
        Self { bounds }
    }

    fn count(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Index of the grapheme containing `byte`.
    fn floor(&self, byte: usize) -> usize {
        self.bounds.partition_point(|&b| b <= byte).saturating_sub(1)
    }

    /// Index of the first grapheme boundary at or after `byte`.
    fn ceil(&self, byte: usize) -> usize {
        self.bounds.partition_point(|&b| b < byte)
    }

    fn byte(&self, index: usize) -> usize {
        self.bounds[index.min(self.count())]
    }
}

/// Merge ordered matches into preview intervals.
///
/// A match joins the current interval when fewer than `2 * context_chars`
/// graphemes separate the interval end from the match start.
pub fn merge_intervals(content: &str, spans: &[MatchSpan], context_chars: usize) -> Vec<MatchInterval> {
    let graphemes = Graphemes::new(content);
    merge_with(&graphemes, spans, context_chars)
}

fn merge_with(graphemes: &Graphemes, spans: &[MatchSpan], context_chars: usize) -> Vec<MatchInterval> {
    let window = context_chars.saturating_mul(2);
    let mut intervals: Vec<MatchInterval> = Vec::new();

    for span in spans {
        if let Some(current) = intervals.last_mut() {
            let gap = graphemes
                .floor(span.start)
                .saturating_sub(graphemes.ceil(current.end));
            if span.start < current.end || gap < window {
                current.end = current.end.max(span.end());
                current.matches.push(*span);
                continue;
            }
        }
        intervals.push(MatchInterval {
            start: span.start,
            end: span.end(),
            matches: vec![*span],
        });
    }

    intervals
}

/// Renders snippets for display.
#[derive(Debug, Clone, Default)]
pub struct ContextExtractor {
    config: SnippetConfig,
}

impl ContextExtractor {
    /// Create an extractor with the given rendering options.
    pub fn new(config: SnippetConfig) -> Self {
        Self { config }
    }

    /// Rendering options in use.
    pub fn config(&self) -> &SnippetConfig {
        &self.config
    }

    /// Find every match of the rule and render the snippet.
    pub fn extract(&self, content: &str, rule: &CompiledRule) -> String {
        self.render(content, &rule.find_spans(content))
    }

    /// Render a snippet from already-known match offsets.
    ///
    /// Zero-length matches and spans that do not fall on character
    /// boundaries of `content` are ignored. Returns an empty string when
    /// there is nothing to show.
    pub fn render(&self, content: &str, spans: &[MatchSpan]) -> String {
        let mut spans: Vec<MatchSpan> = spans
            .iter()
            .copied()
            .filter(|s| {
                !s.is_empty()
                    && s.end() <= content.len()
                    && content.is_char_boundary(s.start)
                    && content.is_char_boundary(s.end())
            })
            .collect();
        spans.sort();

        let graphemes = Graphemes::new(content);
        let context = self.config.context_chars;
        let mut out = String::new();

        for interval in merge_with(&graphemes, &spans, context) {
            let first = graphemes.floor(interval.start).saturating_sub(context);
            let last = graphemes.ceil(interval.end).saturating_add(context);
            let window_start = graphemes.byte(first);
            let window_end = graphemes.byte(last);

            if first > 0 {
                out.push_str(&self.config.ellipsis);
            }

            let mut pos = window_start;
            for span in &interval.matches {
                if span.start < pos {
                    continue;
                }
                self.push_text(&mut out, content, pos..span.start);
                out.push_str(&self.config.highlight_open);
                self.push_text(&mut out, content, span.start..span.end());
                out.push_str(&self.config.highlight_close);
                pos = span.end();
            }
            self.push_text(&mut out, content, pos..window_end);

            if last < graphemes.count() {
                out.push_str(&self.config.ellipsis);
            }
        }

        out
    }

    /// Escape `content[range]` into `out`. Line edges are judged against
    /// the whole content, not the piece being written.
    fn push_text(&self, out: &mut String, content: &str, range: Range<usize>) {
        let bytes = content.as_bytes();
        let at_line_edge = |i: usize| {
            i == 0 || bytes[i - 1] == b'\n' || i + 1 == bytes.len() || bytes[i + 1] == b'\n'
        };

        let start = range.start;
        let mut previous_space = false;
        for (offset, c) in content[range].char_indices() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#039;"),
                '\n' => out.push(self.config.newline_glyph),
                ' ' if self.config.preserve_spaces && at_line_edge(start + offset) => {
                    out.push('\u{A0}');
                    previous_space = false;
                    continue;
                }
                ' ' if self.config.preserve_spaces && previous_space => {
                    // Second space of a pair: the first becomes non-breaking.
                    out.pop();
                    out.push_str("\u{A0} ");
                    previous_space = false;
                    continue;
                }
                c => out.push(c),
            }
            previous_space = c == ' ';
        }
    }
}

/// Render a snippet for a rule with default styling and the given context
/// width.
pub fn extract_snippet(content: &str, rule: &Rule, context_chars: usize) -> Result<String> {
    let compiled = rule.compile()?;
    let extractor = ContextExtractor::new(SnippetConfig::default().with_context_chars(context_chars));
    Ok(extractor.extract(content, &compiled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plain(context_chars: usize) -> ContextExtractor {
        ContextExtractor::new(SnippetConfig {
            context_chars,
            preserve_spaces: false,
            ..SnippetConfig::default()
        })
    }

    #[test]
    fn test_near_matches_merge_into_one_interval() {
        // Gap of 5 between "x" at 0 and "x" at 6, context 3 => 5 < 6.
        let spans = [MatchSpan::new(0, 1), MatchSpan::new(6, 1)];
        let intervals = merge_intervals("x-----x", &spans, 3);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].end, 7);
    }

    #[test]
    fn test_distant_matches_produce_two_intervals() {
        // Gap of 6, context 3 => 6 is not < 6.
        let spans = [MatchSpan::new(0, 1), MatchSpan::new(7, 1)];
        let intervals = merge_intervals("x------x", &spans, 3);
        assert_eq!(intervals.len(), 2);
    }

    #[test]
    fn test_interval_end_is_furthest_match_end() {
        let spans = [MatchSpan::new(0, 10), MatchSpan::new(2, 2), MatchSpan::new(12, 1)];
        let intervals = merge_intervals("aaaaaaaaaa  b", &spans, 2);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].end, 13);
    }

    #[test]
    fn test_snippet_ellipsis_and_highlight() {
        let rule = Rule::literal("foo", "bar").compile().unwrap();
        let snippet = plain(3).extract("0123456foo6543210", &rule);
        assert_eq!(snippet, "...456<mark>foo</mark>654...");
    }

    #[test]
    fn test_snippet_reaching_boundaries_has_no_ellipsis() {
        let rule = Rule::literal("foo", "bar").compile().unwrap();
        assert_eq!(plain(40).extract("a foo b", &rule), "a <mark>foo</mark> b");
    }

    #[test]
    fn test_two_intervals_concatenated_in_order() {
        let rule = Rule::literal("x", "y").compile().unwrap();
        let snippet = plain(1).extract("ax---------xb", &rule);
        assert_eq!(snippet, "a<mark>x</mark>-......-<mark>x</mark>b");
    }

    #[test]
    fn test_escapes_and_newline_glyph() {
        let rule = Rule::literal("<b>", "").compile().unwrap();
        let snippet = plain(40).extract("1 & 2\n<b>", &rule);
        assert_eq!(snippet, "1 &amp; 2\u{21B5}<mark>&lt;b&gt;</mark>");
    }

    #[test]
    fn test_highlight_uses_found_offsets() {
        // The replacement text recurring in context must not be marked.
        let rule = Rule::literal("cat", "dog").compile().unwrap();
        let snippet = plain(40).extract("dog cat dog", &rule);
        assert_eq!(snippet, "dog <mark>cat</mark> dog");
    }

    #[test]
    fn test_multibyte_context_is_not_split() {
        let rule = Rule::literal("x", "y").compile().unwrap();
        let snippet = plain(2).extract("ééééxéééé", &rule);
        assert_eq!(snippet, "...éé<mark>x</mark>éé...");

        let combining = "a\u{0301}b\u{0301}xc\u{0301}d\u{0301}";
        let snippet = plain(1).extract(combining, &rule);
        assert_eq!(snippet, "...b\u{0301}<mark>x</mark>c\u{0301}...");
    }

    #[test]
    fn test_preserve_spaces() {
        let rule = Rule::literal("x", "y").compile().unwrap();
        let extractor = ContextExtractor::new(SnippetConfig::default());
        assert_eq!(extractor.extract("a  x", &rule), "a\u{A0} <mark>x</mark>");
    }

    #[test]
    fn test_preserve_spaces_at_line_edges() {
        let rule = Rule::literal("x", "y").compile().unwrap();
        let extractor = ContextExtractor::new(SnippetConfig::default());
        assert_eq!(extractor.extract("a\n x", &rule), "a\u{21B5}\u{A0}<mark>x</mark>");
        assert_eq!(extractor.extract("x \nb ", &rule), "<mark>x</mark>\u{A0}\u{21B5}b\u{A0}");
        // Only line edges count; a piece boundary mid-line does not.
        assert_eq!(extractor.extract("a x b", &rule), "a <mark>x</mark> b");
    }

    #[test]
    fn test_spans_off_char_boundaries_are_ignored() {
        let extractor = plain(40);
        assert_eq!(extractor.render("é x", &[MatchSpan::new(1, 1)]), "");
        assert_eq!(
            extractor.render("é x", &[MatchSpan::new(1, 1), MatchSpan::new(3, 1)]),
            "é <mark>x</mark>"
        );
    }

    #[test]
    fn test_zero_length_matches_are_ignored() {
        let rule = Rule::regex("^", "").compile().unwrap();
        assert_eq!(plain(5).extract("text", &rule), "");
    }

    #[test]
    fn test_extract_snippet_with_regex_rule() {
        let snippet = extract_snippet("aab xb", &Rule::regex("(a+)b", "[$1]"), 40).unwrap();
        assert_eq!(snippet, "<mark>aab</mark> xb");
    }
}
