//! Edit summary templating.

use bulkedit_core::Rule;

/// Summary used when a submission does not provide one.
pub const DEFAULT_SUMMARY_TEMPLATE: &str = "Text replacement - \"%f\" to \"%r\"";

/// Render a summary template for a rule.
///
/// `%f` becomes the target (line breaks shown as `↵`), `%r` the
/// replacement and `%%` a literal percent sign. Substituted text is never
/// scanned again.
pub fn render_summary(template: &str, rule: &Rule) -> String {
    let mut out = String::with_capacity(template.len() + rule.target.len() + rule.replacement.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('f') => {
                out.push_str(&rule.target.replace('\n', "\u{21B5}"));
                chars.next();
            }
            Some('r') => {
                out.push_str(&rule.replacement);
                chars.next();
            }
            Some('%') => {
                out.push('%');
                chars.next();
            }
            _ => out.push('%'),
        }
    }

    out
}
