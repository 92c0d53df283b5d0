//! Pure replacement planning for content and titles.

use crate::error::{CoreError, Result};
use crate::rule::{CompiledRule, Rule};
use crate::title::TitlePolicy;

/// New content for one slot, and how many substitutions produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPlan {
    /// Replaced text.
    pub text: String,

    /// Number of substitutions. Zero means there is nothing to commit.
    pub match_count: usize,
}

impl ContentPlan {
    /// Whether applying this plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.match_count == 0
    }
}

/// Applies one compiled rule to content and titles.
#[derive(Debug, Clone)]
pub struct ReplacementPlanner {
    rule: CompiledRule,
    titles: TitlePolicy,
}

impl ReplacementPlanner {
    /// Compile a rule for planning.
    pub fn new(rule: &Rule, titles: TitlePolicy) -> Result<Self> {
        Ok(Self {
            rule: rule.compile()?,
            titles,
        })
    }

    /// The compiled rule.
    pub fn rule(&self) -> &CompiledRule {
        &self.rule
    }

    /// Plan the new content of a slot.
    pub fn plan_content(&self, old_text: &str) -> ContentPlan {
        let (text, match_count) = self.rule.replace_all(old_text);
        ContentPlan { text, match_count }
    }

    /// Plan a new title, failing when the result is not a legal title.
    pub fn plan_title(&self, old_title: &str) -> Result<String> {
        let (replaced, _) = self.rule.replace_all(old_title);
        self.titles.validate(&replaced).map_err(|e| match e {
            CoreError::InvalidTitle { reason, .. } => CoreError::InvalidTitle {
                title: replaced.clone(),
                reason: format!("renaming {old_title:?}: {reason}"),
            },
            other => other,
        })
    }
}

/// Plan the new content of a slot for a rule.
pub fn plan_content(old_text: &str, rule: &Rule) -> Result<ContentPlan> {
    let compiled = rule.compile()?;
    let (text, match_count) = compiled.replace_all(old_text);
    Ok(ContentPlan { text, match_count })
}

/// Plan a new title for a rule under the given title policy.
pub fn plan_title(old_title: &str, rule: &Rule, titles: &TitlePolicy) -> Result<String> {
    ReplacementPlanner::new(rule, titles.clone())?.plan_title(old_title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_literal_plan_is_idempotent() {
        let rule = Rule::literal("colour", "color");
        let first = plan_content("colour and colour, colourful", &rule).unwrap();
        assert_eq!(first.match_count, 3);

        let second = plan_content(&first.text, &rule).unwrap();
        assert!(second.is_noop());
        assert_eq!(second.text, first.text);
    }

    #[test]
    fn test_count_matches_occurrences() {
        let plan = plan_content("foo x foo y foo", &Rule::literal("foo", "bar")).unwrap();
        assert_eq!(plan.match_count, 3);
        assert_eq!(plan.text, "bar x bar y bar");
    }

    #[test]
    fn test_regex_plan_with_backreference() {
        let plan = plan_content("aab xb", &Rule::regex("(a+)b", "[$1]")).unwrap();
        assert_eq!(plan.match_count, 1);
        assert_eq!(plan.text, "[aa] xb");
    }

    #[test]
    fn test_plan_title_strips_prefix() {
        let title = plan_title("Draft_Report", &Rule::literal("Draft_", ""), &TitlePolicy::default())
            .unwrap();
        assert_eq!(title, "Report");
    }

    #[test]
    fn test_plan_title_rejects_empty_result() {
        let err = plan_title("Draft", &Rule::literal("Draft", ""), &TitlePolicy::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTitle { .. }));
    }

    #[test]
    fn test_plan_title_rejects_forbidden_characters() {
        let planner = ReplacementPlanner::new(&Rule::literal("_", "|"), TitlePolicy::default())
            .unwrap();
        let err = planner.plan_title("A_B").unwrap_err();
        match err {
            CoreError::InvalidTitle { title, .. } => assert_eq!(title, "A|B"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
