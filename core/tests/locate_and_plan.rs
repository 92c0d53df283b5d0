use std::sync::Arc;

use bulkedit_core::{
    MatchLocator, MemoryCorpus, NamespaceId, Role, Rule, ScopeFilter, SlotContent, extract_snippet,
    plan_content,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_locate_then_plan_counts_every_occurrence() {
    let corpus = Arc::new(MemoryCorpus::new());
    for title in ["One", "Two", "Three"] {
        corpus
            .insert_text(NamespaceId::MAIN, title, "foo, then foo again")
            .await
            .unwrap();
    }
    corpus.insert_text(NamespaceId::MAIN, "Other", "no match").await.unwrap();

    let rule = Rule::literal("foo", "bar");
    let scope = ScopeFilter::new([NamespaceId::MAIN]).with_limit(100);
    let results = MatchLocator::new(corpus.clone())
        .find_content_matches(&rule, &scope)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    for result in &results {
        assert_eq!(result.offsets.len(), 2);
        let plan = plan_content(&result.text, &rule).unwrap();
        assert_eq!(plan.match_count, result.offsets.len());
        assert_eq!(plan.text, "bar, then bar again");
    }
}

#[tokio::test]
async fn test_category_scope_and_auxiliary_slots() {
    let corpus = Arc::new(MemoryCorpus::new());
    let tagged = corpus
        .insert(
            NamespaceId::MAIN,
            "Tagged",
            [
                (Role::main(), SlotContent::wikitext("plain")),
                (Role::new("notes"), SlotContent::wikitext("needle here")),
            ],
        )
        .await
        .unwrap();
    corpus.insert_text(NamespaceId::MAIN, "Untagged", "needle").await.unwrap();
    corpus.add_to_category(tagged.id, "Reviewed_pages").await.unwrap();

    let scope = ScopeFilter::new([NamespaceId::MAIN]).with_category("reviewed pages");
    let results = MatchLocator::new(corpus)
        .find_content_matches(&Rule::literal("needle", "pin"), &scope)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.title, "Tagged");
    assert_eq!(results[0].role, Role::new("notes"));
}

#[test]
fn test_snippet_for_multiline_match() {
    let snippet = extract_snippet("line one\nline two", &Rule::regex("one\\nline", "x"), 4).unwrap();
    assert_eq!(snippet, "...ine <mark>one\u{21B5}line</mark> two");
}
