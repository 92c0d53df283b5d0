use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use bulkedit_core::{
    ActorId, ContentModel, Document, DocumentId, DocumentRef, DocumentStore, MemoryCorpus,
    NamespaceId, RenameRequest, RevisionEdit, RevisionId, Role, Rule, SlotContent, StorageError,
};
use bulkedit_jobs::{
    Attribution, ErrorKind, Job, JobConfig, JobError, JobRunner, JobState, MoveOptions,
    RetryPolicy, Right, StaticAuthority, DEFAULT_UNREADABLE_MARKER,
};
use pretty_assertions::assert_eq;

async fn authority() -> Arc<StaticAuthority> {
    let authority = StaticAuthority::new();
    authority.grant("Editor", [Right::Replace, Right::Move]).await;
    Arc::new(authority)
}

fn attribution() -> Attribution {
    Attribution::new("Editor", "Text replacement - \"foo\" to \"bar\"")
}

fn quick_retries() -> JobConfig {
    JobConfig::default()
        .with_retry(RetryPolicy::without_backoff(3))
        .with_unreadable_retry(RetryPolicy::without_backoff(3))
}

#[tokio::test]
async fn test_edit_jobs_replace_every_occurrence() {
    let corpus = Arc::new(MemoryCorpus::new());
    let mut docs = Vec::new();
    for title in ["One", "Two", "Three"] {
        docs.push(
            corpus
                .insert_text(NamespaceId::MAIN, title, "foo and foo")
                .await
                .unwrap(),
        );
    }
    let runner = JobRunner::new(corpus.clone(), authority().await);

    for doc in &docs {
        let job = Job::edit(doc.clone(), Rule::literal("foo", "bar"), [], attribution());
        let outcome = runner.run(job).await;
        assert_eq!(outcome.state, JobState::Committed);
        assert!(outcome.revision.is_some());

        let stored = corpus.load(doc.id).await.unwrap().unwrap();
        assert_eq!(stored.slot(&Role::main()).unwrap().text, "bar and bar");
    }

    let revisions = corpus.revisions(docs[0].id).await;
    assert_eq!(revisions.len(), 1);
    assert!(revisions[0].flags.minor);
    assert!(!revisions[0].flags.bot);
    assert_eq!(revisions[0].actor, ActorId::new("Editor"));
}

#[tokio::test]
async fn test_replayed_job_resolves_to_skipped() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus.insert_text(NamespaceId::MAIN, "Page", "foo").await.unwrap();
    let runner = JobRunner::new(corpus.clone(), authority().await);
    let job = Job::edit(doc, Rule::literal("foo", "bar"), [], attribution());

    assert_eq!(runner.run(job.clone()).await.state, JobState::Committed);
    let replay = runner.run(job).await;
    assert_eq!(replay.state, JobState::Skipped);
    assert!(replay.error.is_none());

    let path: Vec<_> = replay.history.iter().map(|c| c.to).collect();
    assert_eq!(path, vec![JobState::Validating, JobState::Applying, JobState::Skipped]);
}

#[tokio::test]
async fn test_only_changed_slots_are_staged() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus
        .insert(
            NamespaceId::MAIN,
            "Page",
            [
                (Role::main(), SlotContent::wikitext("foo")),
                (Role::new("notes"), SlotContent::wikitext("nothing")),
            ],
        )
        .await
        .unwrap();
    let runner = JobRunner::new(corpus.clone(), authority().await);

    let outcome = runner
        .run(Job::edit(doc.clone(), Rule::literal("foo", "bar"), [], attribution()))
        .await;
    assert_eq!(outcome.state, JobState::Committed);
    assert_eq!(corpus.revisions(doc.id).await[0].roles, vec![Role::main()]);
}

#[tokio::test]
async fn test_lost_permission_is_a_soft_failure() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus.insert_text(NamespaceId::MAIN, "Page", "foo").await.unwrap();
    let authority = authority().await;
    authority.revoke(&ActorId::new("Editor"), Right::Replace).await;
    let runner = JobRunner::new(corpus.clone(), authority);

    let outcome = runner
        .run(Job::edit(doc.clone(), Rule::literal("foo", "bar"), [], attribution()))
        .await;
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(outcome.error.as_ref().map(JobError::kind), Some(ErrorKind::Soft));
    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 1);

    let stored = corpus.load(doc.id).await.unwrap().unwrap();
    assert_eq!(stored.slot(&Role::main()).unwrap().text, "foo");
}

#[tokio::test]
async fn test_unregistered_actor_is_fatal() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus.insert_text(NamespaceId::MAIN, "Page", "foo").await.unwrap();
    let runner = JobRunner::new(corpus, authority().await);

    let job = Job::edit(doc, Rule::literal("foo", "bar"), [], Attribution::new("Ghost", "s"));
    let outcome = runner.run(job).await;
    assert!(matches!(outcome.error, Some(JobError::UnknownActor(_))));
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn test_missing_slot_is_fatal() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus.insert_text(NamespaceId::MAIN, "Page", "foo").await.unwrap();
    let runner = JobRunner::new(corpus, authority().await);

    let job = Job::edit(doc, Rule::literal("foo", "bar"), [Role::new("notes")], attribution());
    let outcome = runner.run(job).await;
    assert_eq!(outcome.state, JobState::Failed);
    assert!(matches!(outcome.error, Some(JobError::SlotMissing { .. })));
}

#[tokio::test]
async fn test_non_text_slot_blocks_the_whole_edit() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus
        .insert(
            NamespaceId::MAIN,
            "Page",
            [
                (Role::main(), SlotContent::wikitext("foo")),
                (
                    Role::new("media"),
                    SlotContent::with_model(ContentModel::Other("image".into()), "foo"),
                ),
            ],
        )
        .await
        .unwrap();
    let runner = JobRunner::new(corpus.clone(), authority().await);

    let outcome = runner
        .run(Job::edit(doc.clone(), Rule::literal("foo", "bar"), [], attribution()))
        .await;
    assert!(matches!(outcome.error, Some(JobError::UnsupportedContentType { .. })));
    assert!(corpus.revisions(doc.id).await.is_empty());
}

#[tokio::test]
async fn test_unreadable_content_gives_up_after_bounded_reads() {
    let corpus = Arc::new(MemoryCorpus::new());
    let text = format!("foo {DEFAULT_UNREADABLE_MARKER}");
    let doc = corpus.insert_text(NamespaceId::MAIN, "Page", &text).await.unwrap();
    let runner = JobRunner::new(corpus, authority().await).with_config(quick_retries());

    let outcome = runner
        .run(Job::edit(doc, Rule::literal("foo", "bar"), [], attribution()))
        .await;
    match outcome.error {
        Some(JobError::Unreadable { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_bot_and_patrol_flags() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus.insert_text(NamespaceId::MAIN, "Page", "foo").await.unwrap();
    let authority = authority().await;
    authority.grant("Editor", [Right::Autopatrol]).await;
    let runner = JobRunner::new(corpus.clone(), authority);

    let quiet = attribution().with_bot_edit(true).with_announce(false);
    runner
        .run(Job::edit(doc.clone(), Rule::literal("foo", "bar"), [], quiet))
        .await;

    let flags = corpus.revisions(doc.id).await[0].flags;
    assert!(flags.minor && flags.bot && flags.patrolled && flags.suppress_recent_changes);
}

#[tokio::test]
async fn test_move_strips_prefix_with_redirect_and_watch() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus
        .insert_text(NamespaceId::MAIN, "Draft_Report", "body")
        .await
        .unwrap();
    let runner = JobRunner::new(corpus.clone(), authority().await);

    let options = MoveOptions {
        create_redirect: true,
        watch: true,
    };
    let job = Job::rename(doc.clone(), Rule::literal("Draft_", ""), options, attribution());
    let outcome = runner.run(job).await;

    assert_eq!(outcome.state, JobState::Committed);
    assert_eq!(outcome.new_title.as_deref(), Some("Report"));
    assert_eq!(corpus.load(doc.id).await.unwrap().unwrap().title, "Report");
    assert!(corpus.document_by_title(NamespaceId::MAIN, "Draft_Report").await.is_some());
    assert!(
        corpus
            .watchlist(&ActorId::new("Editor"))
            .await
            .contains(&(NamespaceId::MAIN, "Report".to_string()))
    );
}

#[tokio::test]
async fn test_move_onto_existing_title_conflicts() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus
        .insert_text(NamespaceId::MAIN, "Draft_Report", "body")
        .await
        .unwrap();
    corpus.insert_text(NamespaceId::MAIN, "Report", "taken").await.unwrap();
    let runner = JobRunner::new(corpus.clone(), authority().await);

    let job = Job::rename(doc, Rule::literal("Draft_", ""), MoveOptions::default(), attribution());
    let outcome = runner.run(job).await;
    assert_eq!(outcome.state, JobState::Failed);
    let err = outcome.error.unwrap();
    assert!(matches!(err, JobError::MoveConflict { .. }));
    assert!(err.is_unprocessable());
    assert!(corpus.renames().await.is_empty());
}

#[tokio::test]
async fn test_move_to_illegal_title_is_invalid() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus.insert_text(NamespaceId::MAIN, "Draft", "body").await.unwrap();
    let runner = JobRunner::new(corpus, authority().await);

    let job = Job::rename(doc, Rule::literal("Draft", ""), MoveOptions::default(), attribution());
    let outcome = runner.run(job).await;
    assert!(matches!(outcome.error, Some(JobError::InvalidTitle { .. })));
}

#[tokio::test]
async fn test_move_without_move_right_conflicts() {
    let corpus = Arc::new(MemoryCorpus::new());
    let doc = corpus.insert_text(NamespaceId::MAIN, "Old", "body").await.unwrap();
    let authority = authority().await;
    authority.revoke(&ActorId::new("Editor"), Right::Move).await;
    let runner = JobRunner::new(corpus, authority);

    let job = Job::rename(doc, Rule::literal("Old", "New"), MoveOptions::default(), attribution());
    let outcome = runner.run(job).await;
    assert!(matches!(outcome.error, Some(JobError::MoveConflict { .. })));
}

/// Store that fails the first `failures` saves with a transient error.
struct FlakyStore {
    inner: MemoryCorpus,
    failures: u32,
    saves: AtomicU32,
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn load(&self, id: DocumentId) -> bulkedit_core::Result<Option<Document>> {
        self.inner.load(id).await
    }

    async fn lookup(
        &self,
        namespace: NamespaceId,
        title: &str,
    ) -> bulkedit_core::Result<Option<DocumentRef>> {
        self.inner.lookup(namespace, title).await
    }

    async fn save_revision(&self, edit: RevisionEdit) -> bulkedit_core::Result<RevisionId> {
        if self.saves.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(StorageError::Transient("primary unavailable".into()).into());
        }
        self.inner.save_revision(edit).await
    }

    async fn rename(&self, request: RenameRequest) -> bulkedit_core::Result<()> {
        self.inner.rename(request).await
    }

    async fn watch(
        &self,
        actor: &ActorId,
        namespace: NamespaceId,
        title: &str,
    ) -> bulkedit_core::Result<()> {
        self.inner.watch(actor, namespace, title).await
    }
}

async fn flaky(failures: u32) -> (Arc<FlakyStore>, DocumentRef) {
    let inner = MemoryCorpus::new();
    let doc = inner.insert_text(NamespaceId::MAIN, "Page", "foo").await.unwrap();
    let store = FlakyStore {
        inner,
        failures,
        saves: AtomicU32::new(0),
    };
    (Arc::new(store), doc)
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let (store, doc) = flaky(1).await;
    let runner = JobRunner::new(store.clone(), authority().await).with_config(quick_retries());

    let outcome = runner
        .run(Job::edit(doc.clone(), Rule::literal("foo", "bar"), [], attribution()))
        .await;
    assert_eq!(outcome.state, JobState::Committed);
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.history.iter().any(|c| c.to == JobState::Pending));
}

#[tokio::test]
async fn test_persistent_transient_errors_become_fatal() {
    let (store, doc) = flaky(u32::MAX).await;
    let runner = JobRunner::new(store.clone(), authority().await).with_config(quick_retries());

    let outcome = runner
        .run(Job::edit(doc.clone(), Rule::literal("foo", "bar"), [], attribution()))
        .await;
    assert_eq!(outcome.state, JobState::Failed);
    match outcome.error {
        Some(JobError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("unexpected outcome: {other:?}"),
    }
    let stored = store.inner.load(doc.id).await.unwrap().unwrap();
    assert_eq!(stored.slot(&Role::main()).unwrap().text, "foo");
}
