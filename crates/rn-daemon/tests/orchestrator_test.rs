//! Integration tests for the monitoring orchestrator and manual range mode.
//!
//! Covers batch processing over a newest-first source, cursor advancement
//! and the hold-on-failure policy, per-commit failure isolation, the
//! no-meaningful-change short circuit, delivery failures, and manual-mode
//! cursor isolation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use rn_core::config::{CursorPolicy, MonitorConfig};
use rn_core::cursor::CursorStore;
use rn_core::document::DocumentStore;
use rn_core::gate::KeywordGate;
use rn_core::types::{ChangeSet, Commit, Note, NoteKind};
use rn_daemon::manual::{ManualOutcome, ManualRun};
use rn_daemon::orchestrator::{BatchSummary, Orchestrator, OrchestratorError};
use rn_git::{GitError, MockCommitSource};
use rn_llm::{GeneratorError, MockGenerator};
use rn_notify::{MockSink, NotifyError, PublishContext};

// ===========================================================================
// Helpers
// ===========================================================================

fn commit(id: &str, message: &str) -> Commit {
    Commit {
        id: id.to_string(),
        message: message.to_string(),
        author: "Dev".to_string(),
        author_email: "dev@example.com".to_string(),
        timestamp: Utc::now(),
    }
}

struct Harness {
    orchestrator: Orchestrator,
    source: Arc<MockCommitSource>,
    generator: Arc<MockGenerator>,
    sink: Arc<MockSink>,
    cursor_path: PathBuf,
    document_path: PathBuf,
    _dir: tempfile::TempDir,
}

fn harness(source: MockCommitSource, generator: MockGenerator) -> Harness {
    harness_with(source, generator, MockSink::new(), MonitorConfig::default())
}

fn harness_with(
    source: MockCommitSource,
    generator: MockGenerator,
    sink: MockSink,
    monitor: MonitorConfig,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cursor_path = dir.path().join(".last_commit");
    let document_path = dir.path().join("CHANGELOG.md");

    let source = Arc::new(source);
    let generator = Arc::new(generator);
    let sink = Arc::new(sink);

    let orchestrator = Orchestrator::new(
        source.clone(),
        generator.clone(),
        Some(sink.clone()),
        Arc::new(KeywordGate::default()),
        CursorStore::new(&cursor_path),
        DocumentStore::new(&document_path, false),
        monitor,
    );

    Harness {
        orchestrator,
        source,
        generator,
        sink,
        cursor_path,
        document_path,
        _dir: dir,
    }
}

fn cursor_value(h: &Harness) -> Option<String> {
    CursorStore::new(&h.cursor_path).read().unwrap()
}

fn document_text(h: &Harness) -> String {
    std::fs::read_to_string(&h.document_path).unwrap_or_default()
}

// ===========================================================================
// Continuous mode
// ===========================================================================

#[tokio::test]
async fn processes_newest_first_batch_and_advances_cursor() {
    let source = MockCommitSource::new().with_batch(vec![
        commit("c2", "Add new export feature"),
        commit("c1", "fix typo"),
    ]);
    let h = harness(source, MockGenerator::new());

    let summary = h.orchestrator.process_new_commits().await.unwrap();

    assert_eq!(summary.found, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.cursor.as_deref(), Some("c2"));
    assert_eq!(cursor_value(&h).as_deref(), Some("c2"));

    // Both commits reached the generator, newest first.
    assert_eq!(h.generator.generate_calls(), vec!["c2", "c1"]);

    // Only the commit whose message passes the gate updates the document.
    let doc = document_text(&h);
    assert!(
        doc.contains("Release notes for c2"),
        "gated commit entry missing: {doc}"
    );
    assert!(
        !doc.contains("Release notes for c1"),
        "ungated commit must not update the document: {doc}"
    );
    assert_eq!(h.generator.update_calls(), vec!["c2"]);

    // Both notes were published.
    assert_eq!(h.sink.published().len(), 2);
}

#[tokio::test]
async fn second_run_with_no_new_commits_is_a_no_op() {
    let source = MockCommitSource::new().with_batch(vec![commit("c1", "Add new parser")]);
    let h = harness(source, MockGenerator::new());

    let first = h.orchestrator.process_new_commits().await.unwrap();
    assert_eq!(first.processed, 1);

    // Queue drained: the source now reports nothing new.
    let second = h.orchestrator.process_new_commits().await.unwrap();
    assert_eq!(second, BatchSummary::empty());

    // No duplicate document entries, publishes, or cursor churn.
    assert_eq!(document_text(&h).matches("Release notes for c1").count(), 1);
    assert_eq!(h.sink.published().len(), 1);
    assert_eq!(cursor_value(&h).as_deref(), Some("c1"));

    // The second call asked only for commits after c1.
    assert_eq!(h.source.since_calls(), vec![None, Some("c1".to_string())]);
}

#[tokio::test]
async fn cursor_advances_across_batches_and_never_rewinds() {
    let source = MockCommitSource::new()
        .with_batch(vec![commit("c2", "Add feature"), commit("c1", "Add base")])
        .with_batch(vec![commit("c3", "Add follow-up")]);
    let h = harness(source, MockGenerator::new());

    h.orchestrator.process_new_commits().await.unwrap();
    assert_eq!(cursor_value(&h).as_deref(), Some("c2"));

    h.orchestrator.process_new_commits().await.unwrap();
    assert_eq!(cursor_value(&h).as_deref(), Some("c3"));

    assert_eq!(h.source.since_calls(), vec![None, Some("c2".to_string())]);
}

#[tokio::test]
async fn failed_commit_does_not_stop_the_batch() {
    let source = MockCommitSource::new().with_batch(vec![
        commit("c3", "Add metrics endpoint"),
        commit("c2", "Add retry logic"),
        commit("c1", "fix typo"),
    ]);
    // c3 gets a queued note, c2's generation fails, c1 takes the default note.
    let generator = MockGenerator::new()
        .with_note(Note::generated("- Added /metrics."))
        .with_generation_error(GeneratorError::EmptyReply);
    let h = harness(source, generator);

    let summary = h.orchestrator.process_new_commits().await.unwrap();

    assert_eq!(summary.found, 3);
    assert_eq!(summary.processed, 2, "c3 and c1 must still process");
    assert_eq!(summary.failed, 1);

    // Default policy: the cursor still advances to the batch's newest commit.
    assert_eq!(cursor_value(&h).as_deref(), Some("c3"));

    // Every commit was attempted, in order.
    assert_eq!(h.generator.generate_calls(), vec!["c3", "c2", "c1"]);

    // The failed commit was published as a clearly marked placeholder.
    let published = h.sink.published();
    assert_eq!(published.len(), 3);
    assert_eq!(published[1].0.kind, NoteKind::Fallback);
    assert!(published[1].0.text.contains("c2"));

    // The placeholder never lands in the document.
    let doc = document_text(&h);
    assert!(doc.contains("- Added /metrics."));
    assert!(
        !doc.contains("unavailable"),
        "fallback text must stay out of the document: {doc}"
    );
}

#[tokio::test]
async fn hold_on_failure_policy_keeps_the_old_cursor() {
    let source = MockCommitSource::new()
        .with_batch(vec![commit("c2", "Add feature"), commit("c1", "Add base")]);
    let generator = MockGenerator::new().with_generation_error(GeneratorError::EmptyReply);
    let monitor = MonitorConfig {
        cursor_policy: CursorPolicy::HoldOnFailure,
        ..MonitorConfig::default()
    };
    let h = harness_with(source, generator, MockSink::new(), monitor);

    let summary = h.orchestrator.process_new_commits().await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.cursor, None);
    assert_eq!(
        cursor_value(&h),
        None,
        "cursor must not advance when holding on failure"
    );
}

#[tokio::test]
async fn trivial_change_set_skips_document_and_notification() {
    let source = MockCommitSource::new()
        .with_batch(vec![commit("c1", "Add new feature flag")])
        .with_changes("c1", ChangeSet::empty());
    let h = harness(source, MockGenerator::new());

    let summary = h.orchestrator.process_new_commits().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    // Sentinel note: no document entry, no publish, but the cursor moves on.
    assert!(!h.document_path.exists());
    assert!(h.sink.published().is_empty());
    assert_eq!(cursor_value(&h).as_deref(), Some("c1"));
}

#[tokio::test]
async fn change_fetch_error_fails_only_that_commit() {
    let source = MockCommitSource::new()
        .with_batch(vec![
            commit("c2", "Add new cache"),
            commit("c1", "Add old cache"),
        ])
        .with_changes_error("c2", GitError::NotFound("c2".to_string()));
    let h = harness(source, MockGenerator::new());

    let summary = h.orchestrator.process_new_commits().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(cursor_value(&h).as_deref(), Some("c2"));
    // Only the healthy commit reached the generator.
    assert_eq!(h.generator.generate_calls(), vec!["c1"]);
}

#[tokio::test]
async fn delivery_failure_never_fails_the_commit() {
    let source = MockCommitSource::new().with_batch(vec![commit("c1", "Add exporter")]);
    let sink = MockSink::new().with_error(NotifyError::Http("connect refused".to_string()));
    let h = harness_with(source, MockGenerator::new(), sink, MonitorConfig::default());

    let summary = h.orchestrator.process_new_commits().await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(
        summary.failed, 0,
        "delivery failures must not count as commit failures"
    );
    assert_eq!(cursor_value(&h).as_deref(), Some("c1"));
    assert!(document_text(&h).contains("Release notes for c1"));
}

#[tokio::test]
async fn source_failure_surfaces_for_backoff() {
    let source =
        MockCommitSource::new().with_batch_error(GitError::Unavailable("repo locked".to_string()));
    let h = harness(source, MockGenerator::new());

    let result = h.orchestrator.process_new_commits().await;
    assert!(matches!(
        result,
        Err(OrchestratorError::Source(GitError::Unavailable(_)))
    ));
    assert_eq!(cursor_value(&h), None);
}

#[tokio::test]
async fn unusable_cursor_location_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    // A file where the cursor's parent directory should be.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "file, not dir").unwrap();

    let orchestrator = Orchestrator::new(
        Arc::new(MockCommitSource::new()),
        Arc::new(MockGenerator::new()),
        None,
        Arc::new(KeywordGate::default()),
        CursorStore::new(blocker.join(".last_commit")),
        DocumentStore::new(dir.path().join("CHANGELOG.md"), false),
        MonitorConfig::default(),
    );

    let result = orchestrator.run_continuous().await;
    assert!(matches!(result, Err(OrchestratorError::State(_))));
}

#[tokio::test]
async fn run_continuous_stops_on_shutdown_signal() {
    let h = harness(MockCommitSource::new(), MockGenerator::new());
    let shutdown = h.orchestrator.shutdown_handle();

    let handle = tokio::spawn(async move { h.orchestrator.run_continuous().await });

    // Let the first (empty) pass complete, then interrupt the interval sleep.
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
    let joined = result.expect("monitor must stop promptly after shutdown");
    joined.unwrap().unwrap();
}

// ===========================================================================
// Manual range mode
// ===========================================================================

#[tokio::test]
async fn manual_range_never_touches_the_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let cursor = CursorStore::new(dir.path().join(".last_commit"));
    cursor.write("seed").unwrap();

    let source = Arc::new(MockCommitSource::new().with_range(vec![
        commit("c2", "Add export"),
        commit("c1", "Add import"),
    ]));
    let sink = Arc::new(MockSink::new());
    let run = ManualRun::new(
        source,
        Arc::new(MockGenerator::new()),
        Some(sink.clone()),
        dir.path().join("out"),
        10,
    );

    let outcome = run.run(Some("c0"), None).await.unwrap();

    let ManualOutcome::Written { path, commits } = outcome else {
        panic!("expected a written artifact");
    };
    assert_eq!(commits, 2);
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(
        name.starts_with("release_notes_") && name.ends_with(".md"),
        "artifact name should be timestamp-qualified: {name}"
    );

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("Combined release notes for 2 commits"));
    assert!(text.contains("`c2` Add export"));

    // One publish for the whole batch.
    let published = sink.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1, PublishContext::Batch { commits: 2 });

    // The cursor is exactly as it was.
    assert_eq!(cursor.read().unwrap().as_deref(), Some("seed"));
}

#[tokio::test]
async fn manual_empty_range_is_nothing_to_do() {
    let dir = tempfile::tempdir().unwrap();
    let run = ManualRun::new(
        Arc::new(MockCommitSource::new()),
        Arc::new(MockGenerator::new()),
        None,
        dir.path(),
        10,
    );

    let outcome = run.run(None, None).await.unwrap();

    assert_eq!(outcome, ManualOutcome::NothingToDo);
    assert_eq!(
        std::fs::read_dir(dir.path()).unwrap().count(),
        0,
        "no artifact may be written for an empty range"
    );
}

#[tokio::test]
async fn manual_range_with_only_trivial_changes_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let source = MockCommitSource::new()
        .with_range(vec![commit("c1", "merge branch")])
        .with_changes("c1", ChangeSet::empty());
    let sink = Arc::new(MockSink::new());
    let run = ManualRun::new(
        Arc::new(source),
        Arc::new(MockGenerator::new()),
        Some(sink.clone()),
        dir.path(),
        10,
    );

    let outcome = run.run(None, None).await.unwrap();

    assert_eq!(outcome, ManualOutcome::NothingToDo);
    assert!(sink.published().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
