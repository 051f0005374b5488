//! Commit history access.
//!
//! [`GitCommitSource`] is stateless — it opens the repository fresh for each
//! call. This avoids stale-index issues and keeps the type `Send + Sync`
//! without holding a `git2::Repository` (which is not `Sync`) across awaits.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;

use rn_core::types::{ChangeSet, Commit};

use crate::error::GitError;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read-only view of a repository's history.
///
/// All listing methods return commits newest-first, matching the order the
/// pipeline processes them in.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Commits strictly after `cursor`, newest first, at most `limit`.
    ///
    /// `None` means no position has been recorded yet and the whole reachable
    /// history qualifies. A cursor that does not name a known commit is an
    /// error — the caller decides whether to treat that as fatal.
    async fn list_since(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Commit>, GitError>;

    /// The changes introduced by one commit, relative to its first parent.
    async fn changes(&self, id: &str) -> Result<ChangeSet, GitError>;

    /// Commits in `(start, end]`, newest first, at most `limit`.
    ///
    /// `end = None` means the current head; `start = None` extends the range
    /// back through history (bounded by `limit`). `start` must be an ancestor
    /// of `end` or the range is rejected.
    async fn list_range(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Commit>, GitError>;
}

// ---------------------------------------------------------------------------
// libgit2 implementation
// ---------------------------------------------------------------------------

/// History reader backed by libgit2.
pub struct GitCommitSource {
    repo_path: PathBuf,
}

impl GitCommitSource {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Check whether a path lies inside a git repository.
    pub fn is_repo(path: &Path) -> bool {
        git2::Repository::discover(path).is_ok()
    }

    fn open(&self) -> Result<git2::Repository, GitError> {
        git2::Repository::discover(&self.repo_path).map_err(GitError::from)
    }

    fn resolve_commit_id(repo: &git2::Repository, rev: &str) -> Result<git2::Oid, GitError> {
        let obj = repo
            .revparse_single(rev)
            .map_err(|_| GitError::NotFound(rev.to_string()))?;
        let commit = obj
            .peel_to_commit()
            .map_err(|_| GitError::NotFound(rev.to_string()))?;
        Ok(commit.id())
    }

    fn collect(
        repo: &git2::Repository,
        revwalk: git2::Revwalk<'_>,
        limit: usize,
    ) -> Result<Vec<Commit>, GitError> {
        let mut commits = Vec::new();
        for oid in revwalk.take(limit) {
            let commit = repo.find_commit(oid?)?;
            commits.push(to_commit(&commit));
        }
        Ok(commits)
    }
}

fn to_commit(commit: &git2::Commit<'_>) -> Commit {
    let author = commit.author();
    let secs = commit.time().seconds();
    Commit {
        id: commit.id().to_string(),
        message: commit.message().unwrap_or("").to_string(),
        author: author.name().unwrap_or("").to_string(),
        author_email: author.email().unwrap_or("").to_string(),
        timestamp: DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH),
    }
}

/// True for error codes that just mean "no commits yet".
fn is_empty_history(e: &git2::Error) -> bool {
    matches!(
        e.code(),
        git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
    )
}

#[async_trait]
impl CommitSource for GitCommitSource {
    async fn list_since(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Commit>, GitError> {
        let repo = self.open()?;
        let mut revwalk = repo.revwalk()?;

        match revwalk.push_head() {
            Ok(()) => {}
            Err(e) if is_empty_history(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }
        revwalk.set_sorting(git2::Sort::TIME | git2::Sort::TOPOLOGICAL)?;

        if let Some(rev) = cursor {
            let oid = Self::resolve_commit_id(&repo, rev)?;
            revwalk.hide(oid)?;
        }

        Self::collect(&repo, revwalk, limit)
    }

    async fn changes(&self, id: &str) -> Result<ChangeSet, GitError> {
        let repo = self.open()?;
        let oid = Self::resolve_commit_id(&repo, id)?;
        let commit = repo.find_commit(oid)?;

        let new_tree = commit.tree()?;
        // Root commits diff against the empty tree.
        let old_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };

        let diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                files.push(path.to_string_lossy().to_string());
            }
        }

        let mut patch = String::new();
        let mut insertions = 0usize;
        let mut deletions = 0usize;
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            match line.origin() {
                '+' => {
                    insertions += 1;
                    patch.push('+');
                }
                '-' => {
                    deletions += 1;
                    patch.push('-');
                }
                ' ' => patch.push(' '),
                // File and hunk headers carry their own prefix in content().
                _ => {}
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;

        let mut changes = ChangeSet::new(patch, files);
        changes.insertions = insertions;
        changes.deletions = deletions;
        Ok(changes)
    }

    async fn list_range(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Commit>, GitError> {
        let repo = self.open()?;
        let mut revwalk = repo.revwalk()?;

        let end_oid = match end {
            Some(rev) => {
                let oid = Self::resolve_commit_id(&repo, rev)?;
                revwalk.push(oid)?;
                Some(oid)
            }
            None => {
                match revwalk.push_head() {
                    Ok(()) => {}
                    Err(e) if is_empty_history(&e) => return Ok(Vec::new()),
                    Err(e) => return Err(e.into()),
                }
                repo.head().ok().and_then(|h| h.target())
            }
        };
        revwalk.set_sorting(git2::Sort::TIME | git2::Sort::TOPOLOGICAL)?;

        if let Some(rev) = start {
            let start_oid = Self::resolve_commit_id(&repo, rev)?;
            if let Some(end_oid) = end_oid {
                if start_oid != end_oid && !repo.graph_descendant_of(end_oid, start_oid)? {
                    return Err(GitError::InvalidRange(format!(
                        "{rev} is not an ancestor of {}",
                        end.unwrap_or("HEAD")
                    )));
                }
            }
            revwalk.hide(start_oid)?;
        }

        Self::collect(&repo, revwalk, limit)
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Scripted [`CommitSource`] for tests.
///
/// Each `list_since` call consumes the next queued batch; once the queue runs
/// dry the source reports no new commits, which is how tests let a monitoring
/// loop go idle. Change sets are served per commit id, with a meaningful
/// default for ids the test did not configure.
pub struct MockCommitSource {
    batches: Mutex<VecDeque<Result<Vec<Commit>, GitError>>>,
    changes: Mutex<HashMap<String, Result<ChangeSet, GitError>>>,
    range: Mutex<Option<Result<Vec<Commit>, GitError>>>,
    since_calls: Mutex<Vec<Option<String>>>,
    change_calls: Mutex<Vec<String>>,
}

impl MockCommitSource {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            changes: Mutex::new(HashMap::new()),
            range: Mutex::new(None),
            since_calls: Mutex::new(Vec::new()),
            change_calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a batch for the next `list_since` call.
    pub fn with_batch(self, commits: Vec<Commit>) -> Self {
        self.batches.lock().unwrap().push_back(Ok(commits));
        self
    }

    /// Queue an error for the next `list_since` call.
    pub fn with_batch_error(self, error: GitError) -> Self {
        self.batches.lock().unwrap().push_back(Err(error));
        self
    }

    /// Serve a specific change set for one commit id.
    pub fn with_changes(self, id: impl Into<String>, changes: ChangeSet) -> Self {
        self.changes.lock().unwrap().insert(id.into(), Ok(changes));
        self
    }

    /// Fail the `changes` call for one commit id.
    pub fn with_changes_error(self, id: impl Into<String>, error: GitError) -> Self {
        self.changes.lock().unwrap().insert(id.into(), Err(error));
        self
    }

    /// Fix the result of `list_range`.
    pub fn with_range(self, commits: Vec<Commit>) -> Self {
        *self.range.lock().unwrap() = Some(Ok(commits));
        self
    }

    /// Cursor arguments seen by `list_since`, in call order.
    pub fn since_calls(&self) -> Vec<Option<String>> {
        self.since_calls.lock().unwrap().clone()
    }

    /// Commit ids seen by `changes`, in call order.
    pub fn change_calls(&self) -> Vec<String> {
        self.change_calls.lock().unwrap().clone()
    }
}

impl Default for MockCommitSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommitSource for MockCommitSource {
    async fn list_since(
        &self,
        cursor: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<Commit>, GitError> {
        self.since_calls
            .lock()
            .unwrap()
            .push(cursor.map(str::to_string));
        match self.batches.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }

    async fn changes(&self, id: &str) -> Result<ChangeSet, GitError> {
        self.change_calls.lock().unwrap().push(id.to_string());
        match self.changes.lock().unwrap().get(id) {
            Some(result) => result.clone(),
            None => {
                let mut changes =
                    ChangeSet::new("+fn main() {}\n", vec!["src/main.rs".to_string()]);
                changes.insertions = 1;
                Ok(changes)
            }
        }
    }

    async fn list_range(
        &self,
        _start: Option<&str>,
        _end: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<Commit>, GitError> {
        match self.range.lock().unwrap().clone() {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Fresh repository in a temp dir.
    fn scratch_repo() -> (tempfile::TempDir, git2::Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    /// Write a file, stage it, and commit. Returns the full commit id.
    fn commit_file(repo: &git2::Repository, name: &str, contents: &str, message: &str) -> String {
        let workdir = repo.workdir().unwrap();
        fs::write(workdir.join(name), contents).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = git2::Signature::now("Dev", "dev@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn list_since_without_cursor_walks_full_history_newest_first() {
        let (dir, repo) = scratch_repo();
        commit_file(&repo, "a.txt", "one", "first commit");
        commit_file(&repo, "b.txt", "two", "second commit");
        let c3 = commit_file(&repo, "c.txt", "three", "third commit");

        let source = GitCommitSource::new(dir.path());
        let commits = source.list_since(None, 10).await.unwrap();

        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].id, c3);
        assert_eq!(commits[0].message.trim(), "third commit");
        assert_eq!(commits[2].message.trim(), "first commit");
        assert_eq!(commits[0].author, "Dev");
        assert_eq!(commits[0].author_email, "dev@example.com");
    }

    #[tokio::test]
    async fn list_since_returns_only_commits_after_cursor() {
        let (dir, repo) = scratch_repo();
        let c1 = commit_file(&repo, "a.txt", "one", "first commit");
        let c2 = commit_file(&repo, "b.txt", "two", "second commit");
        let c3 = commit_file(&repo, "c.txt", "three", "third commit");

        let source = GitCommitSource::new(dir.path());

        let commits = source.list_since(Some(&c1), 10).await.unwrap();
        assert_eq!(
            commits.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
            vec![c3.clone(), c2]
        );

        // Cursor at the tip: nothing new.
        let commits = source.list_since(Some(&c3), 10).await.unwrap();
        assert!(commits.is_empty());
    }

    #[tokio::test]
    async fn list_since_honors_limit_keeping_newest() {
        let (dir, repo) = scratch_repo();
        commit_file(&repo, "a.txt", "one", "first commit");
        let c2 = commit_file(&repo, "b.txt", "two", "second commit");
        let c3 = commit_file(&repo, "c.txt", "three", "third commit");

        let source = GitCommitSource::new(dir.path());
        let commits = source.list_since(None, 2).await.unwrap();

        assert_eq!(
            commits.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
            vec![c3, c2]
        );
    }

    #[tokio::test]
    async fn list_since_with_unknown_cursor_is_not_found() {
        let (dir, repo) = scratch_repo();
        commit_file(&repo, "a.txt", "one", "first commit");

        let source = GitCommitSource::new(dir.path());
        let err = source
            .list_since(Some("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"), 10)
            .await
            .unwrap_err();

        assert!(matches!(err, GitError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_since_on_empty_repo_returns_nothing() {
        let (dir, _repo) = scratch_repo();
        let source = GitCommitSource::new(dir.path());
        let commits = source.list_since(None, 10).await.unwrap();
        assert!(commits.is_empty());
    }

    #[tokio::test]
    async fn changes_reports_patch_files_and_counts() {
        let (dir, repo) = scratch_repo();
        commit_file(&repo, "a.txt", "one\n", "first commit");
        let c2 = commit_file(&repo, "a.txt", "one\ntwo\nthree\n", "grow the file");

        let source = GitCommitSource::new(dir.path());
        let changes = source.changes(&c2).await.unwrap();

        assert_eq!(changes.files, vec!["a.txt".to_string()]);
        assert_eq!(changes.insertions, 2);
        assert_eq!(changes.deletions, 0);
        assert!(changes.diff.contains("+two"));
        assert!(changes.diff.contains("+three"));
        assert!(changes.is_meaningful());
    }

    #[tokio::test]
    async fn changes_for_root_commit_diff_against_empty_tree() {
        let (dir, repo) = scratch_repo();
        let c1 = commit_file(&repo, "a.txt", "hello\n", "first commit");

        let source = GitCommitSource::new(dir.path());
        let changes = source.changes(&c1).await.unwrap();

        assert_eq!(changes.files, vec!["a.txt".to_string()]);
        assert_eq!(changes.insertions, 1);
        assert!(changes.diff.contains("+hello"));
    }

    #[tokio::test]
    async fn changes_for_unknown_commit_is_not_found() {
        let (dir, repo) = scratch_repo();
        commit_file(&repo, "a.txt", "one", "first commit");

        let source = GitCommitSource::new(dir.path());
        let err = source
            .changes("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef")
            .await
            .unwrap_err();

        assert!(matches!(err, GitError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_range_excludes_start_includes_end() {
        let (dir, repo) = scratch_repo();
        let c1 = commit_file(&repo, "a.txt", "one", "first commit");
        let c2 = commit_file(&repo, "b.txt", "two", "second commit");
        let c3 = commit_file(&repo, "c.txt", "three", "third commit");

        let source = GitCommitSource::new(dir.path());

        let commits = source.list_range(Some(&c1), Some(&c3), 10).await.unwrap();
        assert_eq!(
            commits.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
            vec![c3, c2.clone()]
        );

        // Open start: everything up to and including end.
        let commits = source.list_range(None, Some(&c2), 10).await.unwrap();
        assert_eq!(
            commits.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
            vec![c2, c1]
        );
    }

    #[tokio::test]
    async fn list_range_rejects_reversed_bounds() {
        let (dir, repo) = scratch_repo();
        let c1 = commit_file(&repo, "a.txt", "one", "first commit");
        commit_file(&repo, "b.txt", "two", "second commit");
        let c3 = commit_file(&repo, "c.txt", "three", "third commit");

        let source = GitCommitSource::new(dir.path());
        let err = source
            .list_range(Some(&c3), Some(&c1), 10)
            .await
            .unwrap_err();

        assert!(matches!(err, GitError::InvalidRange(_)));
    }

    #[tokio::test]
    async fn list_range_without_bounds_returns_recent_commits() {
        let (dir, repo) = scratch_repo();
        commit_file(&repo, "a.txt", "one", "first commit");
        let c2 = commit_file(&repo, "b.txt", "two", "second commit");
        let c3 = commit_file(&repo, "c.txt", "three", "third commit");

        let source = GitCommitSource::new(dir.path());
        let commits = source.list_range(None, None, 2).await.unwrap();

        assert_eq!(
            commits.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
            vec![c3, c2]
        );
    }

    #[tokio::test]
    async fn is_repo_detects_git_directories() {
        let (dir, _repo) = scratch_repo();
        assert!(GitCommitSource::is_repo(dir.path()));

        let plain = tempfile::tempdir().unwrap();
        assert!(!GitCommitSource::is_repo(plain.path()));
    }

    #[tokio::test]
    async fn mock_replays_batches_then_runs_dry() {
        let source = MockCommitSource::new()
            .with_batch(vec![Commit::new("aaa", "first")])
            .with_batch(vec![Commit::new("bbb", "second")]);

        let first = source.list_since(None, 10).await.unwrap();
        assert_eq!(first[0].id, "aaa");

        let second = source.list_since(Some("aaa"), 10).await.unwrap();
        assert_eq!(second[0].id, "bbb");

        let third = source.list_since(Some("bbb"), 10).await.unwrap();
        assert!(third.is_empty());

        assert_eq!(
            source.since_calls(),
            vec![None, Some("aaa".to_string()), Some("bbb".to_string())]
        );
    }

    #[tokio::test]
    async fn mock_serves_configured_changes_and_errors() {
        let source = MockCommitSource::new()
            .with_changes("aaa", ChangeSet::empty())
            .with_changes_error("bbb", GitError::Unavailable("index locked".into()));

        assert!(!source.changes("aaa").await.unwrap().is_meaningful());
        assert!(source.changes("bbb").await.is_err());
        // Unconfigured ids get a meaningful default.
        assert!(source.changes("ccc").await.unwrap().is_meaningful());
        assert_eq!(source.change_calls(), vec!["aaa", "bbb", "ccc"]);
    }
}
