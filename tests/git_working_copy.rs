//! Drives real git working copies built from a local repository.

use async_trait::async_trait;
use git2::{Commit, IndexAddOption, Oid, Repository, Signature};
use snyk_history_scanner::crawler::GitOperations;
use snyk_history_scanner::models::{RepositoryTag, ScannedProjectRecord, TagMapping};
use snyk_history_scanner::orchestrator::{ScanRequest, ScanService, VersionControl, WorkingCopy};
use snyk_history_scanner::{HistoryScanOrchestrator, Result, RunRequest};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn commit_all(repo: &Repository, message: &str) -> Oid {
    let mut index = repo.index().unwrap();
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Release Bot", "release-bot@example.com").unwrap();

    let parents: Vec<Commit> = repo
        .head()
        .ok()
        .and_then(|h| h.peel_to_commit().ok())
        .into_iter()
        .collect();
    let parent_refs: Vec<&Commit> = parents.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap()
}

/// A repository with `v1.0` and `v2.0` tags; `b.txt` only exists in 2.0.
fn source_repo(dir: &Path) -> (Oid, Oid) {
    let repo = Repository::init(dir).unwrap();
    fs::write(dir.join(".gitignore"), "build/\n").unwrap();
    fs::write(dir.join("a.txt"), "one").unwrap();
    let first = commit_all(&repo, "release 1.0");
    repo.tag_lightweight("v1.0", &repo.find_object(first, None).unwrap(), false)
        .unwrap();

    fs::write(dir.join("a.txt"), "two").unwrap();
    fs::write(dir.join("b.txt"), "new in two").unwrap();
    let second = commit_all(&repo, "release 2.0");
    repo.tag_lightweight("v2.0", &repo.find_object(second, None).unwrap(), false)
        .unwrap();

    (first, second)
}

fn url(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn default_refspecs() -> Vec<String> {
    vec![
        "+refs/tags/*:refs/tags/*".to_string(),
        "+refs/pull/*:refs/remotes/origin/pull/*".to_string(),
    ]
}

#[test]
fn test_checkout_moves_tree_between_tags() {
    let source = tempfile::tempdir().unwrap();
    let (first, second) = source_repo(source.path());

    let dest = tempfile::tempdir().unwrap();
    let tree = dest.path().join("widget");
    let mut copy = GitOperations::new()
        .with_depth(0)
        .clone_repo(&url(source.path()), &tree)
        .unwrap();

    copy.fetch_refs(&default_refspecs()).unwrap();
    assert_eq!(copy.resolve_revision("v1.0").unwrap(), first.to_string());
    assert_eq!(copy.resolve_revision(&second.to_string()).unwrap(), second.to_string());
    assert!(copy.resolve_revision("v9.9").is_err());

    copy.checkout(&first.to_string()).unwrap();
    assert_eq!(fs::read_to_string(tree.join("a.txt")).unwrap(), "one");
    assert!(!tree.join("b.txt").exists());
    assert_eq!(copy.head_sha().unwrap(), first.to_string());

    copy.checkout(&second.to_string()).unwrap();
    assert_eq!(fs::read_to_string(tree.join("a.txt")).unwrap(), "two");
    assert!(tree.join("b.txt").exists());
}

#[test]
fn test_clean_removes_untracked_and_ignored_files() {
    let source = tempfile::tempdir().unwrap();
    let (first, _) = source_repo(source.path());

    let dest = tempfile::tempdir().unwrap();
    let tree = dest.path().join("widget");
    let mut copy = GitOperations::new()
        .with_depth(0)
        .clone_repo(&url(source.path()), &tree)
        .unwrap();
    copy.checkout(&first.to_string()).unwrap();

    fs::write(tree.join("snyk-debug.log"), "x").unwrap();
    fs::create_dir_all(tree.join("build/classes")).unwrap();
    fs::write(tree.join("build/classes/Main.class"), "x").unwrap();
    fs::create_dir_all(tree.join("restored/deps")).unwrap();
    fs::write(tree.join("restored/deps/lib.dll"), "x").unwrap();

    copy.clean().unwrap();

    assert!(!tree.join("snyk-debug.log").exists());
    assert!(!tree.join("build").exists());
    assert!(!tree.join("restored").exists());
    assert!(tree.join("a.txt").exists());
    assert!(tree.join(".gitignore").exists());
    assert!(tree.join(".git").exists());
}

#[test]
fn test_clone_of_missing_repository_fails() {
    let dest = tempfile::tempdir().unwrap();
    let missing = dest.path().join("does-not-exist");

    let result = GitOperations::new().clone_repo(&url(&missing), &dest.path().join("widget"));
    assert!(matches!(result, Err(snyk_history_scanner::ScannerError::Clone(_))));
}

/// Records what each scan saw, then leaves output behind.
#[derive(Default)]
struct RecordingScanner {
    seen: Mutex<Vec<(String, String, bool)>>,
    workspace: Mutex<Option<PathBuf>>,
}

#[async_trait]
impl ScanService for RecordingScanner {
    async fn scan(&self, dir: &Path, request: &ScanRequest<'_>) -> Result<()> {
        let contents = fs::read_to_string(dir.join("a.txt"))?;
        let stale_output = dir.join("snyk-output.json").exists();
        fs::write(dir.join("snyk-output.json"), request.target_reference)?;

        self.seen
            .lock()
            .unwrap()
            .push((request.target_reference.to_string(), contents, stale_output));
        *self.workspace.lock().unwrap() = dir.parent().map(Path::to_path_buf);
        Ok(())
    }
}

#[tokio::test]
async fn test_orchestrator_scans_each_tag_from_a_clean_tree() {
    let source = tempfile::tempdir().unwrap();
    let (first, second) = source_repo(source.path());

    let mapping = TagMapping::new(vec![
        (
            ScannedProjectRecord::new("widget@2.0", "p-2"),
            RepositoryTag::new("v2.0", second.to_string()),
        ),
        (
            ScannedProjectRecord::new("widget@1.0", "p-1"),
            RepositoryTag::new("v1.0", first.to_string()),
        ),
    ]);

    let scanner = RecordingScanner::default();
    let orchestrator = HistoryScanOrchestrator::new(GitOperations::new().with_depth(0), scanner)
        .with_fetch_refspecs(default_refspecs());

    let source_url = url(source.path());
    let request = RunRequest {
        product_name: "widget",
        org: "acme",
        repo_url: &source_url,
    };
    let report = orchestrator.run(&request, &mapping).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.succeeded(), 2);
}

#[tokio::test]
async fn test_orchestrator_sees_tagged_contents() {
    let source = tempfile::tempdir().unwrap();
    let (first, second) = source_repo(source.path());

    let mapping = TagMapping::new(vec![
        (
            ScannedProjectRecord::new("widget@1.0", "p-1"),
            RepositoryTag::new("v1.0", first.to_string()),
        ),
        (
            ScannedProjectRecord::new("widget@2.0", "p-2"),
            RepositoryTag::new("v2.0", second.to_string()),
        ),
    ]);

    let scanner = std::sync::Arc::new(RecordingScanner::default());
    let orchestrator = HistoryScanOrchestrator::new(GitOperations::new().with_depth(0), SharedScanner(scanner.clone()));

    let source_url = url(source.path());
    let request = RunRequest {
        product_name: "widget",
        org: "acme",
        repo_url: &source_url,
    };
    orchestrator.run(&request, &mapping).await.unwrap();

    let seen = scanner.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("v1.0".to_string(), "one".to_string(), false),
            ("v2.0".to_string(), "two".to_string(), false),
        ]
    );

    let workspace = scanner.workspace.lock().unwrap().clone().unwrap();
    assert!(!workspace.exists());
}

struct SharedScanner(std::sync::Arc<RecordingScanner>);

#[async_trait]
impl ScanService for SharedScanner {
    async fn scan(&self, dir: &Path, request: &ScanRequest<'_>) -> Result<()> {
        self.0.scan(dir, request).await
    }
}
