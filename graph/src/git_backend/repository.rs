use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use git2::{DiffOptions, ErrorCode, Oid, ReferenceType, RevparseMode};
use tracing::{debug, warn};

use crate::core::classify::Ancestry;
use crate::core::commit::{RawCommit, Signature};
use crate::error::{HistoryError, Result};

/// Read-only access to a git repository
pub struct Repository {
    git_repo: git2::Repository,
    labels: HashMap<Oid, Vec<String>>,
    head: Option<Oid>,
}

/// A resolved revision expression: walk from `start`, hiding everything reachable from `hide`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub start: Oid,
    pub hide: Option<Oid>,
}

impl Revision {
    pub fn new(start: Oid) -> Self {
        Self { start, hide: None }
    }
}

/// Parameters of a first-parent walk
#[derive(Debug, Clone)]
pub struct WalkQuery {
    pub start: Oid,
    /// Exclusive stop: this commit and its ancestors are not yielded
    pub hide: Option<Oid>,
    /// Only commits touching one of these paths are yielded; empty means all
    pub paths: Vec<PathBuf>,
    pub skip: usize,
    pub max_count: Option<usize>,
}

impl WalkQuery {
    pub fn new(start: Oid) -> Self {
        Self {
            start,
            hide: None,
            paths: Vec::new(),
            skip: 0,
            max_count: None,
        }
    }

    pub fn for_revision(revision: &Revision, paths: &[PathBuf]) -> Self {
        Self {
            start: revision.start,
            hide: revision.hide,
            paths: paths.to_vec(),
            skip: 0,
            max_count: None,
        }
    }

    pub fn hide(mut self, hide: Option<Oid>) -> Self {
        self.hide = hide;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }
}

impl Repository {
    /// Open the repository containing `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let git_repo = git2::Repository::discover(path.as_ref())?;
        let labels = collect_labels(&git_repo)?;
        let head = git_repo.head().ok().and_then(|head| head.target());
        debug!(path = %path.as_ref().display(), refs = labels.len(), "opened repository");

        Ok(Self { git_repo, labels, head })
    }

    /// Working directory, or the git directory of a bare repository
    pub fn working_dir(&self) -> &Path {
        self.git_repo.workdir().unwrap_or_else(|| self.git_repo.path())
    }

    /// Short name of the checked out branch
    pub fn head_name(&self) -> Option<String> {
        let head = self.git_repo.head().ok()?;
        head.shorthand().map(str::to_string)
    }

    /// Resolve a revision expression such as `HEAD`, `main~2` or `v1.0..main`
    pub fn resolve(&self, rev: &str) -> Result<Revision> {
        let not_found = || HistoryError::RevisionNotFound(rev.to_string());
        let spec = self.git_repo.revparse(rev).map_err(|_| not_found())?;

        if spec.mode().contains(RevparseMode::MERGE_BASE) {
            return Err(HistoryError::invalid_argument(format!(
                "symmetric difference `{}` is not supported",
                rev
            )));
        }

        if spec.mode().contains(RevparseMode::RANGE) {
            let to = spec.to().ok_or_else(not_found)?;
            let from = spec.from().ok_or_else(not_found)?;
            let start = to.peel_to_commit().map_err(|_| not_found())?.id();
            let hide = from.peel_to_commit().map_err(|_| not_found())?.id();
            return Ok(Revision { start, hide: Some(hide) });
        }

        let object = spec.from().ok_or_else(not_found)?;
        let start = object.peel_to_commit().map_err(|_| not_found())?.id();
        Ok(Revision::new(start))
    }

    /// Fail with `PathNotFound` for a path neither in the work tree nor at the revision
    pub fn check_paths(&self, revision: &Revision, paths: &[PathBuf]) -> Result<()> {
        let tree = self.git_repo.find_commit(revision.start)?.tree()?;
        let workdir = self.git_repo.workdir();

        for path in paths {
            let in_workdir = workdir.map(|dir| dir.join(path).exists()).unwrap_or(false);
            if !in_workdir && tree.get_path(path).is_err() {
                return Err(HistoryError::PathNotFound(path.clone()));
            }
        }
        Ok(())
    }

    /// Metadata of a single commit
    pub fn raw_commit(&self, id: Oid) -> Result<RawCommit> {
        let commit = self
            .git_repo
            .find_commit(id)
            .map_err(|_| HistoryError::CommitUnresolvable(id))?;

        let author = to_signature(&commit.author());
        let committer = to_signature(&commit.committer());
        Ok(RawCommit {
            id,
            parent_ids: commit.parent_ids().collect(),
            author,
            committer,
            subject: commit.summary().unwrap_or("").to_string(),
            body: commit.body().unwrap_or("").trim_end().to_string(),
            branch_labels: self.labels.get(&id).cloned().unwrap_or_default(),
            is_head: self.head == Some(id),
        })
    }

    /// Lazy first-parent walk.
    ///
    /// Follows parent 0 commit by commit, so a commit whose parent is missing
    /// is still yielded and ends the line.
    pub fn first_parent_ids(&self, query: WalkQuery) -> Result<FirstParentIds<'_>> {
        Ok(FirstParentIds {
            git_repo: &self.git_repo,
            start: query.start,
            next: Some(query.start),
            hide: query.hide,
            stopped_at: None,
            paths: query.paths,
            to_skip: query.skip,
            remaining: query.max_count,
        })
    }

    /// Number of first-parent commits of `revision` touching `paths`
    pub fn history_length(&self, revision: &Revision, paths: &[PathBuf]) -> Result<usize> {
        self.first_parent_ids(WalkQuery::for_revision(revision, paths))?
            .try_fold(0, |count, id| id.map(|_| count + 1))
    }
}

impl Ancestry for Repository {
    fn resolves(&self, id: Oid) -> bool {
        self.git_repo.find_commit(id).is_ok()
    }

    fn merge_base(&self, first: Oid, second: Oid) -> Result<Option<Oid>> {
        match self.git_repo.merge_base(first, second) {
            Ok(base) => Ok(Some(base)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        match self.git_repo.graph_descendant_of(descendant, ancestor) {
            Ok(is_ancestor) => Ok(is_ancestor),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Commit ids along a first-parent line, see [`Repository::first_parent_ids`]
pub struct FirstParentIds<'repo> {
    git_repo: &'repo git2::Repository,
    start: Oid,
    next: Option<Oid>,
    hide: Option<Oid>,
    stopped_at: Option<Oid>,
    paths: Vec<PathBuf>,
    to_skip: usize,
    remaining: Option<usize>,
}

impl FirstParentIds<'_> {
    /// The hidden commit the line ran into after yielding at least one commit
    pub fn stopped_at(&self) -> Option<Oid> {
        self.stopped_at
    }

    fn is_hidden(&self, id: Oid) -> Result<bool> {
        let Some(hide) = self.hide else {
            return Ok(false);
        };
        if id == hide {
            return Ok(true);
        }
        match self.git_repo.graph_descendant_of(hide, id) {
            Ok(hidden) => Ok(hidden),
            // ancestry reaching past a shallow edge cannot be decided
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(commit = %id, error = %e, "ancestry unknown, not hidden");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn touches_paths(&self, commit: &git2::Commit<'_>) -> Result<bool> {
        if self.paths.is_empty() {
            return Ok(true);
        }

        let tree = commit.tree()?;
        let parent_tree = commit.parent(0).ok().and_then(|parent| parent.tree().ok());

        let mut opts = DiffOptions::new();
        for path in &self.paths {
            opts.pathspec(path.as_path());
        }
        let diff = self
            .git_repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
        Ok(diff.deltas().len() > 0)
    }

    fn step(&mut self) -> Result<Option<Oid>> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }
            let Some(id) = self.next.take() else {
                return Ok(None);
            };

            if self.is_hidden(id)? {
                if id != self.start {
                    self.stopped_at = Some(id);
                }
                return Ok(None);
            }

            let commit = match self.git_repo.find_commit(id) {
                Ok(commit) => commit,
                Err(e) if e.code() == ErrorCode::NotFound => {
                    warn!(commit = %id, "history ends at a missing commit");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            self.next = commit.parent_id(0).ok();

            if !self.touches_paths(&commit)? {
                continue;
            }
            if self.to_skip > 0 {
                self.to_skip -= 1;
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Ok(Some(id));
        }
    }
}

impl Iterator for FirstParentIds<'_> {
    type Item = Result<Oid>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(id) => id.map(Ok),
            Err(e) => {
                self.next = None;
                Some(Err(e))
            }
        }
    }
}

fn to_signature(signature: &git2::Signature<'_>) -> Signature {
    Signature {
        name: signature.name().unwrap_or("Unknown").to_string(),
        email: signature.email().unwrap_or("").to_string(),
        time: Utc
            .timestamp_opt(signature.when().seconds(), 0)
            .single()
            .unwrap_or_default(),
    }
}

/// Branch, remote and tag names grouped by the commit they point to
fn collect_labels(git_repo: &git2::Repository) -> Result<HashMap<Oid, Vec<String>>> {
    let mut labels: HashMap<Oid, Vec<String>> = HashMap::new();

    for reference in git_repo.references()? {
        let reference = reference?;
        if reference.kind() != Some(ReferenceType::Direct) || reference.is_note() {
            continue;
        }
        let Some(name) = reference.shorthand().map(str::to_string) else {
            continue;
        };
        if name == "stash" {
            continue;
        }
        if let Ok(commit) = reference.peel_to_commit() {
            labels.entry(commit.id()).or_default().push(name);
        }
    }

    for names in labels.values_mut() {
        names.sort();
    }
    Ok(labels)
}
