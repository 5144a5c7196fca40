use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use git2::Oid;
use tracing::debug;

use super::repository::{FirstParentIds, Repository, Revision, WalkQuery};
use crate::core::classify::{classify, is_fork_point, Ancestry};
use crate::core::commit::{Commit, CommitKind};
use crate::error::Result;

/// Walks first-parent lines of history and classifies what it finds
pub struct HistoryWalker<'repo> {
    repo: &'repo Repository,
}

impl<'repo> HistoryWalker<'repo> {
    pub fn new(repo: &'repo Repository) -> Self {
        Self { repo }
    }

    /// Top-level records of `revision`, paginated by `skip` and `max_count`
    pub fn top_level(
        &self,
        revision: &Revision,
        paths: &[PathBuf],
        skip: usize,
        max_count: usize,
    ) -> Commits<'repo> {
        let query = WalkQuery::for_revision(revision, paths)
            .skip(skip)
            .max_count(max_count);
        debug!(start = %revision.start, skip, max_count, "top-level walk");
        Commits::new(self.repo, None, vec![Line::new(query, None)])
    }

    /// The side history hidden behind a foldable commit, one level below it.
    ///
    /// Merges and octopus merges walk each side parent down to its merge-base
    /// with the first parent. A line that rejoins history somewhere else than
    /// the first parent ends with a link row for that commit. Subtree merges
    /// have no merge-base, so the whole line of the grafted parent is walked.
    pub fn side_branch(&self, owner: &Commit) -> Result<Commits<'repo>> {
        let parents = owner.parent_ids();
        let lines = match owner.kind() {
            CommitKind::Merge | CommitKind::Octopus => {
                let mainline = parents[0];
                let mut lines = Vec::with_capacity(parents.len() - 1);
                for side in &parents[1..] {
                    let stop = self.repo.merge_base(mainline, *side)?;
                    lines.push(Line::new(WalkQuery::new(*side).hide(stop), Some(mainline)));
                }
                lines
            }
            CommitKind::Subtree => vec![Line::new(WalkQuery::new(parents[1]), None)],
            CommitKind::Initial | CommitKind::Boundary | CommitKind::Regular => Vec::new(),
        };

        debug!(owner = %owner.id(), lines = lines.len(), "side-branch walk");
        Ok(Commits::new(self.repo, Some(owner.clone()), lines).below(Some(owner.clone())))
    }
}

/// One first-parent line to walk
struct Line {
    query: WalkQuery,
    /// First parent of the merge owning the line; rejoining anywhere else is linked
    mainline: Option<Oid>,
}

impl Line {
    fn new(query: WalkQuery, mainline: Option<Oid>) -> Self {
        Self { query, mainline }
    }
}

enum Row {
    Commit(Oid),
    Link(Oid),
}

/// Lazy sequence of classified commits over one or more first-parent lines.
///
/// A commit already yielded by an earlier line is not repeated.
pub struct Commits<'repo> {
    repo: &'repo Repository,
    owner: Option<Commit>,
    pending: VecDeque<Line>,
    current: Option<FirstParentIds<'repo>>,
    mainline: Option<Oid>,
    first_above: Option<Commit>,
    above: Option<Commit>,
    seen: HashSet<Oid>,
    linked: HashSet<Oid>,
}

impl<'repo> Commits<'repo> {
    fn new(repo: &'repo Repository, owner: Option<Commit>, lines: Vec<Line>) -> Self {
        Self {
            repo,
            owner,
            pending: lines.into(),
            current: None,
            mainline: None,
            first_above: None,
            above: None,
            seen: HashSet::new(),
            linked: HashSet::new(),
        }
    }

    /// Record displayed right above the first commit of each line, used to
    /// detect fork points when a walk continues an earlier page
    pub fn below(mut self, above: Option<Commit>) -> Self {
        self.first_above = above;
        self
    }

    fn next_row(&mut self) -> Option<Result<Row>> {
        loop {
            if self.current.is_none() {
                let line = self.pending.pop_front()?;
                self.mainline = line.mainline;
                self.above = self.first_above.clone();
                match self.repo.first_parent_ids(line.query) {
                    Ok(ids) => self.current = Some(ids),
                    Err(e) => return Some(Err(e)),
                }
            }
            let Some(ids) = self.current.as_mut() else {
                continue;
            };

            match ids.next() {
                Some(Ok(id)) if !self.seen.insert(id) => continue,
                Some(item) => return Some(item.map(Row::Commit)),
                None => {
                    let link = match (ids.stopped_at(), self.mainline) {
                        (Some(target), Some(mainline)) if target != mainline => Some(target),
                        _ => None,
                    };
                    self.current = None;
                    if let Some(target) = link.filter(|target| self.linked.insert(*target)) {
                        return Some(Ok(Row::Link(target)));
                    }
                }
            }
        }
    }

    fn classified(&self, id: Oid) -> Result<Commit> {
        let raw = self.repo.raw_commit(id)?;
        classify(self.repo, raw, self.owner.as_ref())
    }

    fn commit_row(&mut self, id: Oid) -> Result<Commit> {
        let mut commit = self.classified(id)?;
        commit.set_fork_point(is_fork_point(self.repo, id, self.above.as_ref())?);
        self.above = Some(commit.clone());
        Ok(commit)
    }
}

impl Iterator for Commits<'_> {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.next_row()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };
        let commit = match row {
            Row::Commit(id) => self.commit_row(id),
            Row::Link(id) => self.classified(id).map(Commit::into_link),
        };
        Some(commit)
    }
}
