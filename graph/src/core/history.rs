use std::collections::HashSet;

use git2::Oid;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use super::commit::{Commit, FoldState};
use crate::error::Result;
use crate::git_backend::{HistoryWalker, Repository};

/// The materialized, displayed sequence of commits.
///
/// Unfolded side histories sit directly below the commit owning them, one
/// level deeper. Folding removes the contiguous run of deeper records.
#[derive(Debug, Clone, Default)]
pub struct History {
    commits: Vec<Commit>,
    date_max_len: usize,
    name_max_len: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub fn get(&self, index: usize) -> Option<&Commit> {
        self.commits.get(index)
    }

    /// Records produced by the top-level walk
    pub fn top_level_count(&self) -> usize {
        self.commits.iter().filter(|c| c.level() == 0).count()
    }

    /// Records inserted by unfolding
    pub fn nested_count(&self) -> usize {
        self.len() - self.top_level_count()
    }

    /// Widest author date seen so far
    pub fn date_max_len(&self) -> usize {
        self.date_max_len
    }

    /// Widest author name seen so far
    pub fn name_max_len(&self) -> usize {
        self.name_max_len
    }

    /// Append a record from the top-level walk
    pub fn push(&mut self, commit: Commit) {
        self.measure(&commit);
        self.commits.push(commit);
    }

    pub fn is_foldable(&self, index: usize) -> bool {
        self.get(index).is_some_and(Commit::is_foldable)
    }

    pub fn is_folded(&self, index: usize) -> bool {
        self.get(index).is_some_and(Commit::is_folded)
    }

    pub fn is_unfolded(&self, index: usize) -> bool {
        self.get(index)
            .is_some_and(|c| c.fold_state() == Some(FoldState::Unfolded))
    }

    /// Whether the record belongs to an unfolded side history
    pub fn is_child(&self, index: usize) -> bool {
        self.get(index).is_some_and(|c| c.level() > 0)
    }

    /// Index of the record owning the one at `index`
    pub fn parent_index(&self, index: usize) -> Option<usize> {
        let level = self.get(index)?.level();
        if level == 0 {
            return None;
        }
        self.commits[..index].iter().rposition(|c| c.level() < level)
    }

    /// Row displaying `id` itself, never a link row pointing at it
    pub fn position(&self, id: Oid) -> Option<usize> {
        self.commits
            .iter()
            .position(|c| c.id() == id && !c.is_commit_link())
    }

    /// Expand the folded commit at `index`, returning how many rows were inserted.
    ///
    /// Anything other than a folded, foldable commit is left alone. Commits
    /// already displayed elsewhere are not inserted a second time, except as
    /// link rows.
    pub fn unfold(&mut self, repo: &Repository, index: usize) -> Result<usize> {
        let Some(owner) = self.get(index).filter(|c| c.is_folded()) else {
            return Ok(0);
        };

        let present: HashSet<Oid> = self
            .commits
            .iter()
            .filter(|c| !c.is_commit_link())
            .map(Commit::id)
            .collect();
        let mut side = Vec::new();
        for commit in HistoryWalker::new(repo).side_branch(owner)? {
            let commit = commit?;
            if !commit.is_commit_link() && present.contains(&commit.id()) {
                debug!(commit = %commit.id(), "already displayed, not inserting again");
                continue;
            }
            side.push(commit);
        }

        for commit in &side {
            self.measure(commit);
        }
        let inserted = side.len();
        self.commits.splice(index + 1..index + 1, side);
        self.commits[index].set_fold_state(FoldState::Unfolded);

        debug!(index, inserted, "unfolded");
        Ok(inserted)
    }

    /// Collapse the unfolded commit at `index`, returning how many rows were removed.
    ///
    /// Removes every following record deeper than the folding commit, which
    /// takes nested unfolded histories with it.
    pub fn fold(&mut self, index: usize) -> usize {
        if !self.is_unfolded(index) {
            return 0;
        }

        let level = self.commits[index].level();
        let start = index + 1;
        let removed = self.commits[start..]
            .iter()
            .take_while(|c| c.level() > level)
            .count();
        self.commits.drain(start..start + removed);
        self.commits[index].set_fold_state(FoldState::Folded);

        debug!(index, removed, "folded");
        removed
    }

    fn measure(&mut self, commit: &Commit) {
        self.date_max_len = self.date_max_len.max(commit.author_date().width());
        self.name_max_len = self.name_max_len.max(commit.author_name().width());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::classify;
    use crate::fixtures::TestRepo;
    use crate::git_backend::Revision;
    use pretty_assertions::assert_eq;

    fn load(repo: &Repository, revision: &Revision) -> anyhow::Result<History> {
        let mut history = History::new();
        for commit in HistoryWalker::new(repo).top_level(revision, &[], 0, 100) {
            history.push(commit?);
        }
        Ok(history)
    }

    fn subjects(history: &History) -> Vec<&str> {
        history.commits().iter().map(Commit::subject).collect()
    }

    fn levels(history: &History) -> Vec<usize> {
        history.commits().iter().map(Commit::level).collect()
    }

    /// A - B - C(merge of B and E) - F, with E branched from B
    fn simple_merge() -> anyhow::Result<(TestRepo, Oid)> {
        let repo = TestRepo::new()?;
        let a = repo.commit("A", &[])?;
        let b = repo.commit("B", &[a])?;
        let e = repo.commit("E", &[b])?;
        let c = repo.commit("C", &[b, e])?;
        let f = repo.commit("F", &[c])?;
        repo.set_head(f)?;
        Ok((repo, f))
    }

    #[test]
    fn test_unfold_then_fold_round_trip() -> anyhow::Result<()> {
        let (repo, head) = simple_merge()?;
        let git = repo.open()?;
        let mut history = load(&git, &Revision::new(head))?;
        assert_eq!(subjects(&history), vec!["F", "C", "B", "A"]);
        let before: Vec<Oid> = history.commits().iter().map(Commit::id).collect();

        assert!(history.is_foldable(1));
        assert!(history.is_folded(1));
        assert_eq!(history.unfold(&git, 1)?, 1);
        assert_eq!(subjects(&history), vec!["F", "C", "E", "B", "A"]);
        assert_eq!(levels(&history), vec![0, 0, 1, 0, 0]);
        assert!(!history.is_folded(1));
        assert_eq!(history.nested_count(), 1);

        assert_eq!(history.fold(1), 1);
        let after: Vec<Oid> = history.commits().iter().map(Commit::id).collect();
        assert_eq!(after, before);
        assert!(history.is_folded(1));

        Ok(())
    }

    #[test]
    fn test_unfold_is_noop_when_not_applicable() -> anyhow::Result<()> {
        let (repo, head) = simple_merge()?;
        let git = repo.open()?;
        let mut history = load(&git, &Revision::new(head))?;

        // regular commit
        assert_eq!(history.unfold(&git, 0)?, 0);
        // stale index
        assert_eq!(history.unfold(&git, 42)?, 0);
        assert_eq!(history.fold(42), 0);
        // already unfolded
        assert_eq!(history.unfold(&git, 1)?, 1);
        assert_eq!(history.unfold(&git, 1)?, 0);
        assert_eq!(history.len(), 5);
        // folding a folded commit
        assert_eq!(history.fold(1), 1);
        assert_eq!(history.fold(1), 0);

        Ok(())
    }

    #[test]
    fn test_nested_unfold_and_outer_fold() -> anyhow::Result<()> {
        let repo = TestRepo::new()?;
        let a = repo.commit("A", &[])?;
        let b = repo.commit("B", &[a])?;
        let s1 = repo.commit("S1", &[b])?;
        let t = repo.commit("T", &[b])?;
        let s2 = repo.commit("S2", &[s1, t])?;
        let s3 = repo.commit("S3", &[s2])?;
        let d = repo.commit("D", &[b])?;
        let c = repo.commit("C", &[d, s3])?;

        let git = repo.open()?;
        let mut history = load(&git, &Revision::new(c))?;
        assert_eq!(subjects(&history), vec!["C", "D", "B", "A"]);

        // S1 rejoins at B rather than at D
        assert_eq!(history.unfold(&git, 0)?, 4);
        assert_eq!(subjects(&history), vec!["C", "S3", "S2", "S1", "B", "D", "B", "A"]);
        assert!(history.is_foldable(2));

        assert_eq!(history.unfold(&git, 2)?, 2);
        assert_eq!(
            subjects(&history),
            vec!["C", "S3", "S2", "T", "B", "S1", "B", "D", "B", "A"]
        );
        assert_eq!(levels(&history), vec![0, 1, 1, 2, 2, 1, 1, 0, 0, 0]);
        assert_eq!(history.parent_index(3), Some(2));
        assert_eq!(history.parent_index(5), Some(0));
        assert_eq!(history.parent_index(7), None);
        assert!(history.is_child(3));
        assert!(!history.is_child(7));

        assert_eq!(history.fold(2), 2);
        assert_eq!(subjects(&history), vec!["C", "S3", "S2", "S1", "B", "D", "B", "A"]);

        assert_eq!(history.unfold(&git, 2)?, 2);
        assert_eq!(history.fold(0), 6);
        assert_eq!(subjects(&history), vec!["C", "D", "B", "A"]);

        Ok(())
    }

    #[test]
    fn test_link_row_stands_in_for_displayed_commit() -> anyhow::Result<()> {
        let repo = TestRepo::new()?;
        let a = repo.commit("A", &[])?;
        let b = repo.commit("B", &[a])?;
        let e1 = repo.commit("E1", &[b])?;
        let e2 = repo.commit("E2", &[e1])?;
        let d = repo.commit("D", &[b])?;
        let c = repo.commit("C", &[d, e2])?;

        let git = repo.open()?;
        let mut history = load(&git, &Revision::new(c))?;
        let before: Vec<Oid> = history.commits().iter().map(Commit::id).collect();

        // B is already displayed, yet the link row is inserted
        assert_eq!(history.unfold(&git, 0)?, 3);
        assert_eq!(subjects(&history), vec!["C", "E2", "E1", "B", "D", "B", "A"]);
        assert!(history.get(3).is_some_and(Commit::is_commit_link));
        assert!(!history.is_foldable(3));
        assert_eq!(history.position(b), Some(5));

        assert_eq!(history.fold(0), 3);
        let after: Vec<Oid> = history.commits().iter().map(Commit::id).collect();
        assert_eq!(after, before);

        Ok(())
    }

    #[test]
    fn test_sibling_folds_are_independent() -> anyhow::Result<()> {
        let repo = TestRepo::new()?;
        let a = repo.commit("A", &[])?;
        let x = repo.commit("X", &[a])?;
        let m1 = repo.commit("M1", &[a, x])?;
        let y = repo.commit("Y", &[m1])?;
        let m2 = repo.commit("M2", &[m1, y])?;

        let git = repo.open()?;
        let mut history = load(&git, &Revision::new(m2))?;
        assert_eq!(subjects(&history), vec!["M2", "M1", "A"]);

        assert_eq!(history.unfold(&git, 1)?, 1);
        assert_eq!(history.unfold(&git, 0)?, 1);
        assert_eq!(subjects(&history), vec!["M2", "Y", "M1", "X", "A"]);

        assert_eq!(history.fold(0), 1);
        assert_eq!(subjects(&history), vec!["M2", "M1", "X", "A"]);
        assert!(history.is_unfolded(1));

        Ok(())
    }

    #[test]
    fn test_merge_of_displayed_ancestor_inserts_nothing() -> anyhow::Result<()> {
        let repo = TestRepo::new()?;
        let a = repo.commit("A", &[])?;
        let x = repo.commit("X", &[])?;
        let s1 = repo.commit("S1", &[a, x])?;
        let s2 = repo.commit("S2", &[s1, x])?;

        let git = repo.open()?;
        let mut history = load(&git, &Revision::new(s2))?;
        assert_eq!(subjects(&history), vec!["S2", "S1", "A"]);

        assert_eq!(history.unfold(&git, 1)?, 1);
        assert_eq!(subjects(&history), vec!["S2", "S1", "X", "A"]);
        // X is already an ancestor of S1, so S2 hides nothing
        assert_eq!(history.unfold(&git, 0)?, 0);
        assert!(history.is_unfolded(0));
        assert_eq!(history.fold(0), 0);

        Ok(())
    }

    #[test]
    fn test_column_aggregates() -> anyhow::Result<()> {
        let repo = TestRepo::new()?;
        let a = repo.commit_as("Al", "A", &[])?;
        let side = repo.commit_as("Bartholomew", "side", &[a])?;
        let b = repo.commit_as("Al", "B", &[a])?;
        let m = repo.commit_as("Al", "Merge", &[b, side])?;

        let git = repo.open()?;
        let mut history = load(&git, &Revision::new(m))?;
        assert_eq!(history.name_max_len(), 2);
        assert!(history.date_max_len() > 0);

        history.unfold(&git, 0)?;
        assert_eq!(history.name_max_len(), "Bartholomew".len());

        let top = git.raw_commit(m).and_then(|raw| classify(&git, raw, None))?;
        assert_eq!(history.position(top.id()), Some(0));

        Ok(())
    }
}
