use git2::Oid;
use tracing::warn;

use super::commit::{Commit, CommitKind, RawCommit};
use crate::error::Result;

/// Ancestry lookups needed to classify a commit
pub trait Ancestry {
    /// Whether the commit object is available locally
    fn resolves(&self, id: Oid) -> bool;

    /// Nearest common ancestor of two commits, `None` for unrelated histories
    fn merge_base(&self, first: Oid, second: Oid) -> Result<Option<Oid>>;

    /// Whether `ancestor` is reachable from `descendant`; a commit is its own ancestor
    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool>;
}

/// Classify a raw commit and place it below `parent`.
///
/// `parent` is the record that owns the new one in the displayed history:
/// `None` for the top-level walk, otherwise the foldable commit being
/// unfolded.
pub fn classify<A: Ancestry + ?Sized>(
    ancestry: &A,
    raw: RawCommit,
    parent: Option<&Commit>,
) -> Result<Commit> {
    let kind = kind_of(ancestry, &raw)?;
    Ok(Commit::new(raw, kind, level_below(parent)))
}

pub fn kind_of<A: Ancestry + ?Sized>(ancestry: &A, raw: &RawCommit) -> Result<CommitKind> {
    let parents = &raw.parent_ids;
    if parents.is_empty() {
        return Ok(CommitKind::Initial);
    }

    if let Some(missing) = parents.iter().find(|id| !ancestry.resolves(**id)) {
        warn!(commit = %raw.id, parent = %missing, "parent not available, treating as boundary");
        return Ok(CommitKind::Boundary);
    }

    let kind = match parents.len() {
        1 => CommitKind::Regular,
        2 => match ancestry.merge_base(parents[0], parents[1])? {
            Some(_) => CommitKind::Merge,
            None => CommitKind::Subtree,
        },
        _ => CommitKind::Octopus,
    };
    Ok(kind)
}

/// Whether a side history forks off at `id`.
///
/// `above` is the record displayed right above `id` on the same line. The fork
/// shows when `above` is a merge whose second parent is not `id` itself but
/// descends from it.
pub fn is_fork_point<A: Ancestry + ?Sized>(
    ancestry: &A,
    id: Oid,
    above: Option<&Commit>,
) -> Result<bool> {
    let Some(side) = above.and_then(|above| above.parent_ids().get(1).copied()) else {
        return Ok(false);
    };
    if side == id {
        return Ok(false);
    }
    ancestry.is_ancestor(id, side)
}

/// Nesting level for a record placed below `parent`
pub fn level_below(parent: Option<&Commit>) -> usize {
    match parent {
        None => 0,
        Some(parent) if parent.is_foldable() => parent.level() + 1,
        Some(parent) => parent.level(),
    }
}
