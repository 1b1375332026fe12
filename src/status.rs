use anyhow::Result;
use std::path::Path;

use crate::vcs::VcsBackend;

/// Snapshot of one working copy relative to a base branch. Always computed
/// fresh from the backend, never stored.
#[derive(Debug, Default, Clone)]
pub struct RepoStatus {
    pub branch: String,
    pub changed_count: usize,
    pub ahead: u32,
    pub behind: u32,
    pub exists: bool,
}

/// Compute the status tuple for the working copy at `path`.
///
/// Ahead/behind is measured against `repo_path` (the origin repository),
/// not against `path` itself: a worktree shares history with its origin, so
/// the origin is where the comparison is meaningful even when `path` is the
/// worktree. Ahead/behind failures (base branch not comparable, say)
/// degrade to zero — the counts are supplementary here, and the one caller
/// that needs them as a correctness gate recomputes them itself.
pub fn repo_status(
    backend: &dyn VcsBackend,
    path: &Path,
    repo_path: &Path,
    base_branch: &str,
) -> Result<RepoStatus> {
    let branch = backend.current_branch(path)?;
    let changed_count = backend.changed_count(path)?;
    let (ahead, behind) = backend
        .ahead_behind(repo_path, base_branch, &branch)
        .unwrap_or((0, 0));

    Ok(RepoStatus {
        branch,
        changed_count,
        ahead,
        behind,
        exists: true,
    })
}
