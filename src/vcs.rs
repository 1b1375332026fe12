use anyhow::Result;
use std::path::{Path, PathBuf};

/// One record from `worktree_list` porcelain output.
#[derive(Debug, Default, Clone)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
}

/// Opaque handle to the commit object backing a stash entry.
///
/// Stash lists are local to each worktree, but the commit objects behind
/// them live in the shared object store, so a recorded id stays resolvable
/// from the origin repository even after the entry is no longer the
/// worktree's "latest". Any step that needs the stash later must hold one
/// of these instead of re-deriving `stash@{0}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashRef(String);

impl StashRef {
    pub fn new(id: impl Into<String>) -> Self {
        StashRef(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Version-control primitives the workspace and apply layers are built on.
///
/// Every operation is synchronous and either succeeds or fails with the
/// underlying tool's diagnostic wrapped in the operation name. No call is
/// retried here or anywhere above.
pub trait VcsBackend {
    fn worktree_add(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        new_branch: &str,
        base: &str,
    ) -> Result<()>;
    fn worktree_remove(&self, repo_path: &Path, worktree_path: &Path, force: bool) -> Result<()>;
    fn worktree_list(&self, repo_path: &Path) -> Result<Vec<WorktreeEntry>>;

    fn current_branch(&self, path: &Path) -> Result<String>;
    fn branch_list(&self, path: &Path) -> Result<Vec<String>>;
    fn branch_delete(&self, repo_path: &Path, branch: &str, force: bool) -> Result<()>;

    /// Porcelain status output, trimmed. Empty means a clean tree.
    fn status_porcelain(&self, path: &Path) -> Result<String>;

    /// Number of changed paths, untracked files included.
    fn changed_count(&self, path: &Path) -> Result<usize> {
        let status = self.status_porcelain(path)?;
        if status.is_empty() {
            return Ok(0);
        }
        Ok(status.lines().count())
    }

    /// Commit counts (ahead, behind) of `branch` relative to `base`.
    fn ahead_behind(&self, repo_path: &Path, base: &str, branch: &str) -> Result<(u32, u32)>;

    fn checkout(&self, path: &Path, branch: &str) -> Result<()>;
    fn checkout_new(&self, path: &Path, new_branch: &str, base: &str) -> Result<()>;

    fn merge(&self, path: &Path, branch: &str) -> Result<()>;
    fn merge_abort(&self, path: &Path) -> Result<()>;

    /// No-op success when there is nothing to stash.
    fn stash_push(&self, path: &Path, message: &str) -> Result<()>;
    /// Resolve the most recent stash entry to its commit id.
    fn stash_ref(&self, path: &Path) -> Result<StashRef>;
    fn stash_apply(&self, path: &Path, stash: &StashRef) -> Result<()>;
    fn stash_pop(&self, path: &Path) -> Result<()>;
    fn stash_drop(&self, path: &Path) -> Result<()>;
}
