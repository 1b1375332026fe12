use anyhow::{Context, Result, bail};
use std::path::Path;

use crate::config::{Config, Profile};
use crate::status;
use crate::ui;
use crate::vcs::{StashRef, VcsBackend};
use crate::workspace;

/// How a worktree's work is folded back into its origin repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Carry the worktree's uncommitted changes over via a stash entry.
    Stash,
    /// Merge the worktree's committed history into the new branch.
    Merge,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Stash => "stash",
            Strategy::Merge => "merge",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stash" => Ok(Strategy::Stash),
            "merge" => Ok(Strategy::Merge),
            other => bail!("unknown apply method '{other}' (expected 'stash' or 'merge')"),
        }
    }
}

/// One apply transaction against a single repository. Ephemeral: built per
/// repo, consumed by [`run`], never stored.
pub struct Transaction<'a> {
    pub worktree_dir: &'a Path,
    pub repo_path: &'a Path,
    pub new_branch: &'a str,
    pub base_branch: &'a str,
    pub strategy: Strategy,
}

/// What the prepare step set aside before the speculative branch exists.
enum Prepared {
    /// Stash entry addressed by commit id, so later steps don't depend on
    /// the worktree-local stash list.
    Stashed(StashRef),
    /// Nothing set aside; the worktree's branch carries the work.
    Committed { worktree_branch: String },
}

/// Run one transaction through the shared ladder: prepare → create branch →
/// integrate → cleanup, with a single rollback path out of every failure
/// past preparation.
///
/// On success the origin ends on the new branch (stash) or back on its
/// original branch (merge). On failure the origin is back on its original
/// branch, the speculative branch is gone, and the worktree's change set
/// is what it was before the call.
pub fn run(backend: &dyn VcsBackend, tx: &Transaction) -> Result<()> {
    // Preconditions, all checked before any mutation.
    let origin_status = backend
        .status_porcelain(tx.repo_path)
        .context("could not check origin repository status")?;
    if !origin_status.is_empty() {
        bail!(
            "origin repository at {} has uncommitted changes; commit or stash them first",
            tx.repo_path.display()
        );
    }

    let worktree_branch = backend.current_branch(tx.worktree_dir)?;
    match tx.strategy {
        Strategy::Stash => {
            if backend.changed_count(tx.worktree_dir)? == 0 {
                bail!(
                    "worktree at {} has no uncommitted changes to stash",
                    tx.worktree_dir.display()
                );
            }
        }
        Strategy::Merge => {
            // This guard needs real counts; a lookup failure is an error
            // here, not a zero.
            let (ahead, _) =
                backend.ahead_behind(tx.repo_path, tx.base_branch, &worktree_branch)?;
            if ahead == 0 {
                bail!(
                    "worktree branch {worktree_branch} has no commits ahead of {}",
                    tx.base_branch
                );
            }
        }
    }

    // Recorded so every exit path can put the origin back where it was.
    let origin_branch = backend.current_branch(tx.repo_path)?;

    let prepared = match tx.strategy {
        Strategy::Stash => {
            backend
                .stash_push(tx.worktree_dir, &format!("canopy-apply: {}", tx.new_branch))
                .context("could not stash worktree changes")?;
            match backend.stash_ref(tx.worktree_dir) {
                Ok(stash) => Prepared::Stashed(stash),
                Err(err) => {
                    // The push succeeded; put the changes back before bailing.
                    pop_stash(backend, tx.worktree_dir);
                    return Err(err).context("could not record stash reference");
                }
            }
        }
        Strategy::Merge => Prepared::Committed { worktree_branch },
    };

    // Speculative branch. Failure here leaves the origin untouched.
    if let Err(err) = backend.checkout_new(tx.repo_path, tx.new_branch, tx.base_branch) {
        if let Prepared::Stashed(_) = &prepared {
            pop_stash(backend, tx.worktree_dir);
        }
        return Err(err).with_context(|| {
            format!(
                "could not create branch {} from {}",
                tx.new_branch, tx.base_branch
            )
        });
    }

    // Integrate: the one strategy-specific mutation of the origin.
    let integrated = match &prepared {
        Prepared::Stashed(stash) => backend.stash_apply(tx.repo_path, stash),
        Prepared::Committed { worktree_branch } => backend.merge(tx.repo_path, worktree_branch),
    };

    if let Err(err) = integrated {
        rollback(backend, tx, &prepared, &origin_branch);
        return Err(err)
            .with_context(|| format!("could not integrate changes into {}", tx.new_branch));
    }

    // Success-side cleanup.
    match &prepared {
        Prepared::Stashed(_) => {
            // The content is durable on the new branch, so the entry can
            // go. The origin deliberately stays on the new branch.
            if let Err(err) = backend.stash_drop(tx.worktree_dir) {
                ui::print_warning(&format!("could not drop stash entry in worktree: {err:#}"));
            }
        }
        Prepared::Committed { .. } => {
            // The merge outcome is already decided; failing to switch back
            // only rates a warning.
            if let Err(err) = backend.checkout(tx.repo_path, &origin_branch) {
                ui::print_warning(&format!(
                    "could not return origin to {origin_branch}: {err:#}"
                ));
            }
        }
    }

    Ok(())
}

/// Unwind a failed integrate: origin back on its recorded branch, the
/// speculative branch deleted, the worktree's changes restored. Steps that
/// themselves fail are reported as warnings next to the original error.
fn rollback(backend: &dyn VcsBackend, tx: &Transaction, prepared: &Prepared, origin_branch: &str) {
    ui::print_warning("rolling back...");
    if let Prepared::Committed { .. } = prepared {
        if let Err(err) = backend.merge_abort(tx.repo_path) {
            ui::print_warning(&format!("merge abort failed: {err:#}"));
        }
    }
    if let Err(err) = backend.checkout(tx.repo_path, origin_branch) {
        ui::print_warning(&format!(
            "could not return origin to {origin_branch}: {err:#}"
        ));
    }
    if let Err(err) = backend.branch_delete(tx.repo_path, tx.new_branch, true) {
        ui::print_warning(&format!(
            "could not delete branch {}: {err:#}",
            tx.new_branch
        ));
    }
    if let Prepared::Stashed(_) = prepared {
        pop_stash(backend, tx.worktree_dir);
    }
}

fn pop_stash(backend: &dyn VcsBackend, worktree_dir: &Path) {
    if let Err(err) = backend.stash_pop(worktree_dir) {
        ui::print_warning(&format!(
            "could not restore stashed changes in worktree: {err:#}"
        ));
    }
}

pub struct ApplyOptions {
    pub strategy: Strategy,
    pub base_branch: Option<String>,
    pub new_branch: Option<String>,
    /// Restrict to these repo names; empty means every repo in the profile.
    pub repos: Vec<String>,
}

/// Apply a workspace's worktrees back to their origin repositories, one
/// repo at a time in profile order. A failure on one repo is reported and
/// the rest still run; nothing is retried.
pub fn apply_workspace(
    backend: &dyn VcsBackend,
    cfg: &Config,
    profile: &Profile,
    profile_name: &str,
    ws_name: &str,
    opts: &ApplyOptions,
) -> Result<()> {
    let ws_path = workspace::workspace_path(cfg, profile_name, ws_name);
    if !ws_path.exists() {
        bail!("workspace '{}' not found at {}", ws_name, ws_path.display());
    }

    eprintln!("applying workspace {profile_name}/{ws_name}...");

    for repo in &profile.repos {
        if !opts.repos.is_empty() && !opts.repos.iter().any(|r| r == &repo.name) {
            continue;
        }

        let worktree_dir = ws_path.join(&repo.name);
        if !worktree_dir.exists() {
            ui::print_warning(&format!("{}: worktree not found, skipping", repo.name));
            continue;
        }

        let st = match status::repo_status(backend, &worktree_dir, &repo.path, repo.default_base())
        {
            Ok(st) => st,
            Err(err) => {
                ui::print_error(&format!("{}: could not read status: {err:#}", repo.name));
                continue;
            }
        };
        ui::print_repo_status(&repo.name, &st, repo.default_base());

        // Advisory guards; [`run`] enforces them again.
        match opts.strategy {
            Strategy::Stash if st.changed_count == 0 => {
                ui::print_warning(&format!(
                    "{}: no uncommitted changes to stash, skipping",
                    repo.name
                ));
                continue;
            }
            Strategy::Merge if st.ahead == 0 => {
                ui::print_warning(&format!("{}: no commits ahead to merge, skipping", repo.name));
                continue;
            }
            _ => {}
        }

        let base_branch = opts
            .base_branch
            .as_deref()
            .unwrap_or_else(|| repo.default_base());
        let default_branch = format!("apply/{ws_name}");
        let new_branch = opts.new_branch.as_deref().unwrap_or(&default_branch);

        let tx = Transaction {
            worktree_dir: &worktree_dir,
            repo_path: &repo.path,
            new_branch,
            base_branch,
            strategy: opts.strategy,
        };

        match run(backend, &tx) {
            Ok(()) => ui::print_success(&format!(
                "{}: applied via {} → {} (base: {})",
                repo.name,
                opts.strategy.as_str(),
                new_branch,
                base_branch
            )),
            Err(err) => ui::print_error(&format!("{}: apply failed: {err:#}", repo.name)),
        }
    }

    Ok(())
}
