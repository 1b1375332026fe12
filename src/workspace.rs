use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{Config, Profile};
use crate::status::{self, RepoStatus};
use crate::ui;
use crate::vcs::VcsBackend;

/// A workspace is identified by (profile, name); its directory is derived,
/// never stored.
pub fn workspace_path(cfg: &Config, profile_name: &str, name: &str) -> PathBuf {
    cfg.base_dir.join(profile_name).join(name)
}

/// Create a workspace: one worktree per repo, all on a branch named after
/// the workspace.
///
/// Creation is not transactional across the profile, but the failure state
/// is bounded: if any worktree fails, everything built so far is torn down
/// and the original error is returned. A workspace either fully exists or
/// does not exist.
pub fn create_workspace(
    backend: &dyn VcsBackend,
    cfg: &Config,
    profile: &Profile,
    profile_name: &str,
    name: &str,
    base_branches: &HashMap<String, String>,
) -> Result<PathBuf> {
    let ws_path = workspace_path(cfg, profile_name, name);
    if ws_path.exists() {
        bail!(
            "workspace '{}' already exists at {}",
            name,
            ws_path.display()
        );
    }
    fs::create_dir_all(&ws_path)
        .with_context(|| format!("could not create workspace directory {}", ws_path.display()))?;

    eprintln!("creating workspace {profile_name}/{name}...");

    for repo in &profile.repos {
        let base = base_branches
            .get(&repo.name)
            .map(String::as_str)
            .unwrap_or_else(|| repo.default_base());
        let worktree_path = ws_path.join(&repo.name);

        if let Err(err) = backend.worktree_add(&repo.path, &worktree_path, name, base) {
            cleanup_workspace(backend, profile, &ws_path);
            return Err(err)
                .with_context(|| format!("could not create worktree for {}", repo.name));
        }
        ui::print_success(&format!("{}  {} → {}", repo.name, base, name));
    }

    run_post_create_hooks(profile, &ws_path);

    eprintln!("workspace ready: {}", ws_path.display());
    Ok(ws_path)
}

/// Hooks are advisory: a failing hook is a warning, never a rollback.
fn run_post_create_hooks(profile: &Profile, ws_path: &Path) {
    if profile.hooks.post_create.is_empty() {
        return;
    }
    ui::print_info("running post_create hooks...");
    for hook in &profile.hooks.post_create {
        let hook_dir = ws_path.join(&hook.repo);
        if !hook_dir.exists() {
            ui::print_warning(&format!(
                "skipping hook for {}: directory not found",
                hook.repo
            ));
            continue;
        }

        match Command::new("sh")
            .arg("-c")
            .arg(&hook.run)
            .current_dir(&hook_dir)
            .output()
        {
            Ok(out) => {
                // Hook output goes to stderr; stdout stays machine-readable.
                let _ = std::io::stderr().write_all(&out.stdout);
                let _ = std::io::stderr().write_all(&out.stderr);
                if !out.status.success() {
                    ui::print_warning(&format!("hook failed for {} ({})", hook.repo, hook.run));
                }
            }
            Err(err) => {
                ui::print_warning(&format!(
                    "hook failed for {} ({}): {err}",
                    hook.repo, hook.run
                ));
            }
        }
    }
}

/// Remove a workspace's worktrees, optionally its branches, then its
/// directory.
///
/// Unlike creation there is no rollback here: repos are processed
/// independently and a failure on one is reported without blocking the
/// rest. Re-running is the recovery path.
pub fn remove_workspace(
    backend: &dyn VcsBackend,
    cfg: &Config,
    profile: &Profile,
    profile_name: &str,
    name: &str,
    delete_branch: bool,
    force: bool,
) -> Result<()> {
    let ws_path = workspace_path(cfg, profile_name, name);
    if !ws_path.exists() {
        bail!("workspace '{}' not found at {}", name, ws_path.display());
    }

    if !force {
        for repo in &profile.repos {
            let worktree_path = ws_path.join(&repo.name);
            if !worktree_path.exists() {
                continue;
            }
            let Ok(count) = backend.changed_count(&worktree_path) else {
                continue;
            };
            if count > 0 {
                bail!(
                    "{} has uncommitted changes ({} files); use --force to remove anyway",
                    repo.name,
                    count
                );
            }
        }
    }

    eprintln!("removing workspace {profile_name}/{name}...");

    for repo in &profile.repos {
        let worktree_path = ws_path.join(&repo.name);
        if !worktree_path.exists() {
            continue;
        }

        if let Err(err) = backend.worktree_remove(&repo.path, &worktree_path, force) {
            ui::print_error(&format!("{}: worktree removal failed: {err:#}", repo.name));
            continue;
        }

        let mut msg = "worktree removed";
        if delete_branch {
            // The worktree is already gone; a branch that won't delete is a
            // warning, not a reason to stop.
            if let Err(err) = backend.branch_delete(&repo.path, name, force) {
                ui::print_warning(&format!("{}: branch deletion failed: {err:#}", repo.name));
            } else {
                msg = "worktree removed, branch deleted";
            }
        }
        ui::print_success(&format!("{}  {}", repo.name, msg));
    }

    fs::remove_dir_all(&ws_path)
        .with_context(|| format!("could not remove workspace directory {}", ws_path.display()))?;
    Ok(())
}

/// Best-effort teardown of a partially created workspace. Backend errors
/// are swallowed; the original creation error is what the caller reports.
fn cleanup_workspace(backend: &dyn VcsBackend, profile: &Profile, ws_path: &Path) {
    for repo in &profile.repos {
        let worktree_path = ws_path.join(&repo.name);
        if worktree_path.exists() {
            let _ = backend.worktree_remove(&repo.path, &worktree_path, true);
        }
    }
    let _ = fs::remove_dir_all(ws_path);
}

#[derive(Debug)]
pub struct WorkspaceInfo {
    pub profile_name: String,
    pub workspace_name: String,
    pub path: PathBuf,
    pub repo_statuses: Vec<(String, RepoStatus)>,
}

/// Scan the base directory for workspaces, with a per-repo status snapshot
/// for each. `profile_filter` restricts the scan to one profile.
pub fn list_workspaces(
    backend: &dyn VcsBackend,
    cfg: &Config,
    profile_filter: Option<&str>,
) -> Result<Vec<WorkspaceInfo>> {
    if let Some(name) = profile_filter
        && !cfg.profiles.contains_key(name)
    {
        bail!("profile '{}' not found in config", name);
    }

    let mut workspaces = Vec::new();

    for (profile_name, profile) in &cfg.profiles {
        if let Some(filter) = profile_filter
            && filter != profile_name
        {
            continue;
        }

        let profile_dir = cfg.base_dir.join(profile_name);
        let entries = match fs::read_dir(&profile_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("could not read {}", profile_dir.display()));
            }
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let workspace_name = entry.file_name().to_string_lossy().to_string();

            let mut repo_statuses = Vec::new();
            for repo in &profile.repos {
                let worktree_path = path.join(&repo.name);
                if !worktree_path.exists() {
                    repo_statuses.push((repo.name.clone(), RepoStatus::default()));
                    continue;
                }
                let st = status::repo_status(backend, &worktree_path, &repo.path, repo.default_base())
                    .unwrap_or(RepoStatus {
                        exists: true,
                        ..RepoStatus::default()
                    });
                repo_statuses.push((repo.name.clone(), st));
            }

            workspaces.push(WorkspaceInfo {
                profile_name: profile_name.clone(),
                workspace_name,
                path,
                repo_statuses,
            });
        }
    }

    workspaces.sort_by(|a, b| {
        (&a.profile_name, &a.workspace_name).cmp(&(&b.profile_name, &b.workspace_name))
    });
    Ok(workspaces)
}

pub fn print_workspaces(workspaces: &[WorkspaceInfo]) {
    if workspaces.is_empty() {
        eprintln!("no workspaces found");
        return;
    }
    let mut last_profile: Option<&str> = None;
    for ws in workspaces {
        if last_profile != Some(ws.profile_name.as_str()) {
            eprintln!("\n{}:", ws.profile_name);
            last_profile = Some(&ws.profile_name);
        }
        let cells: Vec<String> = ws
            .repo_statuses
            .iter()
            .map(|(name, st)| ui::format_repo_compact(name, st))
            .collect();
        eprintln!("  {:<20} {}", ws.workspace_name, cells.join("  "));
    }
}
