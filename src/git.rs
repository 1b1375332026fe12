use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::vcs::{StashRef, VcsBackend, WorktreeEntry};

fn run_git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .context("failed to run git - is it installed?")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
        } else if let Some(rest) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeEntry {
                path: PathBuf::from(rest),
                ..Default::default()
            });
        } else if let Some(entry) = current.as_mut() {
            if let Some(rest) = line.strip_prefix("HEAD ") {
                entry.head = rest.to_string();
            } else if let Some(rest) = line.strip_prefix("branch refs/heads/") {
                entry.branch = Some(rest.to_string());
            } else if line == "bare" {
                entry.bare = true;
            } else if line == "detached" {
                entry.detached = true;
            }
        }
    }

    // Output may not end with a blank line
    if let Some(entry) = current.take() {
        entries.push(entry);
    }

    entries
}

fn parse_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct GitBackend;

impl VcsBackend for GitBackend {
    fn worktree_add(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        new_branch: &str,
        base: &str,
    ) -> Result<()> {
        let path_str = worktree_path.to_string_lossy();
        run_git_in(
            repo_path,
            &["worktree", "add", &path_str, "-b", new_branch, base],
        )?;
        Ok(())
    }

    fn worktree_remove(&self, repo_path: &Path, worktree_path: &Path, force: bool) -> Result<()> {
        let path_str = worktree_path.to_string_lossy();
        let mut args = vec!["worktree", "remove", &*path_str];
        if force {
            args.push("--force");
        }
        run_git_in(repo_path, &args)?;
        Ok(())
    }

    fn worktree_list(&self, repo_path: &Path) -> Result<Vec<WorktreeEntry>> {
        let out = run_git_in(repo_path, &["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_list(&out))
    }

    fn current_branch(&self, path: &Path) -> Result<String> {
        let out = run_git_in(path, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn branch_list(&self, path: &Path) -> Result<Vec<String>> {
        let out = run_git_in(path, &["branch", "--list", "--format=%(refname:short)"])?;
        Ok(parse_lines(&out))
    }

    fn branch_delete(&self, repo_path: &Path, branch: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        run_git_in(repo_path, &["branch", flag, branch])?;
        Ok(())
    }

    fn status_porcelain(&self, path: &Path) -> Result<String> {
        let out = run_git_in(path, &["status", "--porcelain"])?;
        Ok(out.trim().to_string())
    }

    fn ahead_behind(&self, repo_path: &Path, base: &str, branch: &str) -> Result<(u32, u32)> {
        let range = format!("{base}...{branch}");
        let out = run_git_in(repo_path, &["rev-list", "--count", "--left-right", &range])?;

        // Left count is commits only in base (behind), right only in branch (ahead).
        let parts: Vec<&str> = out.split_whitespace().collect();
        if parts.len() != 2 {
            bail!("unexpected rev-list output: {:?}", out.trim());
        }
        let behind: u32 = parts[0]
            .parse()
            .with_context(|| format!("could not parse behind count from {:?}", parts[0]))?;
        let ahead: u32 = parts[1]
            .parse()
            .with_context(|| format!("could not parse ahead count from {:?}", parts[1]))?;
        Ok((ahead, behind))
    }

    fn checkout(&self, path: &Path, branch: &str) -> Result<()> {
        run_git_in(path, &["checkout", branch])?;
        Ok(())
    }

    fn checkout_new(&self, path: &Path, new_branch: &str, base: &str) -> Result<()> {
        run_git_in(path, &["checkout", "-b", new_branch, base])?;
        Ok(())
    }

    fn merge(&self, path: &Path, branch: &str) -> Result<()> {
        run_git_in(path, &["merge", branch])?;
        Ok(())
    }

    fn merge_abort(&self, path: &Path) -> Result<()> {
        run_git_in(path, &["merge", "--abort"])?;
        Ok(())
    }

    fn stash_push(&self, path: &Path, message: &str) -> Result<()> {
        run_git_in(path, &["stash", "push", "--include-untracked", "-m", message])?;
        Ok(())
    }

    fn stash_ref(&self, path: &Path) -> Result<StashRef> {
        let out = run_git_in(path, &["rev-parse", "refs/stash"])?;
        Ok(StashRef::new(out.trim()))
    }

    fn stash_apply(&self, path: &Path, stash: &StashRef) -> Result<()> {
        run_git_in(path, &["stash", "apply", stash.as_str()])?;
        Ok(())
    }

    fn stash_pop(&self, path: &Path) -> Result<()> {
        run_git_in(path, &["stash", "pop"])?;
        Ok(())
    }

    fn stash_drop(&self, path: &Path) -> Result<()> {
        run_git_in(path, &["stash", "drop"])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parse_worktree_list_basic() {
        let output = "\
worktree /home/user/project
HEAD abc1234567890
branch refs/heads/main

worktree /home/user/workspaces/web/feature
HEAD def4567890123
branch refs/heads/feature

";
        let entries = parse_worktree_list(output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, PathBuf::from("/home/user/project"));
        assert_eq!(entries[0].head, "abc1234567890");
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert_eq!(
            entries[1].path,
            PathBuf::from("/home/user/workspaces/web/feature")
        );
        assert_eq!(entries[1].branch.as_deref(), Some("feature"));
    }

    #[test]
    fn parse_worktree_list_keeps_bare_record() {
        let output = "\
worktree /home/user/project.git
HEAD 0000000000000000000000000000000000000000
bare

worktree /home/user/project
HEAD abc1234567890
branch refs/heads/main

";
        let entries = parse_worktree_list(output);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].bare);
        assert!(!entries[1].bare);
    }

    #[test]
    fn parse_worktree_list_detached_head() {
        let output = "\
worktree /home/user/project
HEAD abc1234567890
detached

";
        let entries = parse_worktree_list(output);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].detached);
        assert!(entries[0].branch.is_none());
    }

    #[test]
    fn parse_worktree_list_no_trailing_blank_line() {
        let output = "\
worktree /home/user/project
HEAD abc1234567890
branch refs/heads/main";
        let entries = parse_worktree_list(output);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
    }

    #[test]
    fn parse_worktree_list_empty() {
        assert!(parse_worktree_list("").is_empty());
    }

    #[test]
    fn parse_lines_skips_blanks() {
        let lines = parse_lines("main\n\n  feature  \n");
        assert_eq!(lines, vec!["main".to_string(), "feature".to_string()]);
    }

    // Integration tests below need a real git binary; each one bails out
    // quietly when the environment doesn't have it.

    fn git_ok(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn init_repo(dir: &Path) -> bool {
        git_ok(dir, &["init", "-b", "main", "."])
            && git_ok(dir, &["config", "user.email", "test@example.com"])
            && git_ok(dir, &["config", "user.name", "test"])
            && git_ok(dir, &["commit", "--allow-empty", "-m", "init"])
    }

    fn commit_file(dir: &Path, name: &str, contents: &str) -> bool {
        fs::write(dir.join(name), contents).unwrap();
        git_ok(dir, &["add", "-A"]) && git_ok(dir, &["commit", "-m", name])
    }

    #[test]
    fn integration_current_branch() {
        let dir = tempfile::tempdir().unwrap();
        if !init_repo(dir.path()) {
            return;
        }
        let branch = GitBackend.current_branch(dir.path()).unwrap();
        assert_eq!(branch, "main");
    }

    #[test]
    fn integration_worktree_add_list_remove() {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        fs::create_dir(&repo).unwrap();
        if !init_repo(&repo) {
            return;
        }

        let wt = dir.path().join("wt");
        GitBackend
            .worktree_add(&repo, &wt, "feature", "main")
            .unwrap();
        assert!(wt.is_dir());
        assert_eq!(GitBackend.current_branch(&wt).unwrap(), "feature");

        let entries = GitBackend.worktree_list(&repo).unwrap();
        assert!(
            entries
                .iter()
                .any(|e| e.branch.as_deref() == Some("feature"))
        );
        assert!(GitBackend.branch_list(&repo).unwrap().contains(&"feature".to_string()));

        GitBackend.worktree_remove(&repo, &wt, false).unwrap();
        assert!(!wt.exists());
        GitBackend.branch_delete(&repo, "feature", false).unwrap();
    }

    #[test]
    fn integration_ahead_behind() {
        let dir = tempfile::tempdir().unwrap();
        if !init_repo(dir.path()) {
            return;
        }
        GitBackend
            .checkout_new(dir.path(), "feature", "main")
            .unwrap();
        assert!(commit_file(dir.path(), "a.txt", "a"));

        let (ahead, behind) = GitBackend
            .ahead_behind(dir.path(), "main", "feature")
            .unwrap();
        assert_eq!((ahead, behind), (1, 0));

        let (ahead, behind) = GitBackend
            .ahead_behind(dir.path(), "feature", "main")
            .unwrap();
        assert_eq!((ahead, behind), (0, 1));
    }

    #[test]
    fn integration_ahead_behind_unknown_base_errors() {
        let dir = tempfile::tempdir().unwrap();
        if !init_repo(dir.path()) {
            return;
        }
        assert!(
            GitBackend
                .ahead_behind(dir.path(), "no-such-branch", "main")
                .is_err()
        );
    }

    #[test]
    fn integration_stash_push_records_untracked() {
        let dir = tempfile::tempdir().unwrap();
        if !init_repo(dir.path()) {
            return;
        }
        fs::write(dir.path().join("untracked.txt"), "scratch").unwrap();
        assert_eq!(GitBackend.changed_count(dir.path()).unwrap(), 1);

        GitBackend.stash_push(dir.path(), "test stash").unwrap();
        assert_eq!(GitBackend.changed_count(dir.path()).unwrap(), 0);

        let stash = GitBackend.stash_ref(dir.path()).unwrap();
        assert!(!stash.as_str().is_empty());

        GitBackend.stash_pop(dir.path()).unwrap();
        assert_eq!(GitBackend.changed_count(dir.path()).unwrap(), 1);
    }

    #[test]
    fn integration_stash_apply_by_ref_then_drop() {
        let dir = tempfile::tempdir().unwrap();
        if !init_repo(dir.path()) {
            return;
        }
        assert!(commit_file(dir.path(), "a.txt", "one\n"));
        fs::write(dir.path().join("a.txt"), "two\n").unwrap();

        GitBackend.stash_push(dir.path(), "apply me").unwrap();
        let stash = GitBackend.stash_ref(dir.path()).unwrap();

        GitBackend.stash_apply(dir.path(), &stash).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "two\n"
        );
        GitBackend.stash_drop(dir.path()).unwrap();
        assert!(GitBackend.stash_ref(dir.path()).is_err());
    }
}
