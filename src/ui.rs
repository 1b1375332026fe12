use owo_colors::OwoColorize;

use crate::status::RepoStatus;

// All human-facing reporting goes to stderr; stdout is reserved for paths
// the shell wrapper may want to cd into.

pub fn print_success(msg: &str) {
    eprintln!("  {} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("  {} {}", "⚠".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

pub fn print_info(msg: &str) {
    eprintln!("  {}", msg.blue());
}

fn changed_badge(changed_count: usize) -> String {
    if changed_count == 0 {
        format!("{}", "clean".green())
    } else {
        format!("{}", format!("{changed_count} changed").yellow())
    }
}

/// Compact `[repo: status]` cell for the list view.
pub fn format_repo_compact(repo_name: &str, status: &RepoStatus) -> String {
    if !status.exists {
        return format!("[{repo_name}: missing]");
    }
    format!("[{repo_name}: {}]", changed_badge(status.changed_count))
}

/// Full status line for one repo, printed before an apply.
pub fn print_repo_status(repo_name: &str, status: &RepoStatus, base: &str) {
    let mut line = format!(
        "  {:<16} {}  {}",
        repo_name.bold(),
        status.branch.cyan(),
        changed_badge(status.changed_count),
    );
    if status.ahead > 0 || status.behind > 0 {
        line.push_str(&format!(
            "  {}",
            format!("(↑{} ↓{} of {base})", status.ahead, status.behind).dimmed()
        ));
    }
    eprintln!("{line}");
}
