use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "canopy", about = "Multi-repo git worktree workspaces")]
pub struct Cli {
    /// Profile to operate on (defaults to default_profile from config)
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write a starter config file
    Init,
    /// Create a new workspace with one worktree per repo
    New {
        /// Workspace name (also the branch name in every repo)
        name: String,
        /// Base branch for every repo (defaults to each repo's default_base)
        #[arg(short, long)]
        base: Option<String>,
    },
    /// List workspaces with per-repo status
    List,
    /// Remove a workspace
    Rm {
        /// Workspace name
        name: String,
        /// Also delete the workspace branch in each repo
        #[arg(long)]
        with_branch: bool,
        /// Remove even with uncommitted changes
        #[arg(short, long)]
        force: bool,
    },
    /// Apply worktree changes back to the origin repositories
    Apply {
        /// Workspace name
        name: String,
        /// Apply method: stash or merge
        #[arg(short, long)]
        method: String,
        /// Base branch for the new branch (defaults to each repo's default_base)
        #[arg(short, long)]
        base: Option<String>,
        /// New branch name (defaults to apply/<workspace>)
        #[arg(long)]
        branch: Option<String>,
        /// Only apply these repos (repeatable)
        #[arg(short, long = "repo")]
        repos: Vec<String>,
    },
}
