mod apply;
mod cli;
mod config;
mod git;
mod status;
mod ui;
mod vcs;
mod workspace;

use std::collections::HashMap;

use anyhow::{Result, bail};
use clap::Parser;

use cli::{Cli, Commands};
use config::Config;
use git::GitBackend;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let backend = GitBackend;

    match cli.command.unwrap_or(Commands::List) {
        Commands::Init => {
            let path = config::config_path()?;
            if path.exists() {
                bail!("config already exists at {}", path.display());
            }
            Config::starter().save()?;
            eprintln!("wrote {}", path.display());
            eprintln!("add your profiles and repos there, then run 'canopy new <name>'");
            Ok(())
        }
        Commands::New { name, base } => {
            let cfg = Config::load()?;
            let (profile, profile_name) = cfg.get_profile(cli.profile.as_deref())?;

            let mut base_branches = HashMap::new();
            if let Some(base) = base {
                for repo in &profile.repos {
                    base_branches.insert(repo.name.clone(), base.clone());
                }
            }

            let ws_path = workspace::create_workspace(
                &backend,
                &cfg,
                profile,
                profile_name,
                &name,
                &base_branches,
            )?;
            // stdout: path for a shell wrapper to cd into
            println!("{}", ws_path.display());
            Ok(())
        }
        Commands::List => {
            let cfg = Config::load()?;
            let workspaces = workspace::list_workspaces(&backend, &cfg, cli.profile.as_deref())?;
            workspace::print_workspaces(&workspaces);
            Ok(())
        }
        Commands::Rm {
            name,
            with_branch,
            force,
        } => {
            let cfg = Config::load()?;
            let (profile, profile_name) = cfg.get_profile(cli.profile.as_deref())?;
            workspace::remove_workspace(
                &backend,
                &cfg,
                profile,
                profile_name,
                &name,
                with_branch,
                force,
            )
        }
        Commands::Apply {
            name,
            method,
            base,
            branch,
            repos,
        } => {
            let cfg = Config::load()?;
            let (profile, profile_name) = cfg.get_profile(cli.profile.as_deref())?;
            let opts = apply::ApplyOptions {
                strategy: method.parse()?,
                base_branch: base,
                new_branch: branch,
                repos,
            };
            apply::apply_workspace(&backend, &cfg, profile, profile_name, &name, &opts)
        }
    }
}
