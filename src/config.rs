use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A command to run in one repo's worktree after workspace creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    pub repo: String,
    pub run: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default)]
    pub post_create: Vec<Hook>,
}

/// A single git repository within a profile. Loaded once, read-only after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub name: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_base: Option<String>,
}

impl Repo {
    /// Base branch new worktrees start from when the caller doesn't pick one.
    pub fn default_base(&self) -> &str {
        self.default_base.as_deref().unwrap_or("main")
    }
}

/// A named set of repositories developed together, sharing one hook list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub repos: Vec<Repo>,
    #[serde(default)]
    pub hooks: Hooks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_dir: PathBuf,
    #[serde(default)]
    pub default_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

/// Replace the home directory prefix with `~` for portable storage.
pub fn collapse_path(path: &Path) -> PathBuf {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = path.strip_prefix(&home)
    {
        return PathBuf::from("~").join(rest);
    }
    path.to_path_buf()
}

pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".config/canopy/config.json"))
}

impl Config {
    /// A fresh configuration with no profiles, used by `init`.
    pub fn starter() -> Config {
        Config {
            base_dir: PathBuf::from("~/canopy-workspaces"),
            default_profile: String::new(),
            profiles: BTreeMap::new(),
        }
    }

    pub fn load() -> Result<Config> {
        let path = config_path()?;
        let data = fs::read_to_string(&path).with_context(|| {
            format!(
                "could not read {} (run 'canopy init' to create one)",
                path.display()
            )
        })?;
        let mut cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("could not parse {}", path.display()))?;

        cfg.base_dir = expand_path(&cfg.base_dir);
        for profile in cfg.profiles.values_mut() {
            for repo in &mut profile.repos {
                repo.path = expand_path(&repo.path);
            }
        }
        Ok(cfg)
    }

    pub fn save(&self) -> Result<()> {
        let path = config_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("could not create {}", dir.display()))?;
        }

        // Collapse paths back to ~/ form so the file survives a home move.
        let mut portable = self.clone();
        portable.base_dir = collapse_path(&portable.base_dir);
        for profile in portable.profiles.values_mut() {
            for repo in &mut profile.repos {
                repo.path = collapse_path(&repo.path);
            }
        }

        let data = serde_json::to_string_pretty(&portable)?;
        fs::write(&path, data).with_context(|| format!("could not write {}", path.display()))?;
        Ok(())
    }

    /// Resolve a profile by name, or the configured default when `name` is
    /// `None`.
    pub fn get_profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a Profile, &'a str)> {
        let name = match name {
            Some(n) => n,
            None if !self.default_profile.is_empty() => self.default_profile.as_str(),
            None => bail!("no profile given and no default_profile set in config"),
        };
        let Some(profile) = self.profiles.get(name) else {
            bail!("profile '{}' not found in config", name);
        };
        Ok((profile, name))
    }
}
