use std::path::PathBuf;
use anyhow::{anyhow, Result};
use directories::{BaseDirs, ProjectDirs};

/// File name of the user registry inside the config directory.
pub const REGISTRY_FILE_NAME: &str = "tools.toml";

pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("org", "toolbelt", "toolbelt")
        .ok_or_else(|| anyhow!("Could not get project directories"))?;
    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Where a registry file is picked up when `--registry` is not given.
pub fn default_registry_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(REGISTRY_FILE_NAME))
}

/// Helix looks for its runtime files in `~/.config/helix/runtime`.
pub fn helix_runtime_dir() -> Result<PathBuf> {
    let base = BaseDirs::new()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(base.home_dir().join(".config").join("helix").join("runtime"))
}
