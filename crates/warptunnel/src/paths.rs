use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use tunnelconfig::TunnelConfig;

pub const ENV_CONFIG: &str = "WARPTUNNEL_CONFIG";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Hyprland";
const APPLICATION: &str = "Warptunnel";
const CONFIG_FILE: &str = "warptunnel.toml";

/// A configuration file together with where it was read from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub config: TunnelConfig,
}

impl LoadedConfig {
    /// Resolves a path named in the file against the file's directory.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            return relative.to_path_buf();
        }
        self.path
            .parent()
            .map_or_else(|| relative.to_path_buf(), |dir| dir.join(relative))
    }
}

/// Loads the configuration file.
///
/// An explicit `--config` path or `$WARPTUNNEL_CONFIG` must exist; the file in
/// the user config directory is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<LoadedConfig>> {
    let (path, required) = match explicit.map(Path::to_path_buf).or_else(|| env_override(ENV_CONFIG)) {
        Some(path) => (path, true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(None),
        },
    };

    if !required && !path.exists() {
        tracing::debug!(path = %path.display(), "no configuration file found");
        return Ok(None);
    }

    let config = TunnelConfig::load(&path)
        .with_context(|| format!("failed to load configuration {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(Some(LoadedConfig { path, config }))
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    #[test]
    fn explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("missing.toml"));
    }

    #[test]
    fn explicit_path_is_loaded_and_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warptunnel.toml");
        fs::write(&path, "[render]\nshader = \"custom.wgsl\"\n").unwrap();
        let loaded = load_config(Some(&path)).unwrap().unwrap();
        let shader = loaded.config.render.shader.clone().unwrap();
        assert_eq!(loaded.resolve(&shader), dir.path().join("custom.wgsl"));
        assert_eq!(
            loaded.resolve(Path::new("/abs/tunnel.wgsl")),
            PathBuf::from("/abs/tunnel.wgsl")
        );
    }
}
