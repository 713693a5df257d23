use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StreambillError};

/// Where the app keeps its records, stored as `config.toml` in the user's
/// config directory.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub data_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    /// Reads the config at `path`; a missing or invalid file yields `None`.
    pub fn load_from(path: &Path) -> Option<Config> {
        let content = fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unparseable config");
                None
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StreambillError::io(parent, e))?;
        }
        let toml_str =
            toml::to_string_pretty(self).map_err(|e| StreambillError::Config(e.to_string()))?;
        fs::write(path, toml_str).map_err(|e| StreambillError::io(path, e))
    }

    pub fn load() -> Config {
        Config::load_from(&config_path()).unwrap_or_default()
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path();
        self.save_to(&path)?;
        Ok(path)
    }
}

pub fn config_path() -> PathBuf {
    match ProjectDirs::from("com", "streambill", "streambill") {
        Some(proj_dirs) => proj_dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

fn default_data_root() -> String {
    match ProjectDirs::from("com", "streambill", "streambill") {
        Some(proj_dirs) => proj_dirs.data_dir().to_string_lossy().to_string(),
        None => "~/.streambill".to_string(),
    }
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_round_trips_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            data_root: "/srv/streambill".into(),
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), Some(config));
    }

    #[test]
    fn garbage_config_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_root = [").unwrap();
        assert_eq!(Config::load_from(&path), None);
    }

    #[test]
    fn plain_paths_are_not_expanded() {
        assert_eq!(expand_home_dir("/tmp/data"), "/tmp/data");
        if BaseDirs::new().is_some() {
            assert!(!expand_home_dir("~/data").starts_with('~'));
        }
    }
}
