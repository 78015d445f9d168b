//! Process-wide configuration surface: plugin search paths and registry
//! cache behavior, overridable from a TOML file or environment variables
//! (spec §4.8/§4.9 Registry configuration).

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PLUGIN_PATH: &str = "CORESTREAM_PLUGIN_PATH";
const ENV_REGISTRY_CACHE: &str = "CORESTREAM_REGISTRY_CACHE";
const ENV_DISABLE_REGISTRY_CACHE: &str = "CORESTREAM_DISABLE_REGISTRY_CACHE";
const ENV_DISABLE_REGISTRY_UPDATE: &str = "CORESTREAM_DISABLE_REGISTRY_UPDATE";
const ENV_DISABLE_REGISTRY_CACHE_WRITES: &str = "CORESTREAM_DISABLE_REGISTRY_CACHE_WRITES";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub plugin_search_path: Vec<PathBuf>,

    #[serde(default = "default_registry_cache")]
    pub registry_cache: PathBuf,

    /// Never read or write the on-disk registry cache; re-scan every run.
    #[serde(default)]
    pub disable_registry_cache: bool,

    /// Skip the forked-process feature scan used to isolate a crashing
    /// plugin load from the main process (spec §9 "dynamic plugin
    /// discovery" is out of scope for the core, but the flag survives as
    /// ambient configuration a registry built on top of it would read).
    #[serde(default)]
    pub disable_forked_scanning: bool,

    #[serde(default)]
    pub disable_registry_cache_writes: bool,
}

fn default_registry_cache() -> PathBuf {
    PathBuf::from(".corestream-registry.bin")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugin_search_path: Vec::new(),
            registry_cache: default_registry_cache(),
            disable_registry_cache: false,
            disable_forked_scanning: false,
            disable_registry_cache_writes: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Configuration(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&contents).map_err(|e| CoreError::Configuration(e.to_string()))
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).map_err(|e| CoreError::Configuration(e.to_string()))?;
        std::fs::write(path, contents).map_err(|e| CoreError::Configuration(format!("writing {}: {e}", path.display())))
    }

    /// Layer environment variables over whatever was loaded from file,
    /// mirroring the teacher's `GST_PLUGIN_PATH`-style overrides.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var(ENV_PLUGIN_PATH) {
            self.plugin_search_path
                .extend(std::env::split_paths(&path).map(PathBuf::from));
        }
        if let Ok(cache) = std::env::var(ENV_REGISTRY_CACHE) {
            self.registry_cache = PathBuf::from(cache);
        }
        if env_flag(ENV_DISABLE_REGISTRY_CACHE) {
            self.disable_registry_cache = true;
        }
        if env_flag(ENV_DISABLE_REGISTRY_UPDATE) {
            self.disable_forked_scanning = true;
        }
        if env_flag(ENV_DISABLE_REGISTRY_CACHE_WRITES) {
            self.disable_registry_cache_writes = true;
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }
}

fn env_flag(name: &str) -> bool {
    matches!(std::env::var(name).as_deref(), Ok("1") | Ok("true") | Ok("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_search_path() {
        let config = Config::default();
        assert!(config.plugin_search_path.is_empty());
        assert!(!config.disable_registry_cache);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.plugin_search_path.push(PathBuf::from("/opt/plugins"));
        let dir = std::env::temp_dir().join(format!("corestream-config-test-{}", std::process::id()));
        config.to_file(&dir).unwrap();
        let loaded = Config::from_file(&dir).unwrap();
        assert_eq!(loaded.plugin_search_path, config.plugin_search_path);
        let _ = std::fs::remove_file(&dir);
    }
}
