//! Configuration loader with tier-based merging.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    Project = 1,
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover directories from the environment, falling back to
    /// `./task-tracker` and `~/.task-tracker`.
    pub fn discover() -> Self {
        let project_dir = std::env::var("TASK_TRACKER_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("task-tracker")));

        let user_dir = std::env::var("TASK_TRACKER_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".task-tracker")));

        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn tier_file(&self, tier: ConfigTier) -> Option<PathBuf> {
        let dir = match tier {
            ConfigTier::Project => self.project_dir.as_ref(),
            ConfigTier::User => self.user_dir.as_ref(),
            ConfigTier::Defaults | ConfigTier::Environment => None,
        }?;
        Some(dir.join(CONFIG_FILE))
    }
}

/// Loads and merges configuration tiers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load from an explicit file when given (or named by
    /// `TASK_TRACKER_CONFIG_PATH`), otherwise merge all tiers.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("TASK_TRACKER_CONFIG_PATH").map(PathBuf::from));

        match explicit {
            Some(path) => Self::load_file(path),
            None => Self::load_with_paths(ConfigPaths::discover()),
        }
    }

    /// Load a single file; tiers and environment overrides are skipped.
    pub fn load_file(path: PathBuf) -> Result<Self> {
        let config = Config::load(&path)
            .with_context(|| format!("failed to load config file {}", path.display()))?;
        Ok(Self {
            config,
            sources: vec![path],
        })
    }

    /// Merge defaults, project and user files, then environment overrides.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        let mut tiers: Vec<Value> = vec![serde_json::to_value(Config::default())?];
        let mut sources = Vec::new();

        for tier in [ConfigTier::Project, ConfigTier::User] {
            let Some(file) = paths.tier_file(tier) else {
                continue;
            };
            if !file.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {} config {}", tier, file.display()))?;
            let value: Value = serde_yaml::from_str(&content)
                .with_context(|| format!("invalid YAML in {} config {}", tier, file.display()))?;
            debug!(tier = %tier, path = %file.display(), "Loaded config tier");
            tiers.push(value);
            sources.push(file);
        }

        let merged = deep_merge_all(tiers);
        let mut config: Config =
            serde_json::from_value(merged).context("merged configuration is invalid")?;

        apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

        Ok(Self {
            config,
            sources,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

/// Apply `TASK_TRACKER_*` overrides, reading variables through `lookup`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db_path) = lookup("TASK_TRACKER_DB_PATH") {
        config.store.db_path = PathBuf::from(db_path);
    }

    if let Some(bind) = lookup("TASK_TRACKER_BIND") {
        config.server.bind = bind;
    }

    if let Some(port) = lookup("TASK_TRACKER_PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("TASK_TRACKER_PORT is not a port number: {}", port))?;
    }

    if let Some(backend) = lookup("TASK_TRACKER_STORE") {
        config.store.backend = backend.parse()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn write(dir: &Path, content: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn missing_files_yield_defaults() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::with_dirs(
            Some(temp.path().join("project")),
            Some(temp.path().join("user")),
        );

        let loader = ConfigLoader::load_with_paths(paths).unwrap();
        assert!(loader.sources().is_empty());
        assert_eq!(loader.config().server.port, 5000);
    }

    #[test]
    fn project_overrides_defaults_field_by_field() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("task-tracker");
        write(&project, "server:\n  port: 8080\n");

        let paths = ConfigPaths::with_dirs(Some(project), Some(temp.path().join("user")));
        let config = ConfigLoader::load_with_paths(paths).unwrap().into_config();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn user_overrides_project() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("task-tracker");
        let user = temp.path().join("user");
        write(&project, "server:\n  port: 8080\n  bind: 0.0.0.0\n");
        write(&user, "server:\n  port: 9090\nstore:\n  backend: memory\n");

        let loader = ConfigLoader::load_with_paths(ConfigPaths::with_dirs(
            Some(project.clone()),
            Some(user.clone()),
        ))
        .unwrap();
        let config = loader.config();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(
            loader.sources(),
            &[project.join(CONFIG_FILE), user.join(CONFIG_FILE)]
        );
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("task-tracker");
        write(&project, "server: [unclosed\n");

        let paths = ConfigPaths::with_dirs(Some(project), None);
        assert!(ConfigLoader::load_with_paths(paths).is_err());
    }

    #[test]
    fn explicit_file_skips_tiers() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("custom.yaml");
        std::fs::write(&file, "auth:\n  mode: header\n  user_header: x-forwarded-user\n").unwrap();

        let config = ConfigLoader::load(Some(&file)).unwrap().into_config();
        assert_eq!(config.auth.user_header, "x-forwarded-user");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn env_overrides_apply_last() {
        let vars: HashMap<&str, &str> = [
            ("TASK_TRACKER_DB_PATH", "/tmp/elsewhere.db"),
            ("TASK_TRACKER_PORT", "7000"),
            ("TASK_TRACKER_STORE", "memory"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.store.db_path, PathBuf::from("/tmp/elsewhere.db"));
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn bad_env_port_is_an_error() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, |key| {
            (key == "TASK_TRACKER_PORT").then(|| "http".to_string())
        });
        assert!(result.is_err());
    }
}
