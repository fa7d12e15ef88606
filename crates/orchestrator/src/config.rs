//! Manager configuration: defaults, TOML file loading and environment/CLI
//! override resolution.
//!
//! Precedence, highest first: CLI flags > `--config` file > `BUGORCH_CONFIG`
//! env var > `<cwd>/bugorch.toml` if present > built-in defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILENAME: &str = "bugorch.toml";
pub const ENV_CONFIG_PATH: &str = "BUGORCH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Resolved manager defaults, after clamping and path resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerDefaults {
    pub repo_path: PathBuf,
    pub runs_root: PathBuf,
    pub min_workers: u32,
    pub max_workers: u32,
    pub timeout_sec: u64,
    pub poll_interval_sec: u64,
    pub repro_validation_runs: u32,
    pub repro_min_matches: u32,
    pub validation_python_version: String,
    pub worker_model: String,
    pub manager_model: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    manager: RawManager,
}

#[derive(Debug, Default, Deserialize)]
struct RawManager {
    repo_path: Option<String>,
    runs_root: Option<String>,
    min_workers: Option<i64>,
    max_workers: Option<i64>,
    timeout_sec: Option<i64>,
    poll_interval_sec: Option<i64>,
    repro_validation_runs: Option<i64>,
    repro_min_matches: Option<i64>,
    validation_python_version: Option<String>,
    worker_model: Option<String>,
    manager_model: Option<String>,
}

fn default_repo_path(root: &Path) -> PathBuf {
    let numpy_path = root.join("projects").join("numpy");
    if numpy_path.exists() {
        return numpy_path.canonicalize().unwrap_or(numpy_path);
    }
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

fn resolve_path(raw: Option<&str>, root: &Path, default_path: &Path) -> PathBuf {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default_path.canonicalize().unwrap_or_else(|_| default_path.to_path_buf());
    };
    let path = PathBuf::from(raw);
    let path = if path.is_absolute() { path } else { root.join(path) };
    path.canonicalize().unwrap_or(path)
}

/// Locate the config file to load, per the precedence documented above.
/// Returns `None` when no explicit path was given and the default filename
/// doesn't exist in `cwd` — in that case the caller should use defaults.
pub fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        if !env_path.trim().is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }
    let candidate = cwd.join(DEFAULT_CONFIG_FILENAME);
    if candidate.exists() {
        return Some(candidate);
    }
    None
}

/// Load and clamp manager defaults, optionally merging a TOML config file
/// located via [`resolve_config_path`].
pub fn load_manager_defaults(config_path: Option<&Path>, cwd: &Path) -> Result<ManagerDefaults, ConfigError> {
    let root = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
    let selected = resolve_config_path(config_path, &root);

    let manager = match selected {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            let parsed: RawFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;
            parsed.manager
        }
        None => RawManager::default(),
    };

    let repo_path = resolve_path(manager.repo_path.as_deref(), &root, &default_repo_path(&root));
    let runs_root = resolve_path(manager.runs_root.as_deref(), &root, &root.join("runs"));

    let min_workers = manager.min_workers.unwrap_or(2).max(2) as u32;
    let max_workers = (manager.max_workers.unwrap_or(6).max(2) as u32).min(6);
    let timeout_sec = manager.timeout_sec.unwrap_or(300).max(60) as u64;
    let poll_interval_sec = manager.poll_interval_sec.unwrap_or(5).max(1) as u64;
    let repro_validation_runs = manager.repro_validation_runs.unwrap_or(5).max(1) as u32;
    let repro_min_matches = (manager.repro_min_matches.unwrap_or(1).max(1) as u32).min(repro_validation_runs);
    let validation_python_version = manager
        .validation_python_version
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "3.12".to_string());
    let worker_model = manager.worker_model.unwrap_or_default().trim().to_string();
    let manager_model = manager.manager_model.unwrap_or_default().trim().to_string();

    Ok(ManagerDefaults {
        repo_path,
        runs_root,
        min_workers,
        max_workers,
        timeout_sec,
        poll_interval_sec,
        repro_validation_runs,
        repro_min_matches,
        validation_python_version,
        worker_model,
        manager_model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_with_no_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = load_manager_defaults(None, dir.path()).unwrap();
        assert_eq!(defaults.min_workers, 2);
        assert_eq!(defaults.max_workers, 6);
        assert_eq!(defaults.timeout_sec, 300);
        assert_eq!(defaults.poll_interval_sec, 5);
        assert_eq!(defaults.repro_validation_runs, 5);
        assert_eq!(defaults.repro_min_matches, 1);
        assert_eq!(defaults.validation_python_version, "3.12");
        assert_eq!(defaults.runs_root, dir.path().canonicalize().unwrap().join("runs"));
    }

    #[test]
    fn clamps_out_of_range_values_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bugorch.toml");
        std::fs::write(
            &config_path,
            r#"
[manager]
min_workers = 1
max_workers = 40
timeout_sec = 5
poll_interval_sec = 0
repro_validation_runs = 2
repro_min_matches = 9
"#,
        )
        .unwrap();

        let defaults = load_manager_defaults(Some(&config_path), dir.path()).unwrap();
        assert_eq!(defaults.min_workers, 2);
        assert_eq!(defaults.max_workers, 6);
        assert_eq!(defaults.timeout_sec, 60);
        assert_eq!(defaults.poll_interval_sec, 1);
        assert_eq!(defaults.repro_min_matches, 2);
    }

    #[test]
    fn missing_explicit_config_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_manager_defaults(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn env_var_points_at_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        std::fs::write(&config_path, "[manager]\nmin_workers = 3\n").unwrap();
        std::env::set_var(ENV_CONFIG_PATH, &config_path);
        let defaults = load_manager_defaults(None, dir.path()).unwrap();
        std::env::remove_var(ENV_CONFIG_PATH);
        assert_eq!(defaults.min_workers, 3);
    }
}
