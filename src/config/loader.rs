use crate::config::schema::{TrackerConfig, ValidationError};
use std::fs;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no path is given.
pub const LOCAL_CONFIG_FILE: &str = "refactor-audit.toml";

/// Failure to read, parse or validate a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config{}: {source}", located(.path))]
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },

    #[error("invalid config{}: {source}", located(.path))]
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

fn located(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

impl ConfigError {
    /// Attach the file a string-level error came from.
    fn in_file(mut self, file: &Path) -> Self {
        if let ConfigError::Toml { path, .. } | ConfigError::Validation { path, .. } = &mut self {
            path.get_or_insert_with(|| file.to_path_buf());
        }
        self
    }
}

pub fn load_from_str(input: &str) -> Result<TrackerConfig, ConfigError> {
    let config: TrackerConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<TrackerConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.in_file(path))
}

/// Candidate config files, most specific first.
pub fn search_paths(explicit: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let mut paths = vec![cwd.join(LOCAL_CONFIG_FILE)];
    if let Some(home) = home::home_dir() {
        paths.push(home.join(".config").join("refactor-audit").join("config.toml"));
    }
    paths
}

/// Load the first config that exists, or the defaults when none does.
///
/// An explicit path must exist. Returns the path that was used, if any.
pub fn discover(
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<(TrackerConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_from_path(path)?, Some(path.to_path_buf())));
    }
    for path in search_paths(None, cwd) {
        if path.is_file() {
            tracing::debug!(path = %path.display(), "loading config");
            return Ok((load_from_path(&path)?, Some(path)));
        }
    }
    Ok((TrackerConfig::default(), None))
}
