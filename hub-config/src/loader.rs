//! Configuration loader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::schema::OrchestratorConfig;

/// Environment variable overriding the default configuration path.
pub const CONFIG_ENV: &str = "TOOLHUB_CONFIG";

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No file exists at the configured path.
    #[error("configuration file not found: {}", path.display())]
    NotFound {
        /// Path that was probed.
        path: PathBuf,
    },
    /// The file could not be parsed as YAML matching the schema.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
    /// The document parsed but violates structural constraints.
    #[error("invalid configuration: {reason}")]
    Validation {
        /// Every violation, joined.
        reason: String,
    },
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path of the offending file.
        path: PathBuf,
        /// Source I/O error.
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Stable machine-readable label for the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Parse { .. } => "parse_error",
            Self::Validation { .. } => "validation_error",
            Self::Io { .. } => "io_error",
        }
    }
}

/// Returns the configuration path from the environment or the home directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(expand_tilde(Path::new(&path)));
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config").join("toolhub").join("config.yaml"))
}

/// Expands a leading `~` against `$HOME`. Other paths are returned unchanged.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// Parses, validates, and normalises a YAML document.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] or [`ConfigError::Validation`].
pub fn parse_config(yaml: &str, origin: &Path) -> ConfigResult<OrchestratorConfig> {
    let mut config: OrchestratorConfig =
        serde_yaml::from_str(yaml).map_err(|err| ConfigError::Parse {
            path: origin.to_path_buf(),
            reason: err.to_string(),
        })?;

    config.validate()?;

    for policy in config.packages.values_mut() {
        policy.path = expand_tilde(&policy.path);
    }
    if let Some(log_file) = config.settings.log_file.as_mut() {
        *log_file = expand_tilde(log_file);
    }

    Ok(config)
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] when the file is absent, otherwise any
/// error from [`parse_config`].
pub fn load_config(path: &Path) -> ConfigResult<OrchestratorConfig> {
    let yaml = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_config(&yaml, path)
}

/// Loaded configuration plus the error that replaced it, if any.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    config: Arc<OrchestratorConfig>,
    error: Option<ConfigError>,
}

impl ConfigStore {
    /// Loads the file at `path`, degrading to an empty configuration on error.
    #[must_use]
    pub fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match load_config(&path) {
            Ok(config) => {
                info!(
                    path = %path.display(),
                    packages = config.packages.len(),
                    "configuration loaded"
                );
                Self {
                    path: Some(path),
                    config: Arc::new(config),
                    error: None,
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "configuration unavailable, continuing with no packages");
                Self {
                    path: Some(path),
                    config: Arc::new(OrchestratorConfig::empty()),
                    error: Some(err),
                }
            }
        }
    }

    /// Loads from [`default_config_path`], or records a not-found error when
    /// no candidate path can be determined.
    #[must_use]
    pub fn load_default() -> Self {
        match default_config_path() {
            Some(path) => Self::load_or_empty(path),
            None => Self {
                path: None,
                config: Arc::new(OrchestratorConfig::empty()),
                error: Some(ConfigError::NotFound {
                    path: PathBuf::from("~/.config/toolhub/config.yaml"),
                }),
            },
        }
    }

    /// Wraps an in-memory configuration that is already known to be valid.
    #[must_use]
    pub fn from_config(config: OrchestratorConfig) -> Self {
        Self {
            path: None,
            config: Arc::new(config),
            error: None,
        }
    }

    /// Returns the configuration (empty when loading failed).
    #[must_use]
    pub fn config(&self) -> &Arc<OrchestratorConfig> {
        &self.config
    }

    /// Returns the load error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ConfigError> {
        self.error.as_ref()
    }

    /// Returns the path the configuration was read from.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns true when the configuration loaded without error.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r"
schema_version: '1'
packages:
  sheets:
    path: /opt/packages/sheets
    resource_scope:
      param: spreadsheet_id
      allowed: [abc123]
  briefing:
    path: /opt/packages/briefing
    allowed_tools: [run_weekly_digest, content_feed_status]
  archive:
    path: /opt/packages/archive
    enabled: false
settings:
  log_invocations: true
";

    #[test]
    fn parses_sample_document() {
        let config = parse_config(SAMPLE, Path::new("inline.yaml")).unwrap();
        assert_eq!(config.schema_version, "1");
        assert_eq!(config.packages.len(), 3);

        let sheets = &config.packages["sheets"];
        let scope = sheets.resource_scope.as_ref().unwrap();
        assert_eq!(scope.param, "spreadsheet_id");
        assert!(scope.permits("abc123"));

        assert!(!config.packages["archive"].enabled);
        assert!(config.settings.log_invocations);
        assert!(config.settings.log_file.is_none());
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = parse_config(
            "schema_version: '1'\npackages:\n  a:\n    path: /a\n    allow_write: true\n",
            Path::new("typo.yaml"),
        )
        .expect_err("typo should be rejected");
        assert_eq!(err.kind(), "parse_error");
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::load_or_empty(dir.path().join("absent.yaml"));
        assert!(!store.is_loaded());
        assert!(matches!(store.error(), Some(ConfigError::NotFound { .. })));
        assert!(store.config().packages.is_empty());
    }

    #[test]
    fn invalid_file_degrades_to_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"schema_version: ''\n").unwrap();

        let store = ConfigStore::load_or_empty(file.path());
        assert!(matches!(store.error(), Some(ConfigError::Validation { .. })));
        assert!(store.config().packages.is_empty());
    }

    #[test]
    fn loads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let store = ConfigStore::load_or_empty(file.path());
        assert!(store.is_loaded());
        assert_eq!(store.path(), Some(file.path()));
        assert_eq!(store.config().enabled_packages().count(), 2);
    }

    #[test]
    fn absolute_paths_are_not_expanded() {
        assert_eq!(expand_tilde(Path::new("/opt/x")), PathBuf::from("/opt/x"));
        assert_eq!(expand_tilde(Path::new("rel/x")), PathBuf::from("rel/x"));
    }
}
