//! Engine configuration (`config.toml`).
//!
//! Every field is optional. Command-line flags take precedence over values
//! read here.
//!
//! ```toml
//! policy_path = "/etc/unisec/policy.yaml"
//! log_path = "/var/log/unisec/unisec.log"
//! artifact_dir = "/run/unisec"
//!
//! [linux]
//! conf_dir = "/etc/swanctl/conf.d"
//! reload = true
//!
//! [macos]
//! script = "/usr/local/share/unisec/macos_ipsec.sh"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use unisec_adapters::AdapterSettings;

/// Errors while loading the engine configuration.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be read.
    #[error("failed to read config `{}`: {source}", .path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`EngineConfig`].
    #[error("invalid config `{}`: {source}", .path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// The underlying TOML error.
        source: toml::de::Error,
    },
}

/// Settings for one engine run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct EngineConfig {
    /// Policy document used when none is given on the command line.
    pub(crate) policy_path: Option<PathBuf>,
    /// Log file used when `--log-file` is not given.
    pub(crate) log_path: Option<PathBuf>,
    /// Adapter locations and invocation settings.
    #[serde(flatten)]
    pub(crate) adapters: AdapterSettings,
    /// File this configuration was read from, if any.
    #[serde(skip)]
    pub(crate) source: Option<PathBuf>,
}

impl EngineConfig {
    /// Load the configuration.
    ///
    /// An `explicit` path must exist. Without one, the per-user
    /// `config.toml` is read when present, and defaults are used otherwise.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "unisec", "unisec")
}

/// `<XDG config>/unisec/config.toml`
pub(crate) fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `<XDG data>/unisec/logs/unisec.log`, or a temp-dir fallback when no home
/// directory is known.
pub(crate) fn default_log_path() -> PathBuf {
    project_dirs().map_or_else(
        || std::env::temp_dir().join("unisec").join("unisec.log"),
        |dirs| dirs.data_dir().join("logs").join("unisec.log"),
    )
}
