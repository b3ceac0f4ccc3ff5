//! Policy document loading and default location resolution.
//!
//! A policy is a YAML (or JSON) file with a `global` mapping and a
//! `tunnels` list. When no path is given, the first existing file among
//! [`default_policy_paths`] is used:
//!
//! 1. `~/.config/unisec/policy.yaml` (XDG config dir)
//! 2. `./policy.yaml`
//! 3. `/etc/unisec/policy.yaml`

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use serde_yaml::Value;

use crate::error::{PolicyError, ValidationError};
use crate::model::ValidatedPolicy;

/// Default policy search paths, resolved lazily.
static DEFAULT_POLICY_PATHS: LazyLock<Vec<PathBuf>> = LazyLock::new(|| {
    let mut paths = Vec::new();

    if let Some(dirs) = directories::ProjectDirs::from("dev", "unisec", "unisec") {
        paths.push(dirs.config_dir().join("policy.yaml"));
    }
    paths.push(PathBuf::from("policy.yaml"));
    paths.push(PathBuf::from("/etc/unisec/policy.yaml"));

    paths
});

/// Candidate locations for the policy document, in search order.
#[must_use]
pub fn default_policy_paths() -> &'static [PathBuf] {
    &DEFAULT_POLICY_PATHS
}

/// Pick the policy path to load when none was given explicitly.
///
/// Returns the first existing default location. If none exists, returns the
/// first candidate so that loading fails with a not-found error naming it.
#[must_use]
pub fn resolve_policy_path() -> PathBuf {
    let found = DEFAULT_POLICY_PATHS.iter().find(|p| p.is_file());
    if let Some(path) = found {
        return path.clone();
    }

    tracing::debug!(
        candidates = ?default_policy_paths(),
        "no policy document found in default locations"
    );
    DEFAULT_POLICY_PATHS
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("policy.yaml"))
}

/// A parsed but not yet validated policy document.
///
/// Holds the raw document tree. Call [`validate`](Self::validate) to obtain
/// a typed [`ValidatedPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDocument {
    root: Value,
}

impl PolicyDocument {
    /// Parse a document from YAML or JSON text.
    ///
    /// Blank input parses to an empty document, which fails validation with
    /// a missing-section error rather than a parse error.
    ///
    /// # Errors
    ///
    /// Returns the YAML parse error for malformed input.
    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self { root: Value::Null });
        }
        serde_yaml::from_str(content).map(|root| Self { root })
    }

    /// Read and parse the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::NotFound`] if the file does not exist,
    /// [`PolicyError::Read`] for other I/O failures, and
    /// [`PolicyError::Parse`] for malformed YAML.
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                PolicyError::NotFound(path.to_path_buf())
            } else {
                PolicyError::Read {
                    path: path.display().to_string(),
                    source,
                }
            }
        })?;

        Self::from_yaml_str(&content).map_err(|source| PolicyError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// The raw document tree.
    #[must_use]
    pub const fn root(&self) -> &Value {
        &self.root
    }

    /// Run every validation rule against this document.
    ///
    /// # Errors
    ///
    /// Returns the first rule violation. See [`crate::validate`].
    pub fn validate(&self) -> Result<ValidatedPolicy, ValidationError> {
        crate::validate::validate(self)
    }
}
