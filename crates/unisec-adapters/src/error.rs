//! Error types for adapter resolution and execution.

use std::path::PathBuf;

use crate::platform::Platform;

/// Errors raised while an adapter applies a policy.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The adapter could not write its output file.
    #[error("failed to write `{path}`: {source}")]
    Write {
        /// Destination path.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A tunnel value cannot be written into the generated configuration.
    #[error("tunnel '{tunnel}': {field} contains characters not allowed in swanctl.conf")]
    UnsafeValue {
        /// Tunnel name.
        tunnel: String,
        /// Offending field.
        field: &'static str,
    },

    /// The transient policy handoff file could not be created.
    #[error("failed to create policy handoff file: {0}")]
    Artifact(#[source] std::io::Error),

    /// The validated policy could not be serialized for handoff.
    #[error("failed to serialize policy: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A helper program the adapter depends on is not installed.
    #[error("`{0}` not found on PATH")]
    ToolNotFound(String),

    /// The adapter process could not be started.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        /// Program that was executed.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The adapter process ran and reported failure.
    #[error("`{program}` exited with {}: {diagnostic}", exit_label(.code))]
    Exited {
        /// Program that was executed.
        program: String,
        /// Exit code, or `None` when killed by a signal.
        code: Option<i32>,
        /// Captured stderr, or stdout when stderr was empty.
        diagnostic: String,
    },
}

impl AdapterError {
    /// Text to show the operator: the adapter's own output when it ran,
    /// otherwise the error description.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Exited { diagnostic, .. } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

#[allow(clippy::ref_option)] // thiserror passes fields by reference
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}"))
}

/// Errors from selecting and invoking a platform adapter.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The host platform has no adapter.
    #[error("no adapter for platform: {platform} (host OS `{os}`)")]
    PlatformUnsupported {
        /// The detected platform (always [`Platform::Unknown`] today).
        platform: Platform,
        /// Raw OS identifier reported by the host.
        os: String,
    },

    /// The adapter's script or target directory is missing.
    #[error("{platform} adapter not found: {}", .path.display())]
    AdapterNotFound {
        /// Platform whose adapter was looked up.
        platform: Platform,
        /// Path that was checked.
        path: PathBuf,
    },

    /// The adapter ran and failed.
    #[error("{adapter} adapter failed: {source}")]
    Adapter {
        /// Adapter name.
        adapter: String,
        /// What went wrong inside the adapter.
        source: AdapterError,
    },
}
