//! Error types for policy loading and validation.

use std::fmt;
use std::path::PathBuf;

/// Where in the document a validation rule failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locus {
    /// The document root (a top-level section is missing or malformed).
    Document,
    /// The `global` section.
    Global,
    /// One entry of the `tunnels` sequence.
    Tunnel {
        /// Zero-based position in the sequence.
        index: usize,
        /// The tunnel's `name`, once it is known.
        name: Option<String>,
    },
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("policy"),
            Self::Global => f.write_str("global"),
            Self::Tunnel {
                name: Some(name), ..
            } => write!(f, "tunnel '{name}'"),
            Self::Tunnel { index, name: None } => write!(f, "tunnel #{index}"),
        }
    }
}

/// The first rule a policy document violates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{locus}: {reason}")]
pub struct ValidationError {
    /// Section or tunnel holding the violation.
    pub locus: Locus,
    /// Offending field, when the rule concerns a single field.
    pub field: Option<&'static str>,
    /// Human-readable description of the violated rule.
    pub reason: String,
}

impl ValidationError {
    pub(crate) fn new(locus: Locus, field: Option<&'static str>, reason: impl Into<String>) -> Self {
        Self {
            locus,
            field,
            reason: reason.into(),
        }
    }
}

/// Errors from loading or validating a policy document.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The policy file does not exist.
    #[error("policy document not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The policy file exists but could not be read.
    #[error("failed to read policy document `{path}`: {source}")]
    Read {
        /// Path that was attempted.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The policy file is not well-formed YAML.
    #[error("invalid policy document `{path}`: {source}")]
    Parse {
        /// Path (or `<inline>`) that was parsed.
        path: String,
        /// The underlying YAML error.
        source: serde_yaml::Error,
    },

    /// The document parsed but breaks a validation rule.
    #[error("policy validation failed: {0}")]
    Invalid(#[from] ValidationError),
}
