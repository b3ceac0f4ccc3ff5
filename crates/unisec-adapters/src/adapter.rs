//! The adapter capability shared by in-process and out-of-process adapters.

use std::process::Command;

use unisec_policy::ValidatedPolicy;

use crate::error::AdapterError;

/// Output of a successful adapter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterReport {
    /// Adapter that produced the report.
    pub adapter: String,
    /// Text the adapter printed or produced, trimmed. May be empty.
    pub output: String,
}

/// Applies a validated policy to the host.
///
/// Implementations either configure the host directly or hand the policy to
/// an external program. Either way the caller sees one `apply` call that
/// succeeds or fails with a diagnostic.
pub trait Adapter {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Apply `policy` to the host.
    ///
    /// # Errors
    ///
    /// Returns an [`AdapterError`] carrying the adapter's diagnostic text.
    fn apply(&self, policy: &ValidatedPolicy) -> Result<AdapterReport, AdapterError>;
}

/// Run `cmd` to completion, capturing its output.
///
/// Returns trimmed stdout on exit status 0. On any other status, returns
/// [`AdapterError::Exited`] with stderr (or stdout if stderr is empty) as the
/// diagnostic.
pub(crate) fn run_captured(cmd: &mut Command) -> Result<String, AdapterError> {
    let program = cmd.get_program().to_string_lossy().into_owned();

    tracing::debug!(
        program = %program,
        args = ?cmd.get_args().collect::<Vec<_>>(),
        "running adapter command"
    );

    let output = cmd.output().map_err(|source| AdapterError::Spawn {
        program: program.clone(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();

    if output.status.success() {
        if !stderr.is_empty() {
            tracing::warn!(program = %program, stderr = %stderr, "adapter wrote to stderr");
        }
        return Ok(stdout);
    }

    let diagnostic = if stderr.is_empty() { stdout } else { stderr };
    Err(AdapterError::Exited {
        program,
        code: output.status.code(),
        diagnostic,
    })
}
