//! Out-of-process adapters driven by an interpreter script.
//!
//! The validated policy is written to a JSON tempfile, the interpreter runs
//! the script with the tempfile's path, and the tempfile is deleted when
//! [`ScriptAdapter::apply`] returns. The handoff file is a
//! [`tempfile::NamedTempFile`], so it is removed on every exit path,
//! including early returns and spawn failures.
//!
//! ```text
//! windows: powershell.exe -ExecutionPolicy Bypass -File <script> -PolicyFile <policy.json>
//! macos:   bash <script> <policy.json>
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};
use unisec_policy::ValidatedPolicy;

use crate::adapter::{Adapter, AdapterReport, run_captured};
use crate::error::AdapterError;

/// Runs a platform script against a serialized policy.
#[derive(Debug, Clone)]
pub struct ScriptAdapter {
    name: &'static str,
    interpreter: String,
    /// Arguments placed before the script path.
    interpreter_args: Vec<String>,
    script: PathBuf,
    /// Flag placed before the policy path, if the script takes a named parameter.
    policy_flag: Option<String>,
    /// Directory for the handoff file; the system temp dir when `None`.
    artifact_dir: Option<PathBuf>,
}

impl ScriptAdapter {
    /// Default Windows interpreter.
    pub const WINDOWS_INTERPRETER: &'static str = "powershell.exe";
    /// Default macOS interpreter.
    pub const MACOS_INTERPRETER: &'static str = "bash";

    /// PowerShell adapter invoked as
    /// `powershell.exe -ExecutionPolicy Bypass -File <script> -PolicyFile <policy>`.
    #[must_use]
    pub fn windows(script: PathBuf) -> Self {
        Self {
            name: "windows",
            interpreter: Self::WINDOWS_INTERPRETER.to_owned(),
            interpreter_args: vec![
                "-ExecutionPolicy".to_owned(),
                "Bypass".to_owned(),
                "-File".to_owned(),
            ],
            script,
            policy_flag: Some("-PolicyFile".to_owned()),
            artifact_dir: None,
        }
    }

    /// Shell adapter invoked as `bash <script> <policy>`.
    #[must_use]
    pub fn macos(script: PathBuf) -> Self {
        Self {
            name: "macos",
            interpreter: Self::MACOS_INTERPRETER.to_owned(),
            interpreter_args: Vec::new(),
            script,
            policy_flag: None,
            artifact_dir: None,
        }
    }

    /// Replace the interpreter binary, keeping its arguments.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Create handoff files in `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: PathBuf) -> Self {
        self.artifact_dir = Some(dir);
        self
    }

    /// Build the interpreter invocation for a handoff file at `artifact`.
    #[must_use]
    pub fn build_command(&self, artifact: &Path) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.interpreter_args);
        cmd.arg(&self.script);
        if let Some(flag) = &self.policy_flag {
            cmd.arg(flag);
        }
        cmd.arg(artifact);
        cmd
    }

    /// Serialize `policy` into a fresh handoff file.
    ///
    /// The file is deleted when the returned handle is dropped.
    fn write_artifact(
        &self,
        policy: &ValidatedPolicy,
    ) -> Result<tempfile::NamedTempFile, AdapterError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("unisec-policy-").suffix(".json");
        let mut artifact = match &self.artifact_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(AdapterError::Artifact)?;

        serde_json::to_writer_pretty(&mut artifact, policy)?;
        Ok(artifact)
    }
}

impl Adapter for ScriptAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(&self, policy: &ValidatedPolicy) -> Result<AdapterReport, AdapterError> {
        let artifact = self.write_artifact(policy)?;
        info!(
            adapter = self.name,
            script = %self.script.display(),
            artifact = %artifact.path().display(),
            "running adapter script"
        );

        let result = run_captured(&mut self.build_command(artifact.path()));

        let artifact_path = artifact.path().to_path_buf();
        if let Err(e) = artifact.close() {
            warn!(
                path = %artifact_path.display(),
                error = %e,
                "failed to remove policy handoff file"
            );
        }

        result.map(|output| AdapterReport {
            adapter: self.name.to_owned(),
            output,
        })
    }
}
