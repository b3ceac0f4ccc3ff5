//! One end-to-end run: detect, load, validate, dispatch.
//!
//! A run moves through [`Stage`]s strictly in order and never retries. The
//! first failure ends the run at [`Stage::Failed`]; a document that fails
//! validation is never handed to an adapter.

use std::fmt;
use std::path::PathBuf;

use tracing::{error, info, warn};
use unisec_adapters::{AdapterGateway, AdapterReport, GatewayError, Platform};
use unisec_policy::{PolicyDocument, PolicyError, ValidatedPolicy};

/// Where a run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Start,
    OsDetected,
    PolicyLoaded,
    PolicyValidated,
    Dispatched,
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::OsDetected => "os-detected",
            Self::PolicyLoaded => "policy-loaded",
            Self::PolicyValidated => "policy-validated",
            Self::Dispatched => "dispatched",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

/// Anything that ends a run early.
#[derive(Debug, thiserror::Error)]
pub(crate) enum EngineError {
    /// The policy document is missing, unreadable, or invalid.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// No adapter could be found, or the adapter failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// What to run.
#[derive(Debug, Clone)]
pub(crate) struct RunOptions {
    pub(crate) policy_path: PathBuf,
    /// Skip detection and use this platform.
    pub(crate) platform: Option<Platform>,
    /// Stop after validation.
    pub(crate) check_only: bool,
}

/// State carried from one stage to the next.
#[derive(Debug)]
pub(crate) struct RunContext {
    stage: Stage,
    policy_path: PathBuf,
    platform: Option<Platform>,
    document: Option<PolicyDocument>,
    policy: Option<ValidatedPolicy>,
    report: Option<AdapterReport>,
}

impl RunContext {
    fn new(policy_path: PathBuf) -> Self {
        Self {
            stage: Stage::Start,
            policy_path,
            platform: None,
            document: None,
            policy: None,
            report: None,
        }
    }
}

fn transition(stage: &mut Stage, next: Stage) {
    info!(from = %stage, to = %next, "stage transition");
    *stage = next;
}

/// Result of [`Engine::run`].
#[derive(Debug)]
pub(crate) struct RunOutcome {
    /// Final stage: [`Stage::Succeeded`] or [`Stage::Failed`].
    pub(crate) stage: Stage,
    /// Last stage reached before the run ended.
    pub(crate) reached: Stage,
    /// Why the run failed.
    pub(crate) error: Option<EngineError>,
    /// Adapter output, when an adapter ran successfully.
    pub(crate) report: Option<AdapterReport>,
}

impl RunOutcome {
    /// Process exit code: 0 on success, 1 on any failure.
    #[must_use]
    pub(crate) const fn exit_code(&self) -> i32 {
        match self.stage {
            Stage::Succeeded => 0,
            _ => 1,
        }
    }
}

/// Drives a single run.
#[derive(Debug)]
pub(crate) struct Engine {
    options: RunOptions,
    gateway: AdapterGateway,
}

impl Engine {
    pub(crate) const fn new(options: RunOptions, gateway: AdapterGateway) -> Self {
        Self { options, gateway }
    }

    /// Run every stage and report where the run ended.
    pub(crate) fn run(&self) -> RunOutcome {
        let mut ctx = RunContext::new(self.options.policy_path.clone());
        let result = self.drive(&mut ctx);
        let reached = ctx.stage;

        let error = match result {
            Ok(()) => {
                transition(&mut ctx.stage, Stage::Succeeded);
                None
            }
            Err(e) => {
                error!(stage = %reached, platform = ?ctx.platform, error = %e, "run failed");
                transition(&mut ctx.stage, Stage::Failed);
                Some(e)
            }
        };

        RunOutcome {
            stage: ctx.stage,
            reached,
            error,
            report: ctx.report,
        }
    }

    fn drive(&self, ctx: &mut RunContext) -> Result<(), EngineError> {
        let platform = self.options.platform.unwrap_or_else(Platform::detect);
        ctx.platform = Some(platform);
        if self.options.platform.is_some() {
            info!(%platform, "platform overridden");
        }
        if platform == Platform::Unknown {
            warn!(os = std::env::consts::OS, "host platform has no adapter");
        }
        transition(&mut ctx.stage, Stage::OsDetected);

        info!(path = %ctx.policy_path.display(), "loading policy");
        let document = ctx.document.insert(PolicyDocument::load(&ctx.policy_path)?);
        transition(&mut ctx.stage, Stage::PolicyLoaded);

        let policy = ctx
            .policy
            .insert(document.validate().map_err(PolicyError::from)?);
        info!(tunnels = policy.tunnels().len(), "policy is valid");
        transition(&mut ctx.stage, Stage::PolicyValidated);

        if self.options.check_only {
            info!("check mode, skipping dispatch");
            return Ok(());
        }

        transition(&mut ctx.stage, Stage::Dispatched);
        let report = self.gateway.dispatch(platform, policy)?;
        if !report.output.is_empty() {
            info!(adapter = %report.adapter, output = %report.output, "adapter output");
        }
        ctx.report = Some(report);
        Ok(())
    }
}
