//! unisec: one IPsec policy, every platform.
//!
//! Validates a platform-agnostic IPsec policy document and applies it through
//! the host's adapter: strongSwan on Linux, a PowerShell script on Windows,
//! a shell script on macOS.

mod config;
mod engine;

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};
use unisec_adapters::{AdapterGateway, Platform};

use crate::config::EngineConfig;
use crate::engine::{Engine, RunOptions};

/// Validate a unified IPsec policy and apply it on this host.
///
/// The policy is checked in full before any adapter runs. Exit status is 0
/// when the policy was applied (or, with `--check`, is valid) and 1 otherwise.
#[derive(Parser)]
#[command(name = "unisec", version, about, long_about = None)]
struct Cli {
    /// Policy document (YAML or JSON). Defaults to the configured or
    /// standard location.
    policy: Option<PathBuf>,

    /// Engine configuration file (TOML).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of the default location.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Use this platform's adapter instead of detecting the host.
    #[arg(long, value_name = "linux|windows|macos")]
    platform: Option<Platform>,

    /// Validate the policy and exit without applying it.
    #[arg(long)]
    check: bool,

    /// Enable verbose logging (repeat for more detail: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON (for machine consumption).
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref())?;

    let log_path = cli
        .log_file
        .clone()
        .or_else(|| config.log_path.clone())
        .unwrap_or_else(config::default_log_path);
    init_logging(cli.verbose, cli.json_logs, &log_path)?;

    if let Some(source) = &config.source {
        tracing::debug!(path = %source.display(), "loaded engine config");
    }

    let policy_path = cli
        .policy
        .or_else(|| config.policy_path.clone())
        .unwrap_or_else(unisec_policy::resolve_policy_path);

    let engine = Engine::new(
        RunOptions {
            policy_path,
            platform: cli.platform,
            check_only: cli.check,
        },
        AdapterGateway::new(config.adapters),
    );
    let outcome = engine.run();
    tracing::info!(
        outcome = %outcome.stage,
        reached = %outcome.reached,
        adapter = outcome.report.as_ref().map_or("none", |r| r.adapter.as_str()),
        "run finished"
    );

    if let Some(err) = &outcome.error {
        eprintln!("unisec: {err}");
    }
    std::process::exit(outcome.exit_code());
}

/// Log to stdout and to `log_path`.
///
/// The file is appended to so that successive runs keep their history.
fn init_logging(verbose: u8, json: bool, log_path: &Path) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .wrap_err_with(|| format!("failed to open log file {}", log_path.display()))?;

    let stdout_layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer()
            .with_ansi(std::io::stdout().is_terminal())
            .boxed()
    };
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(EnvFilter::new(level))
        .init();

    tracing::debug!(path = %log_path.display(), "logging to file");
    Ok(())
}
