//! Adapter selection and dispatch.
//!
//! The gateway maps a [`Platform`] to its adapter, checks that the adapter's
//! artifact (script or configuration directory) exists, and runs it. Lookup
//! failures and execution failures are reported as different
//! [`GatewayError`] variants.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use unisec_policy::ValidatedPolicy;

use crate::adapter::{Adapter, AdapterReport};
use crate::error::GatewayError;
use crate::platform::Platform;
use crate::script::ScriptAdapter;
use crate::strongswan::{DEFAULT_CONF_DIR, StrongSwanAdapter};

/// Default Windows adapter script.
pub const DEFAULT_WINDOWS_SCRIPT: &str = "adapters/windows/windows_ipsec.ps1";
/// Default macOS adapter script.
pub const DEFAULT_MACOS_SCRIPT: &str = "adapters/macos/macos_ipsec.sh";

/// Where each platform's adapter lives and how to run it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// Directory for transient policy handoff files (system temp dir if unset).
    pub artifact_dir: Option<PathBuf>,
    /// Linux strongSwan adapter.
    pub linux: LinuxSettings,
    /// Windows PowerShell adapter.
    pub windows: ScriptSettings,
    /// macOS shell adapter.
    pub macos: ScriptSettings,
}

/// Settings for the in-process strongSwan adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinuxSettings {
    /// swanctl configuration directory. Must exist.
    pub conf_dir: PathBuf,
    /// Reload charon after writing the configuration.
    pub reload: bool,
    /// Command used when `reload` is set.
    pub reload_command: Vec<String>,
}

impl Default for LinuxSettings {
    fn default() -> Self {
        Self {
            conf_dir: PathBuf::from(DEFAULT_CONF_DIR),
            reload: false,
            reload_command: vec!["swanctl".to_owned(), "--load-all".to_owned()],
        }
    }
}

/// Settings for a script adapter. Unset fields use the platform default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptSettings {
    /// Adapter script path.
    pub script: Option<PathBuf>,
    /// Interpreter binary.
    pub interpreter: Option<String>,
}

/// Selects and invokes the adapter for a platform.
#[derive(Debug, Clone, Default)]
pub struct AdapterGateway {
    settings: AdapterSettings,
}

impl AdapterGateway {
    /// Create a gateway from adapter settings.
    #[must_use]
    pub const fn new(settings: AdapterSettings) -> Self {
        Self { settings }
    }

    /// Look up the adapter for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PlatformUnsupported`] for
    /// [`Platform::Unknown`], before anything is looked up, and
    /// [`GatewayError::AdapterNotFound`] when the adapter's script or
    /// configuration directory does not exist.
    pub fn resolve(&self, platform: Platform) -> Result<Box<dyn Adapter>, GatewayError> {
        match platform {
            Platform::Unknown => Err(GatewayError::PlatformUnsupported {
                platform,
                os: std::env::consts::OS.to_owned(),
            }),
            Platform::Linux => {
                let linux = &self.settings.linux;
                if !linux.conf_dir.is_dir() {
                    return Err(GatewayError::AdapterNotFound {
                        platform,
                        path: linux.conf_dir.clone(),
                    });
                }
                let mut adapter = StrongSwanAdapter::new(linux.conf_dir.clone());
                if linux.reload {
                    adapter = adapter.with_reload(linux.reload_command.clone());
                }
                Ok(Box::new(adapter))
            }
            Platform::Windows => {
                let settings = &self.settings.windows;
                let script = locate_script(platform, settings, DEFAULT_WINDOWS_SCRIPT)?;
                Ok(Box::new(
                    self.configure_script(ScriptAdapter::windows(script), settings),
                ))
            }
            Platform::MacOs => {
                let settings = &self.settings.macos;
                let script = locate_script(platform, settings, DEFAULT_MACOS_SCRIPT)?;
                Ok(Box::new(
                    self.configure_script(ScriptAdapter::macos(script), settings),
                ))
            }
        }
    }

    /// Apply `policy` through the adapter for `platform`.
    ///
    /// # Errors
    ///
    /// Returns the lookup errors of [`resolve`](Self::resolve), or
    /// [`GatewayError::Adapter`] when the adapter itself fails. Nothing is
    /// retried.
    pub fn dispatch(
        &self,
        platform: Platform,
        policy: &ValidatedPolicy,
    ) -> Result<AdapterReport, GatewayError> {
        let adapter = self.resolve(platform)?;
        info!(%platform, adapter = adapter.name(), "dispatching policy to adapter");

        adapter
            .apply(policy)
            .map_err(|source| GatewayError::Adapter {
                adapter: adapter.name().to_owned(),
                source,
            })
    }

    fn configure_script(
        &self,
        mut adapter: ScriptAdapter,
        settings: &ScriptSettings,
    ) -> ScriptAdapter {
        if let Some(interpreter) = &settings.interpreter {
            adapter = adapter.with_interpreter(interpreter.clone());
        }
        if let Some(dir) = &self.settings.artifact_dir {
            adapter = adapter.with_artifact_dir(dir.clone());
        }
        adapter
    }
}

fn locate_script(
    platform: Platform,
    settings: &ScriptSettings,
    default: &str,
) -> Result<PathBuf, GatewayError> {
    let configured = settings
        .script
        .clone()
        .unwrap_or_else(|| PathBuf::from(default));
    find_artifact(&configured).ok_or(GatewayError::AdapterNotFound {
        platform,
        path: configured,
    })
}

/// Find an adapter file.
///
/// Absolute paths are used as-is. Relative paths are tried against the
/// working directory first, then against the directory holding the running
/// binary.
fn find_artifact(path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(path)))
        .filter(|p| p.is_file());
    if let Some(found) = &beside_exe {
        debug!(path = %found.display(), "found adapter beside the running binary");
    }
    beside_exe
}
