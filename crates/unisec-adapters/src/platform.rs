//! Host platform detection.

use std::fmt;
use std::str::FromStr;

/// Operating system family an adapter exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Linux (strongSwan, applied in-process).
    Linux,
    /// Windows (PowerShell script).
    Windows,
    /// macOS (shell script).
    MacOs,
    /// Anything else. Dispatch rejects it.
    Unknown,
}

impl Platform {
    /// Detect the platform this binary is running on.
    #[must_use]
    pub fn detect() -> Self {
        let platform = Self::from_os_name(std::env::consts::OS);
        tracing::debug!(os = std::env::consts::OS, %platform, "detected host platform");
        platform
    }

    /// Map an OS identifier (as reported by the host) to a platform.
    ///
    /// Matching is case-insensitive; both `macos` and `darwin` map to
    /// [`Platform::MacOs`]. Unrecognized names map to [`Platform::Unknown`].
    #[must_use]
    pub fn from_os_name(os: &str) -> Self {
        match os.to_ascii_lowercase().as_str() {
            "linux" => Self::Linux,
            "windows" => Self::Windows,
            "macos" | "darwin" => Self::MacOs,
            _ => Self::Unknown,
        }
    }

    /// Lower-case name used in logs and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::from_os_name(s) {
            Self::Unknown if !s.eq_ignore_ascii_case("unknown") => Err(format!(
                "unrecognized platform '{s}' (expected linux, windows, macos, or unknown)"
            )),
            platform => Ok(platform),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_names_map_case_insensitively() {
        assert_eq!(Platform::from_os_name("linux"), Platform::Linux);
        assert_eq!(Platform::from_os_name("Linux"), Platform::Linux);
        assert_eq!(Platform::from_os_name("WINDOWS"), Platform::Windows);
        assert_eq!(Platform::from_os_name("Darwin"), Platform::MacOs);
        assert_eq!(Platform::from_os_name("macos"), Platform::MacOs);
    }

    #[test]
    fn unrecognized_os_is_unknown() {
        assert_eq!(Platform::from_os_name("freebsd"), Platform::Unknown);
        assert_eq!(Platform::from_os_name(""), Platform::Unknown);
    }

    #[test]
    fn detect_matches_compile_target() {
        let expected = if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Unknown
        };
        assert_eq!(Platform::detect(), expected);
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("macos".parse::<Platform>(), Ok(Platform::MacOs));
        assert_eq!("unknown".parse::<Platform>(), Ok(Platform::Unknown));
        assert!("plan9".parse::<Platform>().is_err());
    }
}
