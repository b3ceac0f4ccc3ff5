//! In-process Linux adapter for strongSwan.
//!
//! Renders the validated policy as a `swanctl.conf` fragment, writes it into
//! the swanctl configuration directory, and optionally asks the running
//! charon daemon to reload. Each tunnel becomes one connection with a single
//! child SA of the same name.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};
use unisec_policy::{
    AuthMethod, Choice, GlobalConfig, IkeVersion, Mode, Protocol, TunnelConfig, ValidatedPolicy,
};

use crate::adapter::{Adapter, AdapterReport, run_captured};
use crate::error::AdapterError;

/// Default swanctl configuration directory.
pub const DEFAULT_CONF_DIR: &str = "/etc/swanctl/conf.d";

/// File written inside the configuration directory.
pub const CONF_FILE_NAME: &str = "unisec.conf";

/// Applies policies by generating swanctl configuration.
#[derive(Debug, Clone)]
pub struct StrongSwanAdapter {
    conf_dir: PathBuf,
    reload_command: Option<Vec<String>>,
}

impl StrongSwanAdapter {
    /// Create an adapter that writes into `conf_dir`.
    #[must_use]
    pub const fn new(conf_dir: PathBuf) -> Self {
        Self {
            conf_dir,
            reload_command: None,
        }
    }

    /// Run `command` after writing the configuration (e.g.
    /// `swanctl --load-all`). An empty command disables reloading.
    #[must_use]
    pub fn with_reload(mut self, command: Vec<String>) -> Self {
        self.reload_command = Some(command).filter(|c| !c.is_empty());
        self
    }

    /// Path of the generated configuration file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.conf_dir.join(CONF_FILE_NAME)
    }

    fn reload(&self) -> Result<String, AdapterError> {
        let Some((program, args)) = self.reload_command.as_deref().and_then(<[_]>::split_first)
        else {
            return Ok(String::new());
        };

        which::which(program).map_err(|_| AdapterError::ToolNotFound(program.clone()))?;
        info!(program = %program, "reloading strongSwan configuration");
        run_captured(Command::new(program).args(args))
    }
}

impl Adapter for StrongSwanAdapter {
    fn name(&self) -> &str {
        "strongswan"
    }

    fn apply(&self, policy: &ValidatedPolicy) -> Result<AdapterReport, AdapterError> {
        let path = self.config_path();
        let rendered = render_swanctl(policy)?;

        write_private(&path, rendered.as_bytes()).map_err(|source| AdapterError::Write {
            path: path.display().to_string(),
            source,
        })?;
        info!(
            path = %path.display(),
            tunnels = policy.tunnels().len(),
            "wrote swanctl configuration"
        );

        let reload_output = self.reload()?;
        let output = if reload_output.is_empty() {
            format!("wrote {}", path.display())
        } else {
            format!("wrote {}\n{reload_output}", path.display())
        };

        Ok(AdapterReport {
            adapter: self.name().to_owned(),
            output,
        })
    }
}

/// Write `contents` to `path`, readable only by the owner on Unix.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt as _;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Render a validated policy as a `swanctl.conf` fragment.
///
/// # Errors
///
/// Returns [`AdapterError::UnsafeValue`] when a peer address or subnet
/// contains text that would change the structure of the file.
pub fn render_swanctl(policy: &ValidatedPolicy) -> Result<String, AdapterError> {
    let global = policy.global();
    let ike_proposal = proposal(global, true);
    let version = match global.ike_version {
        IkeVersion::Ikev1 => 1,
        IkeVersion::Ikev2 => 2,
    };

    let mut out = String::new();
    out.push_str("# Generated by unisec. Changes are overwritten on the next apply.\n");
    out.push_str("connections {\n");

    let mut seen = HashSet::new();
    for (index, tunnel) in policy.tunnels().iter().enumerate() {
        check_values(tunnel)?;
        let section = section_name(tunnel, index, &mut seen);
        debug!(tunnel = %tunnel.name, section = %section, "rendering connection");
        render_connection(&mut out, &section, tunnel, global, version, &ike_proposal);
    }
    out.push_str("}\n");

    if let Some(psk) = global.psk.as_deref().filter(|_| global.auth_method == AuthMethod::Psk) {
        out.push_str("secrets {\n");
        out.push_str("    ike-unisec {\n");
        let _ = writeln!(out, "        secret = \"{}\"", escape(psk));
        out.push_str("    }\n");
        out.push_str("}\n");
    }

    Ok(out)
}

/// Reject bare values that could open, close, or quote a section.
fn check_values(tunnel: &TunnelConfig) -> Result<(), AdapterError> {
    let fields = [
        ("peer_ip", Some(&tunnel.peer_ip)),
        ("local_subnet", tunnel.local_subnet.as_ref()),
        ("remote_subnet", tunnel.remote_subnet.as_ref()),
    ];
    for (field, value) in fields {
        let Some(value) = value else { continue };
        if value
            .chars()
            .any(|c| c.is_control() || matches!(c, '{' | '}' | '"'))
        {
            return Err(AdapterError::UnsafeValue {
                tunnel: tunnel.name.clone(),
                field,
            });
        }
    }
    Ok(())
}

fn render_connection(
    out: &mut String,
    section: &str,
    tunnel: &TunnelConfig,
    global: &GlobalConfig,
    version: u8,
    ike_proposal: &str,
) {
    let auth = swanctl_auth(global.auth_method);
    let _ = writeln!(out, "    {section} {{");
    let _ = writeln!(out, "        version = {version}");
    let _ = writeln!(out, "        remote_addrs = {}", tunnel.peer_ip);
    let _ = writeln!(out, "        proposals = {ike_proposal}");
    let _ = writeln!(out, "        local {{\n            auth = {auth}\n        }}");
    let _ = writeln!(out, "        remote {{\n            auth = {auth}\n        }}");
    out.push_str("        children {\n");
    let _ = writeln!(out, "            {section} {{");
    let _ = writeln!(out, "                mode = {}", tunnel.mode);
    if tunnel.mode == Mode::Tunnel {
        if let Some(local) = &tunnel.local_subnet {
            let _ = writeln!(out, "                local_ts = {local}");
        }
        if let Some(remote) = &tunnel.remote_subnet {
            let _ = writeln!(out, "                remote_ts = {remote}");
        }
    }
    // AH authenticates only, so its proposal carries no cipher.
    let (key, child_proposal) = match tunnel.protocol {
        Protocol::Esp => ("esp_proposals", proposal(global, true)),
        Protocol::Ah => ("ah_proposals", proposal(global, false)),
    };
    let _ = writeln!(out, "                {key} = {child_proposal}");
    out.push_str("                start_action = trap\n");
    out.push_str("            }\n");
    out.push_str("        }\n");
    out.push_str("    }\n");
}

/// `encryption-integrity-dhgroup`, or `integrity-dhgroup` without encryption.
fn proposal(global: &GlobalConfig, with_encryption: bool) -> String {
    let dh = dh_keyword(global.dh_group);
    if with_encryption {
        format!("{}-{}-{dh}", global.encryption.as_str(), global.integrity.as_str())
    } else {
        format!("{}-{dh}", global.integrity.as_str())
    }
}

/// strongSwan keyword for a validated DH group number.
fn dh_keyword(group: u32) -> &'static str {
    match group {
        2 => "modp1024",
        5 => "modp1536",
        14 => "modp2048",
        15 => "modp3072",
        16 => "modp4096",
        17 => "modp6144",
        18 => "modp8192",
        19 => "ecp256",
        20 => "ecp384",
        _ => "ecp521",
    }
}

const fn swanctl_auth(method: AuthMethod) -> &'static str {
    match method {
        AuthMethod::Psk => "psk",
        AuthMethod::Cert | AuthMethod::Rsa => "pubkey",
    }
}

/// A swanctl section name for `tunnel`, unique within this file.
///
/// Characters outside `[A-Za-z0-9_-]` become `_`. Repeated names get the
/// tunnel index appended, then a counter until the name is free.
fn section_name(tunnel: &TunnelConfig, index: usize, seen: &mut HashSet<String>) -> String {
    let mut base: String = tunnel
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if base.is_empty() {
        base = format!("tunnel{index}");
    }
    if seen.insert(base.clone()) {
        return base;
    }

    let mut name = format!("{base}-{index}");
    let mut attempt = 1;
    while !seen.insert(name.clone()) {
        name = format!("{base}-{index}-{attempt}");
        attempt += 1;
    }
    name
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use unisec_policy::PolicyDocument;

    use super::*;

    fn policy(yaml: &str) -> ValidatedPolicy {
        PolicyDocument::from_yaml_str(yaml)
            .expect("parse")
            .validate()
            .expect("valid policy")
    }

    fn site_to_site() -> ValidatedPolicy {
        policy(
            r#"
global:
  ike_version: ikev2
  auth_method: psk
  psk: "s3cr\"t"
  encryption: aes256
  integrity: sha256
  dh_group: 14
tunnels:
  - name: t1
    mode: tunnel
    protocol: esp
    peer_ip: 203.0.113.10
    local_subnet: 10.0.0.0/24
    remote_subnet: 192.168.1.0/24
"#,
        )
    }

    #[test]
    fn renders_tunnel_mode_connection() {
        let conf = render_swanctl(&site_to_site()).expect("render");
        assert!(conf.contains("    t1 {\n"), "{conf}");
        assert!(conf.contains("version = 2"));
        assert!(conf.contains("remote_addrs = 203.0.113.10"));
        assert!(conf.contains("proposals = aes256-sha256-modp2048"));
        assert!(conf.contains("auth = psk"));
        assert!(conf.contains("mode = tunnel"));
        assert!(conf.contains("local_ts = 10.0.0.0/24"));
        assert!(conf.contains("remote_ts = 192.168.1.0/24"));
        assert!(conf.contains("esp_proposals = aes256-sha256-modp2048"));
    }

    #[test]
    fn psk_secret_is_escaped() {
        let conf = render_swanctl(&site_to_site()).expect("render");
        assert!(conf.contains("secrets {"));
        assert!(conf.contains(r#"secret = "s3cr\"t""#), "{conf}");
    }

    #[test]
    fn cert_auth_has_no_secrets_and_uses_pubkey() {
        let conf = render_swanctl(&policy(
            r"
global:
  ike_version: ikev1
  auth_method: cert
  encryption: 3des
  integrity: sha1
  dh_group: 2
tunnels:
  - name: legacy
    mode: transport
    protocol: ah
    peer_ip: 198.51.100.4
",
        ))
        .expect("render");
        assert!(!conf.contains("secrets"));
        assert!(conf.contains("auth = pubkey"));
        assert!(conf.contains("version = 1"));
        assert!(conf.contains("mode = transport"));
        assert!(!conf.contains("local_ts"));
        assert!(conf.contains("ah_proposals = sha1-modp1024"), "{conf}");
    }

    #[test]
    fn duplicate_names_get_distinct_sections() {
        let mut seen = HashSet::new();
        let tunnel = site_to_site().tunnels()[0].clone();
        let mut renamed = tunnel.clone();
        renamed.name = "branch office".to_owned();

        assert_eq!(section_name(&tunnel, 0, &mut seen), "t1");
        assert_eq!(section_name(&tunnel, 1, &mut seen), "t1-1");
        assert_eq!(section_name(&renamed, 2, &mut seen), "branch_office");
    }

    #[test]
    fn suffixed_name_collisions_still_get_distinct_sections() {
        let conf = render_swanctl(&policy(
            r"
global: {ike_version: ikev2, auth_method: cert, encryption: aes128, integrity: sha256, dh_group: 19}
tunnels:
  - {name: t1-2, mode: transport, protocol: esp, peer_ip: 192.0.2.1}
  - {name: t1, mode: transport, protocol: esp, peer_ip: 192.0.2.2}
  - {name: t1, mode: transport, protocol: esp, peer_ip: 192.0.2.3}
",
        ))
        .expect("render");

        // Each connection header appears once at connection depth.
        for header in ["\n    t1-2 {\n", "\n    t1 {\n", "\n    t1-2-1 {\n"] {
            assert_eq!(conf.matches(header).count(), 1, "{header:?} in\n{conf}");
        }
    }

    #[test]
    fn structural_characters_in_peer_ip_are_rejected() {
        let tampered = policy(
            r#"
global: {ike_version: ikev2, auth_method: cert, encryption: aes128, integrity: sha256, dh_group: 19}
tunnels:
  - name: t1
    mode: transport
    protocol: esp
    peer_ip: "192.0.2.1\n    }\n    injected {\n        remote_addrs = %any"
"#,
        );
        let err = render_swanctl(&tampered).expect_err("unsafe peer_ip");
        match err {
            AdapterError::UnsafeValue { tunnel, field } => {
                assert_eq!(tunnel, "t1");
                assert_eq!(field, "peer_ip");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn braces_in_subnet_are_rejected_and_nothing_is_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tampered = policy(
            r#"
global: {ike_version: ikev2, auth_method: cert, encryption: aes128, integrity: sha256, dh_group: 19}
tunnels:
  - {name: t1, mode: tunnel, protocol: esp, peer_ip: 192.0.2.1, local_subnet: "10.0.0.0/24 }", remote_subnet: 10.1.0.0/24}
"#,
        );
        let err = StrongSwanAdapter::new(dir.path().to_path_buf())
            .apply(&tampered)
            .expect_err("unsafe subnet");
        assert!(
            matches!(err, AdapterError::UnsafeValue { field: "local_subnet", .. }),
            "{err}"
        );
        assert!(!dir.path().join(CONF_FILE_NAME).exists());
    }

    #[test]
    fn dh_keywords_cover_every_allowed_group() {
        for group in unisec_policy::DH_GROUPS {
            let keyword = dh_keyword(*group);
            assert!(keyword.starts_with("modp") || keyword.starts_with("ecp"));
        }
        assert_eq!(dh_keyword(21), "ecp521");
    }

    #[test]
    fn apply_writes_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let adapter = StrongSwanAdapter::new(dir.path().to_path_buf());

        let report = adapter.apply(&site_to_site()).expect("apply succeeds");
        assert_eq!(report.adapter, "strongswan");

        let written = std::fs::read_to_string(dir.path().join(CONF_FILE_NAME)).expect("read");
        assert!(written.contains("remote_addrs = 203.0.113.10"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let mode = std::fs::metadata(adapter.config_path())
                .expect("metadata")
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn apply_into_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let adapter = StrongSwanAdapter::new(dir.path().join("nope"));
        let err = adapter.apply(&site_to_site()).expect_err("no such dir");
        assert!(matches!(err, AdapterError::Write { .. }), "{err}");
    }

    #[test]
    fn missing_reload_tool_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let adapter = StrongSwanAdapter::new(dir.path().to_path_buf())
            .with_reload(vec!["unisec-no-such-swanctl".to_owned(), "--load-all".to_owned()]);
        let err = adapter.apply(&site_to_site()).expect_err("tool missing");
        assert!(matches!(err, AdapterError::ToolNotFound(ref p) if p == "unisec-no-such-swanctl"));
    }

    #[cfg(unix)]
    #[test]
    fn reload_output_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let adapter = StrongSwanAdapter::new(dir.path().to_path_buf()).with_reload(vec![
            "sh".to_owned(),
            "-c".to_owned(),
            "echo loaded 1 connection".to_owned(),
        ]);
        let report = adapter.apply(&site_to_site()).expect("apply succeeds");
        assert!(report.output.ends_with("loaded 1 connection"), "{}", report.output);
    }
}
