//! Policy validation rules.
//!
//! Validation walks the raw document tree and builds a typed
//! [`ValidatedPolicy`] as it goes. Rules are checked in a fixed order and
//! the first violation is returned:
//!
//! 1. `global` section present
//! 2. `ike_version`, `auth_method`, `encryption`, `integrity`, `dh_group`
//! 3. `psk` present when `auth_method` is `psk`
//! 4. `tunnels` section present, a list, and non-empty
//! 5. per tunnel: `name`, `mode`, `protocol`, `peer_ip`, then the subnets
//!    when `mode` is `tunnel`
//!
//! Enum-valued fields are compared case-insensitively.

use serde_yaml::{Mapping, Value};

use crate::document::PolicyDocument;
use crate::error::{Locus, ValidationError};
use crate::model::{
    AuthMethod, Choice, DH_GROUPS, Encryption, GlobalConfig, IkeVersion, Integrity, Mode,
    Protocol, TunnelConfig, ValidatedPolicy,
};

/// Check a parsed document against every policy rule.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, in the order listed in the
/// module docs.
pub fn validate(document: &PolicyDocument) -> Result<ValidatedPolicy, ValidationError> {
    let root = document.root();
    if !root.is_null() && !root.is_mapping() {
        return Err(ValidationError::new(
            Locus::Document,
            None,
            "policy document must be a mapping with `global` and `tunnels` sections",
        ));
    }

    let global = validate_global(root.get("global"))?;
    let tunnels = validate_tunnels(root.get("tunnels"))?;

    Ok(ValidatedPolicy::new(global, tunnels))
}

fn validate_global(section: Option<&Value>) -> Result<GlobalConfig, ValidationError> {
    let Some(section) = section.filter(|v| !v.is_null()) else {
        return Err(ValidationError::new(
            Locus::Document,
            Some("global"),
            "missing global section",
        ));
    };
    let Some(global) = section.as_mapping() else {
        return Err(ValidationError::new(
            Locus::Global,
            None,
            "global section must be a mapping",
        ));
    };

    let ike_version: IkeVersion = choice(global, "ike_version", &Locus::Global)?;
    let auth_method: AuthMethod = choice(global, "auth_method", &Locus::Global)?;
    let encryption: Encryption = choice(global, "encryption", &Locus::Global)?;
    let integrity: Integrity = choice(global, "integrity", &Locus::Global)?;
    let dh_group = dh_group(global)?;

    let psk = scalar_text(global.get("psk")).filter(|k| !k.is_empty());
    if auth_method == AuthMethod::Psk && psk.is_none() {
        return Err(ValidationError::new(
            Locus::Global,
            Some("psk"),
            "psk authentication requires a non-empty 'psk' field",
        ));
    }

    Ok(GlobalConfig {
        ike_version,
        auth_method,
        psk,
        encryption,
        integrity,
        dh_group,
    })
}

fn dh_group(global: &Mapping) -> Result<u32, ValidationError> {
    let value = global.get("dh_group");
    value
        .and_then(Value::as_u64)
        .and_then(|g| u32::try_from(g).ok())
        .filter(|g| DH_GROUPS.contains(g))
        .ok_or_else(|| {
            let expected = DH_GROUPS
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            invalid_value(&Locus::Global, "dh_group", value, &expected)
        })
}

fn validate_tunnels(section: Option<&Value>) -> Result<Vec<TunnelConfig>, ValidationError> {
    let Some(section) = section.filter(|v| !v.is_null()) else {
        return Err(ValidationError::new(
            Locus::Document,
            Some("tunnels"),
            "missing tunnels section",
        ));
    };
    let Some(entries) = section.as_sequence() else {
        return Err(ValidationError::new(
            Locus::Document,
            Some("tunnels"),
            "tunnels section must be a list",
        ));
    };
    if entries.is_empty() {
        return Err(ValidationError::new(
            Locus::Document,
            Some("tunnels"),
            "at least one tunnel must be defined",
        ));
    }

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| validate_tunnel(index, entry))
        .collect()
}

fn validate_tunnel(index: usize, entry: &Value) -> Result<TunnelConfig, ValidationError> {
    let Some(tunnel) = entry.as_mapping() else {
        return Err(ValidationError::new(
            Locus::Tunnel { index, name: None },
            None,
            "tunnel entry must be a mapping",
        ));
    };

    let Some(name) = scalar_text(tunnel.get("name")) else {
        return Err(ValidationError::new(
            Locus::Tunnel { index, name: None },
            Some("name"),
            "missing 'name' field",
        ));
    };
    let locus = Locus::Tunnel {
        index,
        name: Some(name.clone()),
    };

    let mode: Mode = choice(tunnel, "mode", &locus)?;
    let protocol: Protocol = choice(tunnel, "protocol", &locus)?;
    let peer_ip = required_text(tunnel, "peer_ip", &locus, "missing 'peer_ip' field")?;

    let mut local_subnet = scalar_text(tunnel.get("local_subnet"));
    let mut remote_subnet = scalar_text(tunnel.get("remote_subnet"));
    if mode == Mode::Tunnel {
        local_subnet = Some(required_text(
            tunnel,
            "local_subnet",
            &locus,
            "tunnel mode requires 'local_subnet'",
        )?);
        remote_subnet = Some(required_text(
            tunnel,
            "remote_subnet",
            &locus,
            "tunnel mode requires 'remote_subnet'",
        )?);
    }

    Ok(TunnelConfig {
        name,
        mode,
        protocol,
        peer_ip,
        local_subnet,
        remote_subnet,
    })
}

/// Parse an enum field, lower-casing the input first.
fn choice<T: Choice>(
    mapping: &Mapping,
    field: &'static str,
    locus: &Locus,
) -> Result<T, ValidationError> {
    let value = mapping.get(field);
    value
        .and_then(Value::as_str)
        .and_then(|s| T::parse(&s.to_lowercase()))
        .ok_or_else(|| invalid_value(locus, field, value, &T::expected()))
}

fn required_text(
    mapping: &Mapping,
    field: &'static str,
    locus: &Locus,
    reason: &str,
) -> Result<String, ValidationError> {
    scalar_text(mapping.get(field))
        .ok_or_else(|| ValidationError::new(locus.clone(), Some(field), reason))
}

/// Textual form of a scalar. `null`, sequences, and mappings count as absent.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(Some(&tagged.value)),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn invalid_value(
    locus: &Locus,
    field: &'static str,
    value: Option<&Value>,
    expected: &str,
) -> ValidationError {
    let reason = match scalar_text(value) {
        Some(given) => format!("invalid {field} '{given}' (expected one of: {expected})"),
        None => format!("invalid {field}: value is missing (expected one of: {expected})"),
    };
    ValidationError::new(locus.clone(), Some(field), reason)
}
