//! Typed policy model produced by validation.
//!
//! Every enum here serializes to the lower-case token used in policy
//! documents, so a [`ValidatedPolicy`] written back out as JSON is
//! one-to-one with what the adapters expect to read.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A closed set of lower-case tokens accepted for one policy field.
pub trait Choice: Sized + Copy + 'static {
    /// Every accepted value, in the order they are listed in error messages.
    const VARIANTS: &'static [Self];

    /// The token as it appears in a policy document.
    fn as_str(self) -> &'static str;

    /// Match an already-normalized (lower-case) token.
    fn parse(token: &str) -> Option<Self> {
        Self::VARIANTS.iter().copied().find(|v| v.as_str() == token)
    }

    /// Comma-separated list of accepted tokens.
    fn expected() -> String {
        Self::VARIANTS
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// IKE protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IkeVersion {
    /// IKEv1 (RFC 2409).
    Ikev1,
    /// IKEv2 (RFC 7296).
    Ikev2,
}

impl Choice for IkeVersion {
    const VARIANTS: &'static [Self] = &[Self::Ikev1, Self::Ikev2];

    fn as_str(self) -> &'static str {
        match self {
            Self::Ikev1 => "ikev1",
            Self::Ikev2 => "ikev2",
        }
    }
}

/// Peer authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Pre-shared key.
    Psk,
    /// X.509 certificate.
    Cert,
    /// Raw RSA public key.
    Rsa,
}

impl Choice for AuthMethod {
    const VARIANTS: &'static [Self] = &[Self::Psk, Self::Cert, Self::Rsa];

    fn as_str(self) -> &'static str {
        match self {
            Self::Psk => "psk",
            Self::Cert => "cert",
            Self::Rsa => "rsa",
        }
    }
}

/// Bulk encryption algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encryption {
    /// AES-CBC with a 128-bit key.
    #[serde(rename = "aes128")]
    Aes128,
    /// AES-CBC with a 192-bit key.
    #[serde(rename = "aes192")]
    Aes192,
    /// AES-CBC with a 256-bit key.
    #[serde(rename = "aes256")]
    Aes256,
    /// Triple DES.
    #[serde(rename = "3des")]
    TripleDes,
}

impl Choice for Encryption {
    const VARIANTS: &'static [Self] = &[Self::Aes128, Self::Aes192, Self::Aes256, Self::TripleDes];

    fn as_str(self) -> &'static str {
        match self {
            Self::Aes128 => "aes128",
            Self::Aes192 => "aes192",
            Self::Aes256 => "aes256",
            Self::TripleDes => "3des",
        }
    }
}

/// Integrity (HMAC) algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrity {
    /// HMAC-SHA1-96.
    Sha1,
    /// HMAC-SHA2-256-128.
    Sha256,
    /// HMAC-SHA2-384-192.
    Sha384,
    /// HMAC-SHA2-512-256.
    Sha512,
    /// HMAC-MD5-96.
    Md5,
}

impl Choice for Integrity {
    const VARIANTS: &'static [Self] = &[
        Self::Sha1,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Md5,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Md5 => "md5",
        }
    }
}

/// IPsec encapsulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Whole packets are encapsulated between gateways; needs both subnets.
    Tunnel,
    /// Only the payload is protected, host to host.
    Transport,
}

impl Choice for Mode {
    const VARIANTS: &'static [Self] = &[Self::Tunnel, Self::Transport];

    fn as_str(self) -> &'static str {
        match self {
            Self::Tunnel => "tunnel",
            Self::Transport => "transport",
        }
    }
}

/// IPsec protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Encapsulating Security Payload.
    Esp,
    /// Authentication Header.
    Ah,
}

impl Choice for Protocol {
    const VARIANTS: &'static [Self] = &[Self::Esp, Self::Ah];

    fn as_str(self) -> &'static str {
        match self {
            Self::Esp => "esp",
            Self::Ah => "ah",
        }
    }
}

macro_rules! display_as_token {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_token!(IkeVersion, AuthMethod, Encryption, Integrity, Mode, Protocol);

/// Diffie-Hellman groups a policy may select.
pub const DH_GROUPS: &[u32] = &[2, 5, 14, 15, 16, 17, 18, 19, 20, 21];

/// Policy-wide IKE and ESP parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// IKE version used for every tunnel.
    pub ike_version: IkeVersion,
    /// How peers authenticate.
    pub auth_method: AuthMethod,
    /// Pre-shared key. Always present when `auth_method` is `psk`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psk: Option<String>,
    /// Encryption algorithm.
    pub encryption: Encryption,
    /// Integrity algorithm.
    pub integrity: Integrity,
    /// Diffie-Hellman group, one of [`DH_GROUPS`].
    pub dh_group: u32,
}

/// One tunnel definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Operator-facing name. Not required to be unique.
    pub name: String,
    /// Encapsulation mode.
    pub mode: Mode,
    /// IPsec protocol.
    pub protocol: Protocol,
    /// Remote peer address, passed through unchecked.
    pub peer_ip: String,
    /// Local traffic selector. Always present in tunnel mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_subnet: Option<String>,
    /// Remote traffic selector. Always present in tunnel mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_subnet: Option<String>,
}

/// A policy that has passed every validation rule.
///
/// Only [`crate::validate`] builds one, so holding a `ValidatedPolicy` is
/// proof that the document was checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedPolicy {
    global: GlobalConfig,
    tunnels: Vec<TunnelConfig>,
}

impl ValidatedPolicy {
    pub(crate) const fn new(global: GlobalConfig, tunnels: Vec<TunnelConfig>) -> Self {
        Self { global, tunnels }
    }

    /// Policy-wide parameters.
    #[must_use]
    pub const fn global(&self) -> &GlobalConfig {
        &self.global
    }

    /// Tunnels in document order. Never empty.
    #[must_use]
    pub fn tunnels(&self) -> &[TunnelConfig] {
        &self.tunnels
    }
}
