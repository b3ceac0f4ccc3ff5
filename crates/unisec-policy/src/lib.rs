//! Unified IPsec policy documents: model, loading, and validation.
//!
//! `unisec-policy` turns a platform-agnostic policy file into a typed
//! [`ValidatedPolicy`]. Loading and validation are separate steps so that
//! callers can report "file missing", "not YAML", and "breaks a rule" as
//! distinct failures.
//!
//! ```
//! use unisec_policy::PolicyDocument;
//!
//! let doc = PolicyDocument::from_yaml_str(
//!     "global:\n  ike_version: ikev2\n  auth_method: cert\n  encryption: aes128\n  \
//!      integrity: sha256\n  dh_group: 19\n\
//!      tunnels:\n  - name: hq\n    mode: transport\n    protocol: esp\n    peer_ip: 192.0.2.10\n",
//! )
//! .unwrap();
//! let policy = doc.validate().unwrap();
//! assert_eq!(policy.tunnels()[0].name, "hq");
//! ```

pub mod document;
pub mod error;
pub mod model;
mod validate;

pub use document::{PolicyDocument, default_policy_paths, resolve_policy_path};
pub use error::{Locus, PolicyError, ValidationError};
pub use model::{
    AuthMethod, Choice, DH_GROUPS, Encryption, GlobalConfig, IkeVersion, Integrity, Mode,
    Protocol, TunnelConfig, ValidatedPolicy,
};
pub use validate::validate;
