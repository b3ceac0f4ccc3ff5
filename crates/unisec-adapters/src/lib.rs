//! Platform adapters for validated IPsec policies.
//!
//! An adapter turns a [`unisec_policy::ValidatedPolicy`] into host
//! configuration. Linux is handled in-process by rendering a swanctl
//! configuration ([`strongswan`]). Windows and macOS hand the policy to a
//! platform script through a transient JSON file ([`script`]). The
//! [`AdapterGateway`] picks the adapter for a [`Platform`] and runs it.

pub mod adapter;
pub mod error;
pub mod gateway;
pub mod platform;
pub mod script;
pub mod strongswan;

pub use adapter::{Adapter, AdapterReport};
pub use error::{AdapterError, GatewayError};
pub use gateway::{AdapterGateway, AdapterSettings, LinuxSettings, ScriptSettings};
pub use platform::Platform;
pub use script::ScriptAdapter;
pub use strongswan::StrongSwanAdapter;
