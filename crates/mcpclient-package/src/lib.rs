//! Resolves DXT package manifests into stdio transports (spec §4.5).

pub mod compatibility;
pub mod manifest;
pub mod substitution;
pub mod transport;
pub mod user_config;

pub use manifest::{Compatibility, Manifest, McpConfig, McpConfigOverride, UserConfigField};
pub use transport::{resolve, PackageConfig, PackageTransport};
