//! A from-scratch Draft 2020-12 JSON Schema validator (spec §4.7), used to
//! validate tool-input payloads and DXT user-config values.

pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod format;
pub mod numeric;
pub mod regex_guard;
pub mod validator;

pub use config::ValidatorConfig;
pub use error::SchemaError;
pub use validator::{validate, ValidationResult};
