//! OAuth metadata discovery and token exchange for authorizing against an
//! MCP server (spec §4.8).

pub mod discovery;
pub mod error;
pub mod registration;
pub mod token;
pub mod types;

pub use discovery::discover;
pub use error::AuthError;
pub use registration::register_client;
pub use token::{exchange_code, TokenExchangeRequest};
