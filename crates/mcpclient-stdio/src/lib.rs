//! The stdio transport: spawns a child process and speaks line-delimited
//! JSON-RPC over its stdin/stdout, streaming stderr as logs.

pub mod transport;

pub use transport::{StdioTransport, StdioTransportConfig};
