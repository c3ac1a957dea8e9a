//! The Streamable HTTP transport: POST+SSE/JSON with legacy SSE fallback,
//! resumable sessions, and keep-alive pings.

pub mod config;
pub mod transport;

pub use config::StreamableHttpConfig;
pub use transport::{spawn_background_tasks, StreamableHttpTransport};
