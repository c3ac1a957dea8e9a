//! Configuration for the streamable HTTP transport.

use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct StreamableHttpConfig {
    pub base_url: Url,
    pub default_protocol_version: String,
    pub request_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
}

impl StreamableHttpConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            default_protocol_version: mcpclient_protocol::types::DEFAULT_PROTOCOL_VERSION
                .to_string(),
            request_timeout: Duration::from_secs(30),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_millis(250),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }
}
