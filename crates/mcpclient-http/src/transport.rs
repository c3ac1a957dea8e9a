//! Streamable HTTP transport: POST for JSON-RPC with optional SSE response
//! bodies, plus a long-lived GET for server-initiated messages; supports
//! resumable sessions, keep-alive pings, and fallback to legacy SSE
//! (spec §4.4).

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use mcpclient_protocol::{JsonRpcMessage, JsonRpcRequest, RequestId, SseParser};
use mcpclient_transport_traits::{Transport, TransportError, TransportResult, TransportState};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};

use crate::config::StreamableHttpConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Streamable,
    LegacySse,
}

struct SessionInfo {
    session_id: Option<String>,
    protocol_version: Option<String>,
    keep_alive_timeout: Option<Duration>,
    legacy_post_url: Option<reqwest::Url>,
}

/// MCP's Streamable HTTP transport.
pub struct StreamableHttpTransport {
    config: StreamableHttpConfig,
    client: reqwest::Client,
    state: StdMutex<TransportState>,
    mode: StdMutex<Mode>,
    session: AsyncMutex<SessionInfo>,
    auth_token: StdMutex<Option<String>>,
    running: AtomicBool,
    get_task_started: AtomicBool,
    inbound_tx: mpsc::Sender<TransportResult<JsonRpcMessage>>,
    inbound_rx: AsyncMutex<mpsc::Receiver<TransportResult<JsonRpcMessage>>>,
    state_tx: mpsc::Sender<TransportState>,
    state_rx: AsyncMutex<mpsc::Receiver<TransportState>>,
    ping_reset: Notify,
    ping_id_counter: AtomicI64,
    in_flight: AtomicU32,
    /// A handle back to this transport's own `Arc`, used by `start()` to
    /// spawn the GET-loop/keep-alive background tasks, which need an
    /// `Arc<Self>` rather than a bare `&self`.
    self_handle: Weak<Self>,
}

const CHANNEL_CAPACITY: usize = 1024;

impl StreamableHttpTransport {
    pub fn new(config: StreamableHttpConfig) -> TransportResult<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (state_tx, state_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Ok(Arc::new_cyclic(|weak| Self {
            config,
            client,
            state: StdMutex::new(TransportState::Idle),
            mode: StdMutex::new(Mode::Streamable),
            session: AsyncMutex::new(SessionInfo {
                session_id: None,
                protocol_version: None,
                keep_alive_timeout: None,
                legacy_post_url: None,
            }),
            auth_token: StdMutex::new(None),
            running: AtomicBool::new(false),
            get_task_started: AtomicBool::new(false),
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            state_tx,
            state_rx: AsyncMutex::new(state_rx),
            ping_reset: Notify::new(),
            ping_id_counter: AtomicI64::new(-1),
            in_flight: AtomicU32::new(0),
            self_handle: weak.clone(),
        }))
    }

    /// Sets (or clears) the bearer token used on every subsequent request.
    /// Serialized through a plain mutex since it's mutated out of band from
    /// the request path (spec §5: "mutated only through a dedicated
    /// `set_authorization_token` entry point").
    pub fn set_authorization_token(&self, token: Option<String>) {
        *self.auth_token.lock().unwrap() = token;
    }

    fn set_state(&self, state: TransportState) {
        *self.state.lock().unwrap() = state;
        let _ = self.state_tx.try_send(state);
    }

    async fn build_headers(&self, accept: &str, session: &SessionInfo) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_str(accept).unwrap(),
        );
        let protocol_version = session
            .protocol_version
            .clone()
            .unwrap_or_else(|| self.config.default_protocol_version.clone());
        headers.insert(
            HeaderName::from_static("mcp-protocol-version"),
            HeaderValue::from_str(&protocol_version).unwrap(),
        );
        if let Some(session_id) = &session.session_id {
            if let Ok(value) = HeaderValue::from_str(session_id) {
                headers.insert(HeaderName::from_static("mcp-session-id"), value);
            }
        }
        if let Some(token) = self.auth_token.lock().unwrap().clone() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        headers
    }

    fn adopt_session_id(session: &mut SessionInfo, response: &reqwest::Response) {
        if let Some(value) = response.headers().get("mcp-session-id") {
            if let Ok(s) = value.to_str() {
                session.session_id = Some(s.to_string());
            }
        }
    }

    fn adopt_keep_alive(&self, session: &mut SessionInfo, response: &reqwest::Response) {
        if let Some(value) = response.headers().get("keep-alive") {
            if let Ok(s) = value.to_str() {
                if let Some(timeout_str) = parse_keep_alive_timeout(s) {
                    if let Ok(secs) = timeout_str.parse::<f64>() {
                        session.keep_alive_timeout = Some(Duration::from_secs_f64(secs));
                        self.ping_reset.notify_one();
                    }
                }
            }
        }
    }

    async fn target_url(&self, session: &SessionInfo) -> reqwest::Url {
        if *self.mode.lock().unwrap() == Mode::LegacySse {
            if let Some(url) = &session.legacy_post_url {
                return url.clone();
            }
        }
        self.config.base_url.clone()
    }

    async fn handle_event_stream_body(
        &self,
        response: reqwest::Response,
    ) -> TransportResult<()> {
        let mut stream = response.bytes_stream();
        let mut parser = SseParser::new();
        use futures::StreamExt;
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
            for event in parser.feed(&bytes) {
                if event.event.as_deref() == Some("endpoint") {
                    continue; // only meaningful on the legacy GET stream
                }
                let item = mcpclient_protocol::decode(event.data.as_bytes()).map_err(|e| {
                    TransportError::DecodeError {
                        bytes: event.data.into_bytes(),
                        cause: e.to_string(),
                    }
                });
                if self.inbound_tx.send(item).await.is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn ensure_legacy_get_started(self: &Arc<Self>) {
        if self.get_task_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            this.run_get_loop().await;
        });
    }

    async fn run_get_loop(self: Arc<Self>) {
        let mut attempt = 0u32;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return;
            }
            let session = self.session.lock().await;
            let headers = self.build_headers("text/event-stream", &session).await;
            let url = self.config.base_url.clone();
            drop(session);

            match self.client.get(url).headers(headers).send().await {
                Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
                    tracing::debug!("long-lived GET stream not supported; continuing POST-only");
                    return;
                }
                Ok(response) if response.status().is_success() => {
                    attempt = 0;
                    self.set_state(TransportState::Connected);
                    {
                        let mut session = self.session.lock().await;
                        Self::adopt_session_id(&mut session, &response);
                    }
                    let _ = self.stream_legacy_events(response).await;
                    self.set_state(TransportState::Disconnected);
                }
                _ => {
                    self.set_state(TransportState::Disconnected);
                }
            }

            attempt += 1;
            if attempt > self.config.max_reconnect_attempts {
                let _ = self
                    .inbound_tx
                    .send(Err(TransportError::PeerClosed))
                    .await;
                return;
            }
            let delay = std::cmp::min(
                self.config.reconnect_base_delay * 2u32.pow(attempt.min(10)),
                self.config.reconnect_max_delay,
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn stream_legacy_events(&self, response: reqwest::Response) -> TransportResult<()> {
        use futures::StreamExt;
        let mut stream = response.bytes_stream();
        let mut parser = SseParser::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
            for event in parser.feed(&bytes) {
                if event.event.as_deref() == Some("endpoint") {
                    if let Some(url) = parse_endpoint_event(&event.data, &self.config.base_url) {
                        let mut session = self.session.lock().await;
                        session.legacy_post_url = Some(url);
                        *self.mode.lock().unwrap() = Mode::LegacySse;
                    }
                    continue;
                }
                let item = mcpclient_protocol::decode(event.data.as_bytes()).map_err(|e| {
                    TransportError::DecodeError {
                        bytes: event.data.into_bytes(),
                        cause: e.to_string(),
                    }
                });
                if self.inbound_tx.send(item).await.is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn send_ping(&self) {
        let id = RequestId::Integer(self.ping_id_counter.fetch_sub(1, Ordering::SeqCst));
        let request = JsonRpcRequest::new(id, "ping", None);
        let _ = self.send(JsonRpcMessage::Request(request)).await;
    }
}

fn parse_keep_alive_timeout(header_value: &str) -> Option<String> {
    header_value.split(',').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("timeout=").map(|v| v.trim().to_string())
    })
}

fn parse_endpoint_event(data: &str, base_url: &reqwest::Url) -> Option<reqwest::Url> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(data) {
        if let Some(uri) = value.get("uri").and_then(|v| v.as_str()) {
            return base_url.join(uri).ok();
        }
    }
    base_url.join(data.trim()).ok()
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn start(&self) -> TransportResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.set_state(TransportState::Starting);
        self.set_state(TransportState::Connected);
        if let Some(handle) = self.self_handle.upgrade() {
            spawn_background_tasks(handle).await;
        }
        Ok(())
    }

    async fn send(&self, message: JsonRpcMessage) -> TransportResult<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TransportError::NotStarted);
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.ping_reset.notify_one();
        let result = self.send_inner(message).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn receive(&self) -> TransportResult<Option<JsonRpcMessage>> {
        let mut rx = self.inbound_rx.lock().await;
        match rx.recv().await {
            Some(Ok(msg)) => Ok(Some(msg)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn receive_logs(&self) -> TransportResult<Option<String>> {
        Ok(None) // HTTP transports have no process stderr to stream.
    }

    async fn receive_connection_state(&self) -> TransportResult<Option<TransportState>> {
        let mut rx = self.state_rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> TransportResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let session = self.session.lock().await;
        if session.session_id.is_some() {
            let headers = self.build_headers("application/json", &session).await;
            let _ = self
                .client
                .delete(self.config.base_url.clone())
                .headers(headers)
                .send()
                .await;
        }
        drop(session);
        self.set_state(TransportState::Closed);
        Ok(())
    }

    fn set_bearer_token(&self, token: Option<String>) {
        self.set_authorization_token(token);
    }
}

impl StreamableHttpTransport {
    async fn send_inner(&self, message: JsonRpcMessage) -> TransportResult<()> {
        let session = self.session.lock().await;
        let url = self.target_url(&session).await;
        let headers = self
            .build_headers("application/json, text/event-stream", &session)
            .await;
        drop(session);

        let body = serde_json::to_vec(&message).map_err(|e| TransportError::DecodeError {
            bytes: Vec::new(),
            cause: e.to_string(),
        })?;

        let response = self
            .client
            .post(url)
            .headers(headers)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(TransportError::AuthRequired);
        }

        if (response.status() == StatusCode::METHOD_NOT_ALLOWED
            || response.status() == StatusCode::NOT_FOUND)
            && *self.mode.lock().unwrap() == Mode::Streamable
        {
            *self.mode.lock().unwrap() = Mode::LegacySse;
            return Err(TransportError::HttpError {
                status: response.status().as_u16(),
                body: "streamable endpoint unavailable; falling back to legacy SSE".to_string(),
                decoded_rpc_error: None,
            });
        }

        if !response.status().is_success() && response.status() != StatusCode::ACCEPTED {
            let status = response.status().as_u16();
            let body_text = response.text().await.unwrap_or_default();
            let decoded = serde_json::from_str::<serde_json::Value>(&body_text)
                .ok()
                .and_then(|v| v.get("error").cloned())
                .and_then(|e| serde_json::from_value(e).ok());
            return Err(TransportError::HttpError {
                status,
                body: body_text,
                decoded_rpc_error: decoded,
            });
        }

        {
            let mut session = self.session.lock().await;
            Self::adopt_session_id(&mut session, &response);
            self.adopt_keep_alive(&mut session, &response);
        }

        if response.status() == StatusCode::ACCEPTED {
            return Ok(()); // no body: e.g. a notification acknowledged
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.starts_with("text/event-stream") {
            self.handle_event_stream_body(response).await?;
        } else {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
            if !bytes.is_empty() {
                let item = mcpclient_protocol::decode(&bytes).map_err(|e| {
                    TransportError::DecodeError {
                        bytes: bytes.to_vec(),
                        cause: e.to_string(),
                    }
                });
                let _ = self.inbound_tx.send(item).await;
            }
        }

        Ok(())
    }
}

/// Spawns the self-scheduled keep-alive ping loop and (for streamable mode)
/// the long-lived GET stream. `Transport::start()` calls this itself once
/// the transport is marked running.
pub async fn spawn_background_tasks(transport: Arc<StreamableHttpTransport>) {
    transport.ensure_legacy_get_started().await;

    let ping_transport = transport.clone();
    tokio::spawn(async move {
        loop {
            if !ping_transport.running.load(Ordering::SeqCst) {
                return;
            }
            let timeout = ping_transport.session.lock().await.keep_alive_timeout;
            let Some(timeout) = timeout else {
                ping_transport.ping_reset.notified().await;
                continue;
            };
            let interval = timeout.mul_f64(0.8);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if ping_transport.in_flight.load(Ordering::SeqCst) == 0 {
                        ping_transport.send_ping().await;
                    }
                }
                _ = ping_transport.ping_reset.notified() => {}
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timeout_param_from_keep_alive_header() {
        assert_eq!(
            parse_keep_alive_timeout("timeout=5, max=100"),
            Some("5".to_string())
        );
        assert_eq!(parse_keep_alive_timeout("max=100"), None);
    }

    #[test]
    fn parses_endpoint_event_json_form() {
        let base = reqwest::Url::parse("http://localhost:8080/mcp").unwrap();
        let url = parse_endpoint_event(r#"{"uri":"/mcp/messages"}"#, &base).unwrap();
        assert_eq!(url.path(), "/mcp/messages");
    }

    #[test]
    fn parses_endpoint_event_plain_string_form() {
        let base = reqwest::Url::parse("http://localhost:8080/mcp").unwrap();
        let url = parse_endpoint_event("/mcp/messages", &base).unwrap();
        assert_eq!(url.path(), "/mcp/messages");
    }

    #[tokio::test]
    async fn send_before_start_fails_not_started() {
        let config = StreamableHttpConfig::new(reqwest::Url::parse("http://localhost:1").unwrap());
        let transport = StreamableHttpTransport::new(config).unwrap();
        let err = transport
            .send(JsonRpcMessage::Notification(
                mcpclient_protocol::JsonRpcNotification::new("ping", None),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotStarted));
    }

    #[tokio::test]
    async fn close_before_start_is_idempotent() {
        let config = StreamableHttpConfig::new(reqwest::Url::parse("http://localhost:1").unwrap());
        let transport = StreamableHttpTransport::new(config).unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn session_id_from_response_header_propagates_to_next_request() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).insert_header("mcp-session-id", "sess-abc"))
            .mount(&server)
            .await;

        let config = StreamableHttpConfig::new(reqwest::Url::parse(&server.uri()).unwrap());
        let transport = StreamableHttpTransport::new(config).unwrap();
        transport.start().await.unwrap();

        transport
            .send(JsonRpcMessage::Notification(
                mcpclient_protocol::JsonRpcNotification::new("first", None),
            ))
            .await
            .unwrap();
        transport
            .send(JsonRpcMessage::Notification(
                mcpclient_protocol::JsonRpcNotification::new("second", None),
            ))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let posts: Vec<_> = requests
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .collect();
        assert_eq!(posts.len(), 2);
        assert!(posts[0].headers.get("mcp-session-id").is_none());
        assert_eq!(
            posts[1].headers.get("mcp-session-id").unwrap().to_str().unwrap(),
            "sess-abc"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_ping_fires_after_advertised_timeout() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202).insert_header("keep-alive", "timeout=1"))
            .mount(&server)
            .await;

        let config = StreamableHttpConfig::new(reqwest::Url::parse(&server.uri()).unwrap());
        let transport = StreamableHttpTransport::new(config).unwrap();
        transport.start().await.unwrap();

        transport
            .send(JsonRpcMessage::Notification(
                mcpclient_protocol::JsonRpcNotification::new("first", None),
            ))
            .await
            .unwrap();

        // With keep-alive timeout=1s the ping loop schedules itself at 0.8s;
        // under paused time this sleep drives the clock forward on its own.
        tokio::time::sleep(Duration::from_millis(850)).await;

        let requests = server.received_requests().await.unwrap();
        let posts: Vec<_> = requests
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .collect();
        assert_eq!(posts.len(), 2, "expected the initial send plus one keep-alive ping");
        let ping_body: serde_json::Value = serde_json::from_slice(&posts[1].body).unwrap();
        assert_eq!(ping_body["method"], "ping");
    }
}
