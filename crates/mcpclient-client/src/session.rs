//! The session client (spec §4.6): version negotiation, capability gating,
//! typed MCP operations, and server-to-client request handling.
//!
//! Grounded on the teacher's `client/core.rs` for the `initialize` exchange
//! shape (build `ClientCapabilities` from what's installed, send
//! `initialize`, store the result, send `notifications/initialized`) and
//! `types/capabilities.rs` for the capability-gating checks, reusing this
//! workspace's `ServerCapabilities::supports` directly. Unlike the teacher's
//! `Client<T: Transport>`, this client holds `Arc<dyn Transport>` — the
//! dispatcher is already type-erased over the transport, so there is no
//! remaining benefit to monomorphizing the session client itself (noted in
//! DESIGN.md).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use mcpclient_protocol::types::{
    CallToolResult, Capability, ClientCapabilities, CompleteArgument, CompleteRequest,
    CompleteResult, EmptyResult, GetPromptResult, Implementation, InitializeRequest,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, ReadResourceResult, Root, RootsCapability, SUPPORTED_PROTOCOL_VERSIONS,
    ServerCapabilities, SubscribeRequest, UnsubscribeRequest,
};
use mcpclient_protocol::{IdGenerator, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest};
use mcpclient_transport_traits::Transport;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::error::{SessionError, SessionResult};
use crate::roots::RootsStore;
use crate::sampling::SamplingHandler;
use crate::streams::{ErrorEvent, Streams};

/// Builds a `SessionClient` before it is connected.
pub struct SessionClientBuilder {
    transport: Arc<dyn Transport>,
    id_gen: Arc<dyn IdGenerator>,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
    client_info: Implementation,
}

impl SessionClientBuilder {
    pub fn new(transport: Arc<dyn Transport>, id_gen: Arc<dyn IdGenerator>, client_info: Implementation) -> Self {
        Self {
            transport,
            id_gen,
            sampling_handler: None,
            client_info,
        }
    }

    pub fn with_sampling_handler(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.sampling_handler = Some(handler);
        self
    }

    pub fn build(self) -> SessionClient {
        let streams = Arc::new(Streams::new());
        let roots = Arc::new(RootsStore::new());
        let dispatcher = Dispatcher::new(streams.clone(), roots.clone(), self.sampling_handler);
        SessionClient {
            transport: self.transport,
            id_gen: self.id_gen,
            client_info: self.client_info,
            dispatcher,
            streams,
            roots,
            connected: AtomicBool::new(false),
            server_capabilities: StdMutex::new(None),
            negotiated_version: StdMutex::new(None),
        }
    }
}

pub struct SessionClient {
    transport: Arc<dyn Transport>,
    id_gen: Arc<dyn IdGenerator>,
    client_info: Implementation,
    dispatcher: Arc<Dispatcher>,
    streams: Arc<Streams>,
    roots: Arc<RootsStore>,
    connected: AtomicBool,
    server_capabilities: StdMutex<Option<ServerCapabilities>>,
    negotiated_version: StdMutex<Option<String>>,
}

impl SessionClient {
    /// Starts the transport, negotiates the protocol version and
    /// capabilities, and begins consuming the inbound message and log
    /// streams (spec §4.6 `connect`).
    pub async fn connect(&self) -> SessionResult<InitializeResult> {
        self.transport.start().await.map_err(|e| {
            self.streams.emit_error(ErrorEvent::TransportStartFailure {
                cause: e.to_string(),
            });
            SessionError::from(e)
        })?;

        self.dispatcher.spawn_routing_task(self.transport.clone());
        self.dispatcher.spawn_log_forwarding_task(self.transport.clone());

        let client_capabilities = ClientCapabilities {
            roots: Some(RootsCapability {
                list_changed: Some(true),
            }),
            ..Default::default()
        };

        let request = InitializeRequest {
            protocol_version: SUPPORTED_PROTOCOL_VERSIONS[0].to_string(),
            capabilities: client_capabilities,
            client_info: self.client_info.clone(),
        };

        let result: InitializeResult = self.request("initialize", Some(serde_json::to_value(request)?)).await?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&result.protocol_version.as_str()) {
            return Err(SessionError::UnsupportedProtocol(result.protocol_version.clone()));
        }

        *self.negotiated_version.lock().expect("mutex poisoned") = Some(result.protocol_version.clone());
        *self.server_capabilities.lock().expect("mutex poisoned") = Some(result.capabilities.clone());
        self.connected.store(true, Ordering::SeqCst);

        self.notify("notifications/initialized", None).await?;

        Ok(result)
    }

    /// Cancels every in-flight request with `session-closed`, closes the
    /// transport, and drains the subscriber streams (spec §4.6
    /// `disconnect`).
    pub async fn disconnect(&self) -> SessionResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.dispatcher.fail_all("session-closed");
        self.transport.close().await?;
        Ok(())
    }

    pub fn capabilities(&self) -> Option<ServerCapabilities> {
        self.server_capabilities.lock().expect("mutex poisoned").clone()
    }

    pub fn negotiated_version(&self) -> Option<String> {
        self.negotiated_version.lock().expect("mutex poisoned").clone()
    }

    pub fn set_roots(&self, roots: Vec<Root>) {
        self.roots.set(roots);
    }

    pub fn roots(&self) -> Vec<Root> {
        self.roots.get()
    }

    pub fn stream_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.streams.stream_errors()
    }

    pub fn stream_logs(&self) -> broadcast::Receiver<mcpclient_protocol::types::LogMessage> {
        self.streams.stream_logs()
    }

    pub fn stream_progress(&self) -> broadcast::Receiver<mcpclient_protocol::types::ProgressNotificationParams> {
        self.streams.stream_progress()
    }

    pub fn stream_notifications(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.streams.stream_notifications()
    }

    // --- Typed operations (spec §4.6) --------------------------------------

    pub async fn list_prompts(&self, cursor: Option<String>) -> SessionResult<ListPromptsResult> {
        self.require(Capability::Prompts)?;
        self.request("prompts/list", cursor.map(|c| serde_json::json!({"cursor": c})))
            .await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> SessionResult<GetPromptResult> {
        self.require(Capability::Prompts)?;
        self.request(
            "prompts/get",
            Some(serde_json::json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    pub async fn list_resources(&self, cursor: Option<String>) -> SessionResult<ListResourcesResult> {
        self.require(Capability::Resources)?;
        self.request("resources/list", cursor.map(|c| serde_json::json!({"cursor": c})))
            .await
    }

    pub async fn read_resource(&self, uri: &str) -> SessionResult<ReadResourceResult> {
        self.require(Capability::Resources)?;
        self.request("resources/read", Some(serde_json::json!({ "uri": uri })))
            .await
    }

    pub async fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> SessionResult<ListResourceTemplatesResult> {
        self.require(Capability::Resources)?;
        self.request(
            "resources/templates/list",
            cursor.map(|c| serde_json::json!({"cursor": c})),
        )
        .await
    }

    pub async fn list_tools(&self, cursor: Option<String>) -> SessionResult<ListToolsResult> {
        self.require(Capability::Tools)?;
        self.request("tools/list", cursor.map(|c| serde_json::json!({"cursor": c})))
            .await
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        cancellation: Option<CancellationToken>,
    ) -> SessionResult<CallToolResult> {
        self.require(Capability::Tools)?;
        self.request_cancellable(
            "tools/call",
            Some(serde_json::json!({ "name": name, "arguments": arguments })),
            cancellation,
        )
        .await
    }

    pub async fn complete(
        &self,
        reference: Value,
        argument: CompleteArgument,
        cancellation: Option<CancellationToken>,
    ) -> SessionResult<CompleteResult> {
        self.require(Capability::Completions)?;
        let params = CompleteRequest { reference, argument };
        self.request_cancellable("completion/complete", Some(serde_json::to_value(params)?), cancellation)
            .await
    }

    pub async fn ping(&self) -> SessionResult<EmptyResult> {
        self.request("ping", None).await
    }

    pub async fn subscribe(&self, uri: &str) -> SessionResult<EmptyResult> {
        self.require(Capability::ResourceSubscribe)?;
        let params = SubscribeRequest { uri: uri.to_string() };
        self.request("resources/subscribe", Some(serde_json::to_value(params)?))
            .await
    }

    pub async fn unsubscribe(&self, uri: &str) -> SessionResult<EmptyResult> {
        self.require(Capability::ResourceSubscribe)?;
        let params = UnsubscribeRequest { uri: uri.to_string() };
        self.request("resources/unsubscribe", Some(serde_json::to_value(params)?))
            .await
    }

    // --- Internals -----------------------------------------------------------

    fn require(&self, capability: Capability) -> SessionResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SessionError::NotConnected);
        }
        let caps = self.server_capabilities.lock().expect("mutex poisoned");
        match caps.as_ref() {
            Some(caps) if caps.supports(capability) => Ok(()),
            Some(_) => Err(SessionError::CapabilityUnsupported(capability.name())),
            None => Err(SessionError::NotConnected),
        }
    }

    async fn request<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> SessionResult<R> {
        self.request_cancellable(method, params, None).await
    }

    /// The correlation algorithm (spec §4.6 steps 1-7): acquire a fresh ID,
    /// register a waiter, send, then await either the response or an
    /// external cancellation — sending `notifications/cancelled` and
    /// removing the waiter if the cancellation token fires first.
    async fn request_cancellable<R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        cancellation: Option<CancellationToken>,
    ) -> SessionResult<R> {
        let id = self.id_gen.next_id();
        let rx = self.dispatcher.register(id.clone());

        let request = JsonRpcRequest::new(id.clone(), method, params);
        if let Err(e) = self.transport.send(JsonRpcMessage::Request(request)).await {
            self.dispatcher.cancel_locally(&id);
            return Err(e.into());
        }

        let outcome = match cancellation {
            Some(token) => {
                tokio::select! {
                    result = rx => result,
                    () = token.cancelled() => {
                        self.dispatcher.cancel_locally(&id);
                        let _ = self
                            .notify(
                                "notifications/cancelled",
                                Some(serde_json::json!({ "requestId": id, "reason": "client cancelled" })),
                            )
                            .await;
                        return Err(SessionError::Cancelled);
                    }
                }
            }
            None => rx.await,
        };

        match outcome {
            Ok(Ok(value)) => serde_json::from_value(value).map_err(|e| SessionError::Decode(e.to_string())),
            Ok(Err(rpc_error)) => Err(SessionError::Remote(rpc_error)),
            Err(_) => Err(SessionError::SessionClosed),
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> SessionResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.transport
            .send(JsonRpcMessage::Notification(notification))
            .await
            .map_err(SessionError::from)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcpclient_protocol::types::ToolsCapability;
    use mcpclient_protocol::{JsonRpcResponse, MonotonicIdGenerator};
    use mcpclient_transport_traits::{TransportResult, TransportState};
    use tokio::sync::mpsc;

    /// A fully in-memory transport that answers `initialize` with canned
    /// capabilities and otherwise echoes whatever `queue_response` staged,
    /// so the correlation logic can be exercised without a real process.
    struct MockTransport {
        outbound: mpsc::UnboundedSender<JsonRpcMessage>,
        inbound_tx: mpsc::UnboundedSender<JsonRpcMessage>,
        inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<JsonRpcMessage>>,
    }

    impl MockTransport {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<JsonRpcMessage>) {
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    outbound: outbound_tx,
                    inbound_tx,
                    inbound_rx: tokio::sync::Mutex::new(inbound_rx),
                }),
                outbound_rx,
            )
        }

        fn push_inbound(&self, message: JsonRpcMessage) {
            let _ = self.inbound_tx.send(message);
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn start(&self) -> TransportResult<()> {
            Ok(())
        }

        async fn send(&self, message: JsonRpcMessage) -> TransportResult<()> {
            let _ = self.outbound.send(message);
            Ok(())
        }

        async fn receive(&self) -> TransportResult<Option<JsonRpcMessage>> {
            Ok(self.inbound_rx.lock().await.recv().await)
        }

        async fn receive_logs(&self) -> TransportResult<Option<String>> {
            std::future::pending().await
        }

        async fn receive_connection_state(&self) -> TransportResult<Option<TransportState>> {
            std::future::pending().await
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    fn build_client(transport: Arc<MockTransport>) -> SessionClient {
        SessionClientBuilder::new(
            transport,
            Arc::new(MonotonicIdGenerator::default()),
            Implementation {
                name: "test-client".to_string(),
                title: None,
                version: "0.0.0".to_string(),
            },
        )
        .build()
    }

    /// Drives one request/response round trip: waits for the next outbound
    /// request on `outbound`, then immediately feeds back a success
    /// response carrying `result` for that request's ID.
    async fn auto_respond_once(
        transport: &Arc<MockTransport>,
        outbound: &mut mpsc::UnboundedReceiver<JsonRpcMessage>,
        result: Value,
    ) {
        let JsonRpcMessage::Request(req) = outbound.recv().await.unwrap() else {
            panic!("expected a request");
        };
        transport.push_inbound(JsonRpcMessage::Response(JsonRpcResponse::success(
            req.id, result,
        )));
    }

    #[tokio::test]
    async fn connect_negotiates_capabilities_and_version() {
        let (transport, mut outbound) = MockTransport::new();
        let client = build_client(transport.clone());

        let connect = tokio::spawn({
            let client = Arc::new(client);
            let client2 = client.clone();
            async move {
                let result = client2.connect().await;
                (client, result)
            }
        });

        auto_respond_once(
            &transport,
            &mut outbound,
            serde_json::json!({
                "protocolVersion": "2025-06-18",
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "fixture-server", "version": "1.0" }
            }),
        )
        .await;
        // `notifications/initialized` follows; drain it so the channel
        // doesn't fill.
        let _ = outbound.recv().await;

        let (client, result) = connect.await.unwrap();
        let init = result.unwrap();
        assert_eq!(init.protocol_version, "2025-06-18");
        assert!(client.capabilities().unwrap().supports(Capability::Tools));
    }

    #[tokio::test]
    async fn unsupported_protocol_version_fails_connect() {
        let (transport, mut outbound) = MockTransport::new();
        let client = build_client(transport.clone());

        let connect = tokio::spawn(async move { client.connect().await });
        auto_respond_once(
            &transport,
            &mut outbound,
            serde_json::json!({
                "protocolVersion": "1999-01-01",
                "capabilities": {},
                "serverInfo": { "name": "fixture-server", "version": "1.0" }
            }),
        )
        .await;

        let err = connect.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::UnsupportedProtocol(_)));
    }

    #[tokio::test]
    async fn gated_operation_fails_locally_before_connect() {
        let (transport, _outbound) = MockTransport::new();
        let client = build_client(transport);
        let err = client.list_tools(None).await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
    }

    #[tokio::test]
    async fn gated_operation_fails_when_capability_not_advertised() {
        let (transport, mut outbound) = MockTransport::new();
        let client = Arc::new(build_client(transport.clone()));

        let connect = tokio::spawn({
            let client = client.clone();
            async move { client.connect().await }
        });
        auto_respond_once(
            &transport,
            &mut outbound,
            serde_json::json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "serverInfo": { "name": "fixture-server", "version": "1.0" }
            }),
        )
        .await;
        let _ = outbound.recv().await;
        connect.await.unwrap().unwrap();

        let err = client.list_tools(None).await.unwrap_err();
        assert!(matches!(err, SessionError::CapabilityUnsupported("tools")));
    }

    #[tokio::test]
    async fn disconnect_fails_in_flight_requests_with_session_closed() {
        let (transport, mut outbound) = MockTransport::new();
        let client = Arc::new(build_client(transport.clone()));

        let connect = tokio::spawn({
            let client = client.clone();
            async move { client.connect().await }
        });
        auto_respond_once(
            &transport,
            &mut outbound,
            serde_json::json!({
                "protocolVersion": "2025-06-18",
                "capabilities": { "tools": ToolsCapability::default() },
                "serverInfo": { "name": "fixture-server", "version": "1.0" }
            }),
        )
        .await;
        let _ = outbound.recv().await;
        connect.await.unwrap().unwrap();

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.list_tools(None).await }
        });
        // Drain the outbound `tools/list` request but never answer it.
        let _ = outbound.recv().await;
        client.disconnect().await.unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::SessionClosed));
    }

    #[tokio::test]
    async fn cancellation_token_cancels_in_flight_call_tool() {
        let (transport, mut outbound) = MockTransport::new();
        let client = Arc::new(build_client(transport.clone()));

        let connect = tokio::spawn({
            let client = client.clone();
            async move { client.connect().await }
        });
        auto_respond_once(
            &transport,
            &mut outbound,
            serde_json::json!({
                "protocolVersion": "2025-06-18",
                "capabilities": { "tools": ToolsCapability::default() },
                "serverInfo": { "name": "fixture-server", "version": "1.0" }
            }),
        )
        .await;
        let _ = outbound.recv().await;
        connect.await.unwrap().unwrap();

        let token = CancellationToken::new();
        let token_clone = token.clone();
        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call_tool("noop", None, Some(token_clone)).await }
        });
        let _ = outbound.recv().await; // the `tools/call` request, never answered
        token.cancel();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
        // The client should have notified the server it gave up.
        let cancelled = outbound.recv().await.unwrap();
        assert!(matches!(cancelled, JsonRpcMessage::Notification(n) if n.method == "notifications/cancelled"));
    }
}
