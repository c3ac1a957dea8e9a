//! Message dispatcher: the single consumer of `transport.receive()` (spec
//! §4.6 request correlation algorithm).
//!
//! Grounded on the teacher's `client/dispatcher.rs` — a background task is
//! the sole reader of the transport, routing responses to waiting oneshot
//! channels by request ID and calling registered closures for
//! server-initiated requests/notifications. Extended here with the
//! notification fan-out into `Streams` and the `sampling/createMessage` /
//! `roots/list` / `ping` server-request handling spec §4.6 names explicitly
//! (the teacher's dispatcher leaves request handling to an injected
//! closure; this crate inlines that closure's logic since the session
//! client is the only caller).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use mcpclient_protocol::types::{
    CancelledNotificationParams, EmptyResult, ListRootsResult, LogMessage, ProgressNotificationParams,
};
use mcpclient_protocol::{
    JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId,
};
use mcpclient_transport_traits::Transport;
use tokio::sync::oneshot;

use crate::roots::RootsStore;
use crate::sampling::SamplingHandler;
use crate::streams::{ErrorEvent, Streams};

pub(crate) type Waiter = oneshot::Sender<Result<serde_json::Value, JsonRpcError>>;

/// Remembers the most recently locally-cancelled request IDs, bounded so a
/// response that never arrives doesn't leak memory forever. Lets
/// `route_response` tell a late (but legitimate) response for a cancelled
/// request apart from a genuine protocol orphan.
const CANCELLED_ID_CAPACITY: usize = 256;

#[derive(Default)]
struct RecentlyCancelled {
    set: HashSet<RequestId>,
    order: VecDeque<RequestId>,
}

impl RecentlyCancelled {
    fn record(&mut self, id: RequestId) {
        if self.set.insert(id.clone()) {
            self.order.push_back(id);
            if self.order.len() > CANCELLED_ID_CAPACITY {
                if let Some(oldest) = self.order.pop_front() {
                    self.set.remove(&oldest);
                }
            }
        }
    }

    fn take(&mut self, id: &RequestId) -> bool {
        if self.set.remove(id) {
            self.order.retain(|existing| existing != id);
            true
        } else {
            false
        }
    }
}

pub(crate) struct Dispatcher {
    waiters: StdMutex<HashMap<RequestId, Waiter>>,
    cancelled: StdMutex<RecentlyCancelled>,
    streams: Arc<Streams>,
    roots: Arc<RootsStore>,
    sampling_handler: Option<Arc<dyn SamplingHandler>>,
}

impl Dispatcher {
    pub(crate) fn new(
        streams: Arc<Streams>,
        roots: Arc<RootsStore>,
        sampling_handler: Option<Arc<dyn SamplingHandler>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            waiters: StdMutex::new(HashMap::new()),
            cancelled: StdMutex::new(RecentlyCancelled::default()),
            streams,
            roots,
            sampling_handler,
        })
    }

    /// Registers a waiter for `id` before the request is sent, per the
    /// correlation algorithm's step 1-2 ordering.
    pub(crate) fn register(&self, id: RequestId) -> oneshot::Receiver<Result<serde_json::Value, JsonRpcError>> {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .expect("waiters mutex poisoned")
            .insert(id, tx);
        rx
    }

    /// Cancels a locally-tracked in-flight request: removes its waiter and
    /// wakes the caller with `cancelled` rather than leaving it pending.
    pub(crate) fn cancel_locally(&self, id: &RequestId) {
        if let Some(tx) = self.waiters.lock().expect("waiters mutex poisoned").remove(id) {
            self.cancelled
                .lock()
                .expect("cancelled mutex poisoned")
                .record(id.clone());
            let _ = tx.send(Err(JsonRpcError {
                code: JsonRpcErrorCode::Application(-32800).code(),
                message: "request cancelled".to_string(),
                data: None,
            }));
        }
    }

    /// Fails every in-flight waiter with `session-closed` (spec §4.6
    /// `disconnect`).
    pub(crate) fn fail_all(&self, reason: &str) {
        let mut waiters = self.waiters.lock().expect("waiters mutex poisoned");
        for (_, tx) in waiters.drain() {
            let _ = tx.send(Err(JsonRpcError {
                code: JsonRpcErrorCode::Application(-32000).code(),
                message: reason.to_string(),
                data: None,
            }));
        }
    }

    /// Spawns the background task that owns `transport.receive()` for the
    /// lifetime of the session.
    pub(crate) fn spawn_routing_task(self: &Arc<Self>, transport: Arc<dyn Transport>) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match transport.receive().await {
                    Ok(Some(message)) => this.route(&transport, message).await,
                    Ok(None) => break,
                    Err(e) => {
                        this.streams.emit_error(ErrorEvent::TransportStartFailure {
                            cause: e.to_string(),
                        });
                        break;
                    }
                }
            }
            tracing::debug!("dispatcher routing task terminated");
        });
    }

    /// Spawns the background task that forwards stdio stderr lines (or any
    /// transport's `receive_logs()` stream) into `stream_logs` alongside
    /// server `notifications/message` entries.
    pub(crate) fn spawn_log_forwarding_task(self: &Arc<Self>, transport: Arc<dyn Transport>) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match transport.receive_logs().await {
                    Ok(Some(line)) => this.streams.emit_log(LogMessage {
                        level: mcpclient_protocol::types::LogLevel::Error,
                        logger: Some("transport.stderr".to_string()),
                        data: serde_json::Value::String(line),
                    }),
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
        });
    }

    async fn route(self: &Arc<Self>, transport: &Arc<dyn Transport>, message: JsonRpcMessage) {
        match message {
            JsonRpcMessage::Response(response) => self.route_response(response),
            JsonRpcMessage::Request(request) => self.route_request(transport, request).await,
            JsonRpcMessage::Notification(notification) => self.route_notification(notification),
            JsonRpcMessage::Batch(items) => {
                for item in items {
                    Box::pin(self.route(transport, item)).await;
                }
            }
        }
    }

    fn route_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.0.clone() else {
            self.streams.emit_error(ErrorEvent::DecodeError {
                cause: "response with null id".to_string(),
            });
            return;
        };
        let waiter = self.waiters.lock().expect("waiters mutex poisoned").remove(&id);
        let Some(tx) = waiter else {
            let was_cancelled = self
                .cancelled
                .lock()
                .expect("cancelled mutex poisoned")
                .take(&id);
            if was_cancelled {
                self.streams.emit_error(ErrorEvent::LateResponse { id });
            } else {
                self.streams.emit_error(ErrorEvent::OrphanResponse { id });
            }
            return;
        };
        let result = match response.payload {
            mcpclient_protocol::JsonRpcResponsePayload::Success { result } => Ok(result),
            mcpclient_protocol::JsonRpcResponsePayload::Error { error } => Err(error),
        };
        let _ = tx.send(result);
    }

    async fn route_request(self: &Arc<Self>, transport: &Arc<dyn Transport>, request: JsonRpcRequest) {
        let response = match request.method.as_str() {
            "ping" => JsonRpcResponse::success(
                request.id.clone(),
                serde_json::to_value(EmptyResult::default()).unwrap(),
            ),
            "roots/list" => JsonRpcResponse::success(
                request.id.clone(),
                serde_json::to_value(ListRootsResult {
                    roots: self.roots.get(),
                })
                .unwrap(),
            ),
            "sampling/createMessage" => self.handle_sampling_request(&request).await,
            other => JsonRpcResponse::error(
                Some(request.id.clone()),
                JsonRpcError {
                    code: JsonRpcErrorCode::MethodNotFound.code(),
                    message: format!("method not found: {other}"),
                    data: None,
                },
            ),
        };
        if let Err(e) = transport.send(JsonRpcMessage::Response(response)).await {
            tracing::warn!("failed to send response to server request: {e}");
        }
    }

    async fn handle_sampling_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(handler) = &self.sampling_handler else {
            return JsonRpcResponse::error(
                Some(request.id.clone()),
                JsonRpcError {
                    code: JsonRpcErrorCode::MethodNotFound.code(),
                    message: "sampling not supported: no handler installed".to_string(),
                    data: None,
                },
            );
        };
        let params: mcpclient_protocol::types::CreateMessageRequest =
            match serde_json::from_value(request.params.clone().unwrap_or(serde_json::Value::Null)) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(
                        Some(request.id.clone()),
                        JsonRpcError {
                            code: JsonRpcErrorCode::InvalidParams.code(),
                            message: format!("invalid createMessage params: {e}"),
                            data: None,
                        },
                    );
                }
            };
        match handler.sample(params).await {
            Ok(result) => {
                JsonRpcResponse::success(request.id.clone(), serde_json::to_value(result).unwrap())
            }
            Err(message) => JsonRpcResponse::error(
                Some(request.id.clone()),
                JsonRpcError {
                    code: JsonRpcErrorCode::InternalError.code(),
                    message,
                    data: None,
                },
            ),
        }
    }

    fn route_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/message" => {
                match serde_json::from_value::<LogMessage>(
                    notification.params.clone().unwrap_or(serde_json::Value::Null),
                ) {
                    Ok(log) => self.streams.emit_log(log),
                    Err(e) => self.streams.emit_error(ErrorEvent::DecodeError {
                        cause: format!("invalid notifications/message params: {e}"),
                    }),
                }
            }
            "notifications/progress" => {
                match serde_json::from_value::<ProgressNotificationParams>(
                    notification.params.clone().unwrap_or(serde_json::Value::Null),
                ) {
                    Ok(progress) => self.streams.emit_progress(progress),
                    Err(e) => self.streams.emit_error(ErrorEvent::DecodeError {
                        cause: format!("invalid notifications/progress params: {e}"),
                    }),
                }
            }
            "notifications/cancelled" => {
                // The server is telling us it no longer cares about a
                // request it sent us (e.g. an in-flight sampling request).
                // We perform no background work per such request today, so
                // this is informational only; forward it like any other
                // notification.
                if let Ok(params) = serde_json::from_value::<CancelledNotificationParams>(
                    notification.params.clone().unwrap_or(serde_json::Value::Null),
                ) {
                    tracing::debug!(request_id = %params.request_id, "server cancelled a request it sent us");
                }
                self.streams.emit_notification(notification);
            }
            _ => self.streams.emit_notification(notification),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_locally_wakes_with_cancelled_error() {
        let dispatcher = Dispatcher::new(Arc::new(Streams::new()), Arc::new(RootsStore::new()), None);
        let rx = dispatcher.register(RequestId::Integer(1));
        dispatcher.cancel_locally(&RequestId::Integer(1));
        let result = rx.try_recv().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn fail_all_drains_every_waiter() {
        let dispatcher = Dispatcher::new(Arc::new(Streams::new()), Arc::new(RootsStore::new()), None);
        let rx_a = dispatcher.register(RequestId::Integer(1));
        let rx_b = dispatcher.register(RequestId::Integer(2));
        dispatcher.fail_all("session-closed");
        assert!(rx_a.try_recv().unwrap().is_err());
        assert!(rx_b.try_recv().unwrap().is_err());
    }

    #[test]
    fn late_response_for_cancelled_id_is_distinguished_from_orphan() {
        let dispatcher = Dispatcher::new(Arc::new(Streams::new()), Arc::new(RootsStore::new()), None);
        let mut errors = dispatcher.streams.stream_errors();
        let id = RequestId::Integer(1);
        let _rx = dispatcher.register(id.clone());
        dispatcher.cancel_locally(&id);

        dispatcher.route_response(JsonRpcResponse::success(id.clone(), serde_json::json!(null)));
        match errors.try_recv().unwrap() {
            ErrorEvent::LateResponse { id: got } => assert_eq!(got, id),
            other => panic!("expected LateResponse, got {other:?}"),
        }
    }

    #[test]
    fn genuine_orphan_response_is_reported_as_orphan() {
        let dispatcher = Dispatcher::new(Arc::new(Streams::new()), Arc::new(RootsStore::new()), None);
        let mut errors = dispatcher.streams.stream_errors();
        let id = RequestId::Integer(42);

        dispatcher.route_response(JsonRpcResponse::success(id.clone(), serde_json::json!(null)));
        match errors.try_recv().unwrap() {
            ErrorEvent::OrphanResponse { id: got } => assert_eq!(got, id),
            other => panic!("expected OrphanResponse, got {other:?}"),
        }
    }
}
