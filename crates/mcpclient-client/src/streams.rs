//! Multi-subscriber event streams (spec §4.6: `stream_errors`, `stream_logs`,
//! `stream_progress`, `stream_notifications`).
//!
//! Each is a `tokio::sync::broadcast` channel: every subscriber receives
//! every item from the point it subscribed, and a subscriber that falls
//! behind the configured buffer size silently drops the oldest entries
//! rather than blocking the producer (`RecvError::Lagged` surfaces the drop
//! count to that subscriber only — see the Open Question decision in
//! DESIGN.md for the default buffer sizes).

use mcpclient_protocol::types::{LogMessage, ProgressNotificationParams};
use mcpclient_protocol::{JsonRpcNotification, RequestId};
use tokio::sync::broadcast;

const LOG_BUFFER: usize = 1_000;
const OTHER_BUFFER: usize = 256;

/// An error-stream item: something that went wrong outside the normal
/// request/response flow (spec §4.6 failure model).
#[derive(Debug, Clone)]
pub enum ErrorEvent {
    /// A response arrived whose ID matched no in-flight request, and that ID
    /// was never locally cancelled either — a genuine protocol orphan.
    OrphanResponse { id: RequestId },
    /// A response arrived for an ID that we ourselves cancelled (and whose
    /// waiter was already removed): the server raced our cancellation rather
    /// than violating the protocol.
    LateResponse { id: RequestId },
    /// An inbound frame failed to decode; the frame was dropped.
    DecodeError { cause: String },
    /// The transport failed to start; `connect` surfaces the same error.
    TransportStartFailure { cause: String },
}

pub struct Streams {
    errors: broadcast::Sender<ErrorEvent>,
    logs: broadcast::Sender<LogMessage>,
    progress: broadcast::Sender<ProgressNotificationParams>,
    notifications: broadcast::Sender<JsonRpcNotification>,
}

impl Default for Streams {
    fn default() -> Self {
        Self {
            errors: broadcast::channel(OTHER_BUFFER).0,
            logs: broadcast::channel(LOG_BUFFER).0,
            progress: broadcast::channel(OTHER_BUFFER).0,
            notifications: broadcast::channel(OTHER_BUFFER).0,
        }
    }
}

impl Streams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.errors.subscribe()
    }

    pub fn stream_logs(&self) -> broadcast::Receiver<LogMessage> {
        self.logs.subscribe()
    }

    pub fn stream_progress(&self) -> broadcast::Receiver<ProgressNotificationParams> {
        self.progress.subscribe()
    }

    pub fn stream_notifications(&self) -> broadcast::Receiver<JsonRpcNotification> {
        self.notifications.subscribe()
    }

    pub(crate) fn emit_error(&self, event: ErrorEvent) {
        let _ = self.errors.send(event);
    }

    pub(crate) fn emit_log(&self, message: LogMessage) {
        let _ = self.logs.send(message);
    }

    pub(crate) fn emit_progress(&self, params: ProgressNotificationParams) {
        let _ = self.progress.send(params);
    }

    pub(crate) fn emit_notification(&self, notification: JsonRpcNotification) {
        let _ = self.notifications.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpclient_protocol::types::LogLevel;

    #[tokio::test]
    async fn subscriber_receives_emitted_log() {
        let streams = Streams::new();
        let mut rx = streams.stream_logs();
        streams.emit_log(LogMessage {
            level: LogLevel::Info,
            logger: None,
            data: serde_json::json!("hello"),
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.level, LogLevel::Info);
    }

    #[tokio::test]
    async fn lagging_subscriber_observes_lagged_error_not_a_block() {
        let streams = Streams::new();
        let mut rx = streams.stream_progress();
        for i in 0..(OTHER_BUFFER + 10) {
            streams.emit_progress(ProgressNotificationParams {
                progress_token: serde_json::json!(i),
                progress: i as f64,
                total: None,
                message: None,
            });
        }
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            other => panic!("expected Lagged, got {other:?}"),
        }
    }
}
