//! Stdio transport: spawns a child process, speaks line-delimited JSON-RPC
//! on stdin/stdout, streams stderr as log lines (spec §4.3).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use mcpclient_protocol::JsonRpcMessage;
use mcpclient_transport_traits::{Transport, TransportError, TransportResult, TransportState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::codec::{FramedWrite, LinesCodec};

/// Configuration for spawning the child process.
#[derive(Debug, Clone, Default)]
pub struct StdioTransportConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_directory: Option<PathBuf>,
}

type InboundItem = TransportResult<JsonRpcMessage>;

/// Spawns and speaks to a single child-process MCP server over stdio.
pub struct StdioTransport {
    config: StdioTransportConfig,
    running: Arc<AtomicBool>,
    child: Arc<AsyncMutex<Option<Child>>>,
    writer: Arc<AsyncMutex<Option<FramedWrite<tokio::process::ChildStdin, LinesCodec>>>>,
    inbound_tx: mpsc::Sender<InboundItem>,
    inbound_rx: AsyncMutex<mpsc::Receiver<InboundItem>>,
    log_tx: mpsc::Sender<String>,
    log_rx: AsyncMutex<mpsc::Receiver<String>>,
    state_tx: mpsc::Sender<TransportState>,
    state_rx: AsyncMutex<mpsc::Receiver<TransportState>>,
    state: StdMutex<TransportState>,
}

const CHANNEL_CAPACITY: usize = 1024;

impl StdioTransport {
    pub fn new(config: StdioTransportConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (log_tx, log_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (state_tx, state_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            child: Arc::new(AsyncMutex::new(None)),
            writer: Arc::new(AsyncMutex::new(None)),
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            log_tx,
            log_rx: AsyncMutex::new(log_rx),
            state_tx,
            state_rx: AsyncMutex::new(state_rx),
            state: StdMutex::new(TransportState::Idle),
        }
    }

    fn set_state(&self, new_state: TransportState) {
        *self.state.lock().unwrap() = new_state;
        let _ = self.state_tx.try_send(new_state);
    }

    fn current_state(&self) -> TransportState {
        *self.state.lock().unwrap()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&self) -> TransportResult<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(()); // idempotent once running
        }

        self.set_state(TransportState::Starting);

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_directory {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| TransportError::SpawnFailed(e.to_string()))?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        *self.writer.lock().await = Some(FramedWrite::new(stdin, LinesCodec::new()));
        *self.child.lock().await = Some(child);
        self.running.store(true, Ordering::SeqCst);

        let inbound_tx = self.inbound_tx.clone();
        let state_tx = self.state_tx.clone();
        let running = self.running.clone();
        let writer = self.writer.clone();
        let child_handle = self.child.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let item = mcpclient_protocol::decode(line.as_bytes())
                            .map_err(|e| TransportError::DecodeError {
                                bytes: line.into_bytes(),
                                cause: e.to_string(),
                            });
                        if inbound_tx.send(item).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => {
                        // The child exited unexpectedly (spec §4.3: "every
                        // in-flight request fails with peer-closed").
                        running.store(false, Ordering::SeqCst);
                        *writer.lock().await = None;
                        child_handle.lock().await.take();
                        let _ = inbound_tx.send(Err(TransportError::PeerClosed)).await;
                        let _ = state_tx.send(TransportState::Disconnected).await;
                        break;
                    }
                }
            }
        });

        let log_tx = self.log_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if log_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        self.set_state(TransportState::Connected);
        tracing::debug!(command = %self.config.command, "stdio transport started");
        Ok(())
    }

    async fn send(&self, message: JsonRpcMessage) -> TransportResult<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(TransportError::NotStarted);
        }
        let bytes = serde_json::to_vec(&message).map_err(|e| TransportError::DecodeError {
            bytes: Vec::new(),
            cause: e.to_string(),
        })?;
        if bytes.iter().any(|&b| b == b'\n' || b == b'\r') {
            return Err(TransportError::DecodeError {
                bytes,
                cause: "serialized message contains an embedded newline".to_string(),
            });
        }
        let line = String::from_utf8(bytes).map_err(|e| TransportError::DecodeError {
            bytes: Vec::new(),
            cause: e.to_string(),
        })?;

        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(TransportError::NotStarted)?;
        writer
            .send(line)
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))
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
        let mut rx = self.log_rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn receive_connection_state(&self) -> TransportResult<Option<TransportState>> {
        let mut rx = self.state_rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> TransportResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            // already stopped; idempotent
            if matches!(self.current_state(), TransportState::Closed) {
                return Ok(());
            }
        }
        *self.writer.lock().await = None;
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.kill().await;
        }
        self.set_state(TransportState::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_before_start_fails_not_started() {
        let transport = StdioTransport::new(StdioTransportConfig {
            command: "cat".to_string(),
            ..Default::default()
        });
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
        let transport = StdioTransport::new(StdioTransportConfig {
            command: "cat".to_string(),
            ..Default::default()
        });
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_spawn_failed() {
        let transport = StdioTransport::new(StdioTransportConfig {
            command: "/nonexistent/binary-does-not-exist".to_string(),
            ..Default::default()
        });
        let err = transport.start().await.unwrap_err();
        assert!(matches!(err, TransportError::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn start_is_idempotent_once_running() {
        let transport = StdioTransport::new(StdioTransportConfig {
            command: "cat".to_string(),
            ..Default::default()
        });
        transport.start().await.unwrap();
        transport.start().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn child_exit_surfaces_peer_closed_to_receivers() {
        let transport = StdioTransport::new(StdioTransportConfig {
            command: "echo".to_string(),
            ..Default::default()
        });
        transport.start().await.unwrap();
        let err = transport.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::PeerClosed));
        assert!(!transport.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn embedded_newline_in_params_is_escaped_not_rejected() {
        let transport = StdioTransport::new(StdioTransportConfig {
            command: "cat".to_string(),
            ..Default::default()
        });
        transport.start().await.unwrap();
        let req = mcpclient_protocol::JsonRpcRequest::new(
            mcpclient_protocol::RequestId::Integer(1),
            "echo",
            Some(serde_json::json!({"text": "line1\nline2"})),
        );
        transport
            .send(JsonRpcMessage::Request(req))
            .await
            .unwrap();
        transport.close().await.unwrap();
    }
}
