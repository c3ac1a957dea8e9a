//! Per-transport connection lifecycle (spec §3 "Session state").

/// Connection lifecycle shared by every transport implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Starting,
    Connected,
    Disconnected,
    Closed,
}
