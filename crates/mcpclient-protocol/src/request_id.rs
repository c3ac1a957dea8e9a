//! The JSON-RPC request identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON-RPC request ID: either a string or a 64-bit signed integer.
///
/// The wire form is preserved exactly as received — a numeric ID is never
/// serialized back out as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Integer(i64),
}

impl RequestId {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Integer(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::String(_) => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Generates fresh, session-unique request IDs.
///
/// Injected into the session client so callers can supply their own
/// generator (e.g. for deterministic tests) instead of always taking the
/// default monotonic counter.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> RequestId;
}

/// Default generator: a monotonically increasing integer counter.
#[derive(Debug, Default)]
pub struct MonotonicIdGenerator {
    counter: std::sync::atomic::AtomicI64,
}

impl IdGenerator for MonotonicIdGenerator {
    fn next_id(&self) -> RequestId {
        let id = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        RequestId::Integer(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_id_round_trips_as_integer() {
        let id = RequestId::Integer(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn string_id_round_trips_as_string() {
        let id = RequestId::String("abc".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
    }

    #[test]
    fn monotonic_generator_never_repeats() {
        let gen = MonotonicIdGenerator::default();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_ne!(a, b);
    }
}
