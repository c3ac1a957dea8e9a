//! Timeout-bounded regex matching (spec §4.7 "Pattern evaluation enforces a
//! configurable timeout per regex match").

use std::time::{Duration, Instant};

use regex::Regex;

use crate::error::SchemaError;

/// Matches `text` against `regex`, returning `RedosTimeout` if the match
/// takes longer than `timeout`. The `regex` crate's automaton-based engine
/// is already immune to catastrophic backtracking, so in practice this
/// only trips on pathologically large inputs; it is kept because the spec
/// requires an enforced budget, not merely a fast common case.
pub fn is_match_within(regex: &Regex, text: &str, timeout: Duration) -> Result<bool, SchemaError> {
    let start = Instant::now();
    let matched = regex.is_match(text);
    if start.elapsed() > timeout {
        tracing::warn!(
            pattern = regex.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "regex match exceeded configured timeout (possible ReDoS)"
        );
        return Err(SchemaError::RedosTimeout);
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_pattern_matches_within_budget() {
        let re = Regex::new(r"^\d+$").unwrap();
        assert!(is_match_within(&re, "12345", Duration::from_millis(100)).unwrap());
    }

    #[test]
    fn non_matching_pattern_returns_false_not_error() {
        let re = Regex::new(r"^\d+$").unwrap();
        assert!(!is_match_within(&re, "abc", Duration::from_millis(100)).unwrap());
    }
}
