//! Validator-wide tunables (spec §4.7 "configurable per-match timeout").

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Per-regex-match budget for `pattern` and regex-backed `format`
    /// checks. The `regex` crate's automaton construction already rules out
    /// catastrophic backtracking; this bounds pathologically large
    /// input/pattern combinations rather than exponential blowup.
    pub regex_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            regex_timeout: Duration::from_millis(100),
        }
    }
}
