//! String-format checks (spec §4.7 "Format").
//!
//! `idn-email`/`idn-hostname`/`iri`/`iri-reference` are checked with the
//! same patterns as their ASCII counterparts (`email`/`hostname`/`uri`/
//! `uri-reference`) — a full IDNA/Unicode-normalizing implementation is out
//! of scope; this is noted as an accepted approximation.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::regex_guard::is_match_within;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn hostname_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").unwrap()
    })
}

fn ipv4_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)(\.(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)){3}$")
            .unwrap()
    })
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .unwrap()
    })
}

fn uri_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:\S*$").unwrap())
}

fn uri_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\S*$").unwrap())
}

fn uri_template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s<>]*$").unwrap())
}

fn json_pointer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(/([^/~]|~0|~1)*)*$").unwrap())
}

fn relative_json_pointer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(#|(/([^/~]|~0|~1)*)*)?$").unwrap())
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$").unwrap()
    })
}

fn date_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$").unwrap()
    })
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$|^P\d+W$").unwrap()
    })
}

fn is_valid_ipv6(s: &str) -> bool {
    s.parse::<std::net::Ipv6Addr>().is_ok()
}

/// Returns `Ok(true)` when `value` satisfies `format`, `Ok(false)` when it
/// doesn't, and `Err` on a ReDoS-timeout from the underlying regex engine.
/// Unknown format names are treated as always-valid (Draft 2020-12 treats
/// `format` as an annotation by default unless a vocabulary opts into
/// assertion behavior).
pub fn check_format(format: &str, value: &str, timeout: Duration) -> Result<bool, crate::error::SchemaError> {
    let re = match format {
        "email" | "idn-email" => email_re(),
        "hostname" | "idn-hostname" => hostname_re(),
        "ipv4" => ipv4_re(),
        "ipv6" => return Ok(is_valid_ipv6(value)),
        "uuid" => uuid_re(),
        "uri" | "iri" => uri_re(),
        "uri-reference" | "iri-reference" => uri_reference_re(),
        "uri-template" => uri_template_re(),
        "json-pointer" => json_pointer_re(),
        "relative-json-pointer" => relative_json_pointer_re(),
        "date" => date_re(),
        "time" => time_re(),
        "date-time" => date_time_re(),
        "duration" => duration_re(),
        "regex" => return Ok(Regex::new(value).is_ok()),
        _ => return Ok(true),
    };
    is_match_within(re, value, timeout)
}
