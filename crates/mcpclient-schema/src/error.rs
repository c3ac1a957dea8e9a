//! The schema validation error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("expected type {expected:?}, got {actual}")]
    InvalidType { expected: Vec<String>, actual: String },

    #[error("value out of range: {reason}")]
    ValueOutOfRange { reason: String },

    #[error("string too short: minLength {min}, got {actual}")]
    StringTooShort { min: usize, actual: usize },

    #[error("string too long: maxLength {max}, got {actual}")]
    StringTooLong { max: usize, actual: usize },

    #[error("pattern mismatch: {pattern}")]
    PatternMismatch { pattern: String },

    #[error("format invalid: {format}")]
    FormatInvalid { format: String },

    #[error("missing required property: {0}")]
    MissingRequiredProperty(String),

    #[error("allOf failed: subschema {index} did not validate")]
    AllOfFailed { index: usize },

    #[error("anyOf failed: no subschema validated")]
    AnyOfFailed,

    #[error("oneOf failed: {matched} subschemas matched (expected exactly 1)")]
    OneOfFailed { matched: usize },

    #[error("not failed: subschema validated but must not")]
    NotFailed,

    #[error("unevaluated properties found: {0:?}")]
    UnevaluatedProperties(Vec<String>),

    #[error("unevaluated items found at indices: {0:?}")]
    UnevaluatedItems(Vec<usize>),

    #[error("regex match exceeded configured timeout")]
    RedosTimeout,

    #[error("const/enum mismatch")]
    ConstEnumMismatch,

    #[error("array/object size constraint violated: {reason}")]
    SizeConstraint { reason: String },

    #[error("contains constraint violated: {reason}")]
    ContainsFailed { reason: String },

    #[error("content encoding/media type invalid: {reason}")]
    ContentInvalid { reason: String },

    #[error("invalid schema: {reason}")]
    InvalidSchema { reason: String },
}
