//! `contentEncoding`/`contentMediaType` checks (spec §4.7 "Content").

use base64::Engine;

use crate::error::SchemaError;

/// Decodes `value` per `content_encoding` (`base64` or `base64url`),
/// returning the decoded bytes. Unknown encodings pass the value through
/// unchanged as raw UTF-8 bytes (annotation-only per Draft 2020-12).
pub fn decode_content(value: &str, content_encoding: Option<&str>) -> Result<Vec<u8>, SchemaError> {
    match content_encoding {
        Some("base64") => base64::engine::general_purpose::STANDARD
            .decode(value)
            .map_err(|e| SchemaError::ContentInvalid {
                reason: format!("invalid base64: {e}"),
            }),
        Some("base64url") => base64::engine::general_purpose::URL_SAFE
            .decode(value)
            .map_err(|e| SchemaError::ContentInvalid {
                reason: format!("invalid base64url: {e}"),
            }),
        _ => Ok(value.as_bytes().to_vec()),
    }
}

/// Validates `bytes` against `content_media_type`. Only `application/json`
/// is checked structurally; other media types are accepted as opaque.
pub fn check_media_type(bytes: &[u8], content_media_type: Option<&str>) -> Result<(), SchemaError> {
    match content_media_type {
        Some("application/json") => serde_json::from_slice::<serde_json::Value>(bytes)
            .map(|_| ())
            .map_err(|e| SchemaError::ContentInvalid {
                reason: format!("not valid application/json: {e}"),
            }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_base64_decodes() {
        let bytes = decode_content("aGVsbG8=", Some("base64")).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn invalid_base64_is_content_invalid() {
        assert!(decode_content("not base64!!", Some("base64")).is_err());
    }

    #[test]
    fn embedded_json_validates_structurally() {
        let bytes = decode_content("eyJhIjogMX0=", Some("base64")).unwrap();
        assert!(check_media_type(&bytes, Some("application/json")).is_ok());
    }

    #[test]
    fn malformed_embedded_json_is_rejected() {
        assert!(check_media_type(b"not json", Some("application/json")).is_err());
    }
}
