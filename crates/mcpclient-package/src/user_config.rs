//! Validation of user-supplied config values against the manifest's
//! `user_config` declarations (spec §4.5 step 4).

use std::collections::HashMap;

use mcpclient_transport_traits::{TransportError, TransportResult};
use serde_json::Value;

use crate::manifest::{UserConfigField, UserConfigValue};

/// Checks every required key is present, and rejects sensitive values
/// supplied through a non-secret channel (`allow_sensitive = false`,
/// e.g. config loaded from a plain file rather than a secret store).
///
/// Returns the resolved `{key -> UserConfigValue}` map for substitution.
pub fn validate_and_resolve(
    declared: &HashMap<String, UserConfigField>,
    supplied: &HashMap<String, Value>,
    allow_sensitive: bool,
) -> TransportResult<HashMap<String, UserConfigValue>> {
    let mut resolved = HashMap::with_capacity(declared.len());

    for (key, field) in declared {
        match supplied.get(key) {
            Some(value) => {
                if field.sensitive && !allow_sensitive {
                    return Err(TransportError::SensitiveValueNotAllowed(key.clone()));
                }
                if let Some(resolved_value) = UserConfigValue::from_json(value) {
                    resolved.insert(key.clone(), resolved_value);
                }
            }
            None if field.required => {
                return Err(TransportError::MissingRequiredConfig(key.clone()));
            }
            None => {}
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(required: bool, sensitive: bool) -> UserConfigField {
        UserConfigField {
            required,
            sensitive,
            field_type: None,
            description: None,
        }
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let mut declared = HashMap::new();
        declared.insert("api_key".to_string(), field(true, false));
        let supplied = HashMap::new();
        let err = validate_and_resolve(&declared, &supplied, true).unwrap_err();
        assert!(matches!(err, TransportError::MissingRequiredConfig(k) if k == "api_key"));
    }

    #[test]
    fn missing_optional_key_is_fine() {
        let mut declared = HashMap::new();
        declared.insert("api_key".to_string(), field(false, false));
        let supplied = HashMap::new();
        assert!(validate_and_resolve(&declared, &supplied, true).is_ok());
    }

    #[test]
    fn sensitive_value_rejected_when_not_allowed() {
        let mut declared = HashMap::new();
        declared.insert("token".to_string(), field(true, true));
        let mut supplied = HashMap::new();
        supplied.insert("token".to_string(), json!("secret"));
        let err = validate_and_resolve(&declared, &supplied, false).unwrap_err();
        assert!(matches!(err, TransportError::SensitiveValueNotAllowed(k) if k == "token"));
    }

    #[test]
    fn sensitive_value_accepted_when_allowed() {
        let mut declared = HashMap::new();
        declared.insert("token".to_string(), field(true, true));
        let mut supplied = HashMap::new();
        supplied.insert("token".to_string(), json!("secret"));
        let resolved = validate_and_resolve(&declared, &supplied, true).unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn array_value_resolves_to_array_variant() {
        let mut declared = HashMap::new();
        declared.insert("dirs".to_string(), field(true, false));
        let mut supplied = HashMap::new();
        supplied.insert("dirs".to_string(), json!(["/a", "/b"]));
        let resolved = validate_and_resolve(&declared, &supplied, true).unwrap();
        assert!(matches!(resolved.get("dirs"), Some(UserConfigValue::Array(items)) if items == &vec!["/a".to_string(), "/b".to_string()]));
    }
}
