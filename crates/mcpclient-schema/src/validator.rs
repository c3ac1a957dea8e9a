//! The Draft 2020-12 evaluator: walks a schema/instance pair, recursing
//! into subschemas and threading evaluated-properties/evaluated-items
//! bookkeeping upward (spec §4.7).

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use serde_json::Value;

use crate::config::ValidatorConfig;
use crate::content::{check_media_type, decode_content};
use crate::context::Evaluated;
use crate::error::SchemaError;
use crate::format::check_format;
use crate::numeric::{deep_eq, multiple_of_holds};

pub type ErrorMap = HashMap<String, Vec<SchemaError>>;

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: ErrorMap,
    pub evaluated_properties: BTreeSet<String>,
    pub evaluated_items: BTreeSet<usize>,
}

/// Validates `instance` against `schema`. Deterministic and total: every
/// branch either recurses into a strictly smaller subschema/subinstance or
/// terminates, so this always returns rather than looping.
pub fn validate(schema: &Value, instance: &Value, config: &ValidatorConfig) -> ValidationResult {
    let mut errors: ErrorMap = HashMap::new();
    let evaluated = eval(schema, instance, "", config, &mut errors);
    ValidationResult {
        valid: errors.is_empty(),
        errors,
        evaluated_properties: evaluated.properties,
        evaluated_items: evaluated.items,
    }
}

fn push_err(errors: &mut ErrorMap, path: &str, err: SchemaError) {
    errors.entry(path.to_string()).or_default().push(err);
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn matches_type(expected: &str, instance: &Value) -> bool {
    let actual = type_name(instance);
    actual == expected || (expected == "number" && actual == "integer")
}

fn child_path(path: &str, segment: &str) -> String {
    format!("{path}/{segment}")
}

/// The core recursive evaluator. Returns what was evaluated at this node so
/// the caller (a parent object/array/composition keyword) can fold it in.
fn eval(schema: &Value, instance: &Value, path: &str, config: &ValidatorConfig, errors: &mut ErrorMap) -> Evaluated {
    match schema {
        Value::Bool(true) => Evaluated::default(),
        Value::Bool(false) => {
            push_err(errors, path, SchemaError::InvalidSchema {
                reason: "schema is `false`: no instance validates".to_string(),
            });
            Evaluated::default()
        }
        Value::Object(map) => eval_object_schema(map, instance, path, config, errors),
        _ => {
            push_err(errors, path, SchemaError::InvalidSchema {
                reason: "schema must be an object or boolean".to_string(),
            });
            Evaluated::default()
        }
    }
}

fn eval_object_schema(
    schema: &serde_json::Map<String, Value>,
    instance: &Value,
    path: &str,
    config: &ValidatorConfig,
    errors: &mut ErrorMap,
) -> Evaluated {
    let mut evaluated = Evaluated::default();

    // --- Type ---
    if let Some(type_val) = schema.get("type") {
        let expected: Vec<String> = match type_val {
            Value::String(s) => vec![s.clone()],
            Value::Array(arr) => arr
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => vec![],
        };
        if !expected.is_empty() && !expected.iter().any(|t| matches_type(t, instance)) {
            push_err(errors, path, SchemaError::InvalidType {
                expected: expected.clone(),
                actual: type_name(instance).to_string(),
            });
        }
    }

    // --- const / enum ---
    if let Some(const_val) = schema.get("const") {
        if !deep_eq(const_val, instance) {
            push_err(errors, path, SchemaError::ConstEnumMismatch);
        }
    }
    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.iter().any(|opt| deep_eq(opt, instance)) {
            push_err(errors, path, SchemaError::ConstEnumMismatch);
        }
    }

    // --- numeric ---
    if let Value::Number(n) = instance {
        if let Some(v) = n.as_f64() {
            check_numeric_bounds(schema, v, path, errors);
        }
    }

    // --- string ---
    if let Value::String(s) = instance {
        check_string_constraints(schema, s, path, config, errors);
    }

    // --- array ---
    if let Value::Array(items) = instance {
        let array_evaluated = check_array(schema, items, path, config, errors);
        evaluated.merge(&array_evaluated);
    }

    // --- object ---
    if let Value::Object(props) = instance {
        let object_evaluated = check_object(schema, props, path, config, errors);
        evaluated.merge(&object_evaluated);
    }

    // --- composition ---
    evaluated.merge(&check_composition(schema, instance, path, config, errors));

    // --- conditional (if/then/else, dependentSchemas) ---
    evaluated.merge(&check_conditional(schema, instance, path, config, errors));

    // --- unevaluatedProperties / unevaluatedItems ---
    check_unevaluated(schema, instance, path, config, errors, &evaluated);

    evaluated
}

fn check_numeric_bounds(schema: &serde_json::Map<String, Value>, v: f64, path: &str, errors: &mut ErrorMap) {
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
        if v < min {
            push_err(errors, path, SchemaError::ValueOutOfRange {
                reason: format!("{v} < minimum {min}"),
            });
        }
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
        if v > max {
            push_err(errors, path, SchemaError::ValueOutOfRange {
                reason: format!("{v} > maximum {max}"),
            });
        }
    }
    if let Some(emin) = schema.get("exclusiveMinimum").and_then(Value::as_f64) {
        if v <= emin {
            push_err(errors, path, SchemaError::ValueOutOfRange {
                reason: format!("{v} <= exclusiveMinimum {emin}"),
            });
        }
    }
    if let Some(emax) = schema.get("exclusiveMaximum").and_then(Value::as_f64) {
        if v >= emax {
            push_err(errors, path, SchemaError::ValueOutOfRange {
                reason: format!("{v} >= exclusiveMaximum {emax}"),
            });
        }
    }
    if let Some(factor) = schema.get("multipleOf").and_then(Value::as_f64) {
        if !multiple_of_holds(v, factor, 1e-9) {
            push_err(errors, path, SchemaError::ValueOutOfRange {
                reason: format!("{v} is not a multiple of {factor}"),
            });
        }
    }
}

fn check_string_constraints(
    schema: &serde_json::Map<String, Value>,
    s: &str,
    path: &str,
    config: &ValidatorConfig,
    errors: &mut ErrorMap,
) {
    let char_len = s.chars().count();
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        if char_len < min as usize {
            push_err(errors, path, SchemaError::StringTooShort { min: min as usize, actual: char_len });
        }
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
        if char_len > max as usize {
            push_err(errors, path, SchemaError::StringTooLong { max: max as usize, actual: char_len });
        }
    }
    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        match Regex::new(pattern) {
            Ok(re) => match crate::regex_guard::is_match_within(&re, s, config.regex_timeout) {
                Ok(true) => {}
                Ok(false) => push_err(errors, path, SchemaError::PatternMismatch { pattern: pattern.to_string() }),
                Err(e) => push_err(errors, path, e),
            },
            Err(_) => push_err(errors, path, SchemaError::InvalidSchema {
                reason: format!("invalid pattern: {pattern}"),
            }),
        }
    }
    if let Some(format) = schema.get("format").and_then(Value::as_str) {
        match check_format(format, s, config.regex_timeout) {
            Ok(true) => {}
            Ok(false) => push_err(errors, path, SchemaError::FormatInvalid { format: format.to_string() }),
            Err(e) => push_err(errors, path, e),
        }
    }
    let content_encoding = schema.get("contentEncoding").and_then(Value::as_str);
    let content_media_type = schema.get("contentMediaType").and_then(Value::as_str);
    if content_encoding.is_some() || content_media_type.is_some() {
        match decode_content(s, content_encoding) {
            Ok(bytes) => {
                if let Err(e) = check_media_type(&bytes, content_media_type) {
                    push_err(errors, path, e);
                }
            }
            Err(e) => push_err(errors, path, e),
        }
    }
}

fn check_array(
    schema: &serde_json::Map<String, Value>,
    items: &[Value],
    path: &str,
    config: &ValidatorConfig,
    errors: &mut ErrorMap,
) -> Evaluated {
    let mut evaluated = Evaluated::default();

    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if items.len() < min as usize {
            push_err(errors, path, SchemaError::SizeConstraint {
                reason: format!("minItems {min}, got {}", items.len()),
            });
        }
    }
    if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
        if items.len() > max as usize {
            push_err(errors, path, SchemaError::SizeConstraint {
                reason: format!("maxItems {max}, got {}", items.len()),
            });
        }
    }
    if schema.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                if deep_eq(&items[i], &items[j]) {
                    push_err(errors, path, SchemaError::SizeConstraint {
                        reason: format!("items at index {i} and {j} are not unique"),
                    });
                }
            }
        }
    }

    // prefixItems: positional tuple validation.
    if let Some(Value::Array(prefix_schemas)) = schema.get("prefixItems") {
        for (i, item_schema) in prefix_schemas.iter().enumerate() {
            if let Some(item) = items.get(i) {
                let item_path = child_path(path, &i.to_string());
                eval(item_schema, item, &item_path, config, errors);
                evaluated.items.insert(i);
            }
        }
    }

    // items: applies to every index not covered by prefixItems.
    if let Some(items_schema) = schema.get("items") {
        let prefix_len = schema
            .get("prefixItems")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        for (i, item) in items.iter().enumerate().skip(prefix_len) {
            let item_path = child_path(path, &i.to_string());
            eval(items_schema, item, &item_path, config, errors);
            evaluated.items.insert(i);
        }
    }

    if let Some(contains_schema) = schema.get("contains") {
        let mut matched_indices = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let mut scratch = HashMap::new();
            eval(contains_schema, item, &child_path(path, &i.to_string()), config, &mut scratch);
            if scratch.is_empty() {
                matched_indices.push(i);
            }
        }
        let min_contains = schema.get("minContains").and_then(Value::as_u64).unwrap_or(1) as usize;
        let max_contains = schema.get("maxContains").and_then(Value::as_u64).map(|v| v as usize);
        let count = matched_indices.len();
        if count < min_contains || max_contains.is_some_and(|max| count > max) {
            push_err(errors, path, SchemaError::ContainsFailed {
                reason: format!("{count} item(s) matched `contains` (min {min_contains}, max {max_contains:?})"),
            });
        } else {
            evaluated.items.extend(matched_indices);
        }
    }

    evaluated
}

fn check_object(
    schema: &serde_json::Map<String, Value>,
    props: &serde_json::Map<String, Value>,
    path: &str,
    config: &ValidatorConfig,
    errors: &mut ErrorMap,
) -> Evaluated {
    let mut evaluated = Evaluated::default();

    if let Some(min) = schema.get("minProperties").and_then(Value::as_u64) {
        if props.len() < min as usize {
            push_err(errors, path, SchemaError::SizeConstraint {
                reason: format!("minProperties {min}, got {}", props.len()),
            });
        }
    }
    if let Some(max) = schema.get("maxProperties").and_then(Value::as_u64) {
        if props.len() > max as usize {
            push_err(errors, path, SchemaError::SizeConstraint {
                reason: format!("maxProperties {max}, got {}", props.len()),
            });
        }
    }
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required {
            if let Some(key) = key.as_str() {
                if !props.contains_key(key) {
                    push_err(errors, path, SchemaError::MissingRequiredProperty(key.to_string()));
                }
            }
        }
    }
    if let Some(Value::Object(dependent_required)) = schema.get("dependentRequired") {
        for (key, required_keys) in dependent_required {
            if !props.contains_key(key) {
                continue;
            }
            if let Value::Array(required_keys) = required_keys {
                for required_key in required_keys {
                    if let Some(required_key) = required_key.as_str() {
                        if !props.contains_key(required_key) {
                            push_err(errors, path, SchemaError::MissingRequiredProperty(required_key.to_string()));
                        }
                    }
                }
            }
        }
    }

    let properties_schema = schema.get("properties").and_then(Value::as_object);
    if let Some(properties_schema) = properties_schema {
        for (key, prop_schema) in properties_schema {
            if let Some(value) = props.get(key) {
                eval(prop_schema, value, &child_path(path, key), config, errors);
                evaluated.properties.insert(key.clone());
            }
        }
    }

    let pattern_properties = schema.get("patternProperties").and_then(Value::as_object);
    if let Some(pattern_properties) = pattern_properties {
        for (pattern, prop_schema) in pattern_properties {
            let Ok(re) = Regex::new(pattern) else {
                push_err(errors, path, SchemaError::InvalidSchema {
                    reason: format!("invalid patternProperties pattern: {pattern}"),
                });
                continue;
            };
            for (key, value) in props {
                if matches!(crate::regex_guard::is_match_within(&re, key, config.regex_timeout), Ok(true)) {
                    eval(prop_schema, value, &child_path(path, key), config, errors);
                    evaluated.properties.insert(key.clone());
                }
            }
        }
    }

    if let Some(property_names_schema) = schema.get("propertyNames") {
        for key in props.keys() {
            eval(property_names_schema, &Value::String(key.clone()), &child_path(path, key), config, errors);
        }
    }

    if let Some(additional_schema) = schema.get("additionalProperties") {
        let declared: BTreeSet<&str> = properties_schema
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        let pattern_keys: Vec<Regex> = pattern_properties
            .map(|m| m.keys().filter_map(|p| Regex::new(p).ok()).collect())
            .unwrap_or_default();
        for (key, value) in props {
            if declared.contains(key.as_str()) {
                continue;
            }
            if pattern_keys.iter().any(|re| re.is_match(key)) {
                continue;
            }
            eval(additional_schema, value, &child_path(path, key), config, errors);
            evaluated.properties.insert(key.clone());
        }
    }

    if let Some(Value::Object(dependent_schemas)) = schema.get("dependentSchemas") {
        for (key, dependent_schema) in dependent_schemas {
            if props.contains_key(key) {
                let sub = eval(dependent_schema, &Value::Object(props.clone()), path, config, errors);
                evaluated.merge(&sub);
            }
        }
    }

    evaluated
}

fn check_composition(
    schema: &serde_json::Map<String, Value>,
    instance: &Value,
    path: &str,
    config: &ValidatorConfig,
    errors: &mut ErrorMap,
) -> Evaluated {
    let mut evaluated = Evaluated::default();

    if let Some(Value::Array(subschemas)) = schema.get("allOf") {
        for (i, sub) in subschemas.iter().enumerate() {
            let mut scratch = HashMap::new();
            let sub_evaluated = eval(sub, instance, path, config, &mut scratch);
            if !scratch.is_empty() {
                push_err(errors, path, SchemaError::AllOfFailed { index: i });
                for (p, errs) in scratch {
                    errors.entry(p).or_default().extend(errs);
                }
            } else {
                evaluated.merge(&sub_evaluated);
            }
        }
    }

    if let Some(Value::Array(subschemas)) = schema.get("anyOf") {
        let mut any_valid = false;
        for sub in subschemas {
            let mut scratch = HashMap::new();
            let sub_evaluated = eval(sub, instance, path, config, &mut scratch);
            if scratch.is_empty() {
                any_valid = true;
                evaluated.merge(&sub_evaluated);
            }
        }
        if !any_valid {
            push_err(errors, path, SchemaError::AnyOfFailed);
        }
    }

    if let Some(Value::Array(subschemas)) = schema.get("oneOf") {
        let mut matched = 0usize;
        let mut matched_evaluated = Evaluated::default();
        for sub in subschemas {
            let mut scratch = HashMap::new();
            let sub_evaluated = eval(sub, instance, path, config, &mut scratch);
            if scratch.is_empty() {
                matched += 1;
                matched_evaluated.merge(&sub_evaluated);
            }
        }
        if matched == 1 {
            evaluated.merge(&matched_evaluated);
        } else {
            push_err(errors, path, SchemaError::OneOfFailed { matched });
        }
    }

    if let Some(not_schema) = schema.get("not") {
        let mut scratch = HashMap::new();
        eval(not_schema, instance, path, config, &mut scratch);
        if scratch.is_empty() {
            push_err(errors, path, SchemaError::NotFailed);
        }
    }

    evaluated
}

fn check_conditional(
    schema: &serde_json::Map<String, Value>,
    instance: &Value,
    path: &str,
    config: &ValidatorConfig,
    errors: &mut ErrorMap,
) -> Evaluated {
    let mut evaluated = Evaluated::default();

    if let Some(if_schema) = schema.get("if") {
        let mut scratch = HashMap::new();
        let if_evaluated = eval(if_schema, instance, path, config, &mut scratch);
        if scratch.is_empty() {
            evaluated.merge(&if_evaluated);
            if let Some(then_schema) = schema.get("then") {
                evaluated.merge(&eval(then_schema, instance, path, config, errors));
            }
        } else if let Some(else_schema) = schema.get("else") {
            evaluated.merge(&eval(else_schema, instance, path, config, errors));
        }
    }

    evaluated
}

fn check_unevaluated(
    schema: &serde_json::Map<String, Value>,
    instance: &Value,
    path: &str,
    config: &ValidatorConfig,
    errors: &mut ErrorMap,
    evaluated: &Evaluated,
) {
    if let (Some(unevaluated_schema), Value::Object(props)) =
        (schema.get("unevaluatedProperties"), instance)
    {
        let leftover: Vec<String> = props
            .keys()
            .filter(|k| !evaluated.properties.contains(k.as_str()))
            .cloned()
            .collect();
        if !leftover.is_empty() {
            if matches!(unevaluated_schema, Value::Bool(false)) {
                push_err(errors, path, SchemaError::UnevaluatedProperties(leftover));
            } else {
                for key in &leftover {
                    eval(unevaluated_schema, &props[key], &child_path(path, key), config, errors);
                }
            }
        }
    }

    if let (Some(unevaluated_schema), Value::Array(items)) =
        (schema.get("unevaluatedItems"), instance)
    {
        let leftover: Vec<usize> = (0..items.len())
            .filter(|i| !evaluated.items.contains(i))
            .collect();
        if !leftover.is_empty() {
            if matches!(unevaluated_schema, Value::Bool(false)) {
                push_err(errors, path, SchemaError::UnevaluatedItems(leftover));
            } else {
                for i in &leftover {
                    eval(unevaluated_schema, &items[*i], &child_path(path, &i.to_string()), config, errors);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(schema: Value, instance: Value) -> ValidationResult {
        validate(&schema, &instance, &ValidatorConfig::default())
    }

    #[test]
    fn type_mismatch_is_reported() {
        let r = v(json!({"type": "string"}), json!(42));
        assert!(!r.valid);
    }

    #[test]
    fn required_property_missing_is_reported() {
        let r = v(json!({"type": "object", "required": ["name"]}), json!({}));
        assert!(!r.valid);
    }

    #[test]
    fn nested_properties_validate_recursively() {
        let r = v(
            json!({"type": "object", "properties": {"age": {"type": "integer", "minimum": 0}}}),
            json!({"age": -1}),
        );
        assert!(!r.valid);
    }

    #[test]
    fn integer_const_matches_float_representation() {
        let r = v(json!({"const": 3}), json!(3.0));
        assert!(r.valid);
    }

    #[test]
    fn one_of_requires_exactly_one_match() {
        let r = v(
            json!({"oneOf": [{"type": "string"}, {"type": "number"}]}),
            json!("hello"),
        );
        assert!(r.valid);

        let r = v(
            json!({"oneOf": [{"type": "string"}, {"minLength": 1}]}),
            json!("hello"),
        );
        assert!(!r.valid);
    }

    #[test]
    fn unevaluated_properties_false_rejects_extras() {
        let r = v(
            json!({"type": "object", "properties": {"a": {}}, "unevaluatedProperties": false}),
            json!({"a": 1, "b": 2}),
        );
        assert!(!r.valid);
    }

    #[test]
    fn unevaluated_properties_allows_when_all_declared() {
        let r = v(
            json!({"type": "object", "properties": {"a": {}}, "unevaluatedProperties": false}),
            json!({"a": 1}),
        );
        assert!(r.valid);
    }

    #[test]
    fn if_then_else_branches_correctly() {
        let schema = json!({
            "if": {"properties": {"kind": {"const": "a"}}},
            "then": {"required": ["a_field"]},
            "else": {"required": ["b_field"]}
        });
        assert!(v(schema.clone(), json!({"kind": "a", "a_field": 1})).valid);
        assert!(!v(schema, json!({"kind": "a"})).valid);
    }

    #[test]
    fn contains_enforces_min_and_max() {
        let schema = json!({"contains": {"type": "number"}, "minContains": 2});
        assert!(!v(schema.clone(), json!([1, "x", "y"])).valid);
        assert!(v(schema, json!([1, 2, "y"])).valid);
    }

    #[test]
    fn schema_false_never_validates() {
        let r = v(json!(false), json!(null));
        assert!(!r.valid);
    }

    #[test]
    fn schema_true_always_validates() {
        let r = v(json!(true), json!({"anything": "goes"}));
        assert!(r.valid);
    }

    #[test]
    fn validate_is_total_for_deeply_nested_structures() {
        let schema = json!({
            "type": "object",
            "properties": {
                "items": {"type": "array", "items": {"type": "integer"}}
            }
        });
        let instance = json!({"items": [1, 2, 3]});
        let r = v(schema, instance);
        assert!(r.valid);
    }
}
