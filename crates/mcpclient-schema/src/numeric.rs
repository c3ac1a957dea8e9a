//! Cross-compatible numeric equality: an integer and a number are equal
//! whenever they are numerically equal, regardless of how `serde_json`
//! represents them internally (spec: "integer/number are cross-compatible
//! when numerically equal").

use serde_json::Value;

fn as_f64(n: &serde_json::Number) -> Option<f64> {
    n.as_f64()
}

/// Deep structural equality used by `const`, `enum`, and `uniqueItems`.
/// Object key order is ignored; numbers compare numerically rather than by
/// JSON representation.
pub fn deep_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (as_f64(x), as_f64(y)) {
            (Some(fx), Some(fy)) => fx == fy,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_eq(x, y))
        }
        (Value::Object(xo), Value::Object(yo)) => {
            xo.len() == yo.len()
                && xo
                    .iter()
                    .all(|(k, v)| yo.get(k).is_some_and(|other| deep_eq(v, other)))
        }
        (x, y) => x == y,
    }
}

pub fn multiple_of_holds(value: f64, factor: f64, tolerance: f64) -> bool {
    if factor == 0.0 {
        return false;
    }
    let quotient = value / factor;
    (quotient - quotient.round()).abs() <= tolerance
}
