use serde::{ser::Error as _, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Milliseconds since the Unix epoch, used for generated ids and upload keys.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Build a JSON object from `(field, value)` pairs.
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Serialize a record into the field map of a document.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde_json::Error::custom(format!(
            "expected an object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn millis_are_increasing_and_plausible() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000);
    }

    #[test]
    fn fields_builds_an_object() {
        let map = fields([("read", json!(true)), ("title", json!("Hi"))]);
        assert_eq!(Value::Object(map), json!({"read": true, "title": "Hi"}));
    }
}
