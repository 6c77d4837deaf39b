//! Field-level write semantics shared by every store backend.

use serde_json::{Map, Value};

use super::{DocRef, Document, SetMode, StoreError};

pub(crate) fn set(current: Option<Document>, data: Map<String, Value>, mode: SetMode) -> Map<String, Value> {
    match (mode, current) {
        (SetMode::Merge, Some(doc)) => {
            let mut merged = doc.data;
            deep_merge(&mut merged, data);
            merged
        }
        _ => data,
    }
}

pub(crate) fn update(
    doc: &DocRef,
    current: Option<Document>,
    fields: Map<String, Value>,
) -> Result<Map<String, Value>, StoreError> {
    let mut data = current
        .ok_or_else(|| StoreError::NotFound(doc.path().to_string()))?
        .data;
    data.extend(fields);
    Ok(data)
}

pub(crate) fn array_union(
    current: Option<Document>,
    field: &str,
    values: Vec<Value>,
) -> Map<String, Value> {
    let mut data = current.map(|d| d.data).unwrap_or_default();
    let mut elements = take_array(&mut data, field);
    for value in values {
        if !elements.contains(&value) {
            elements.push(value);
        }
    }
    data.insert(field.to_string(), Value::Array(elements));
    data
}

pub(crate) fn array_remove(
    current: Option<Document>,
    field: &str,
    values: Vec<Value>,
) -> Map<String, Value> {
    let mut data = current.map(|d| d.data).unwrap_or_default();
    let mut elements = take_array(&mut data, field);
    elements.retain(|e| !values.contains(e));
    data.insert(field.to_string(), Value::Array(elements));
    data
}

pub(crate) fn array_replace(
    current: Option<Document>,
    field: &str,
    old: &Value,
    new: Value,
) -> Map<String, Value> {
    let mut data = current.map(|d| d.data).unwrap_or_default();
    let mut elements = take_array(&mut data, field);
    let at = elements.iter().position(|e| e == old);
    elements.retain(|e| e != old);
    if !elements.contains(&new) {
        let at = at.unwrap_or(elements.len()).min(elements.len());
        elements.insert(at, new);
    }
    data.insert(field.to_string(), Value::Array(elements));
    data
}

pub(crate) fn create(
    doc: &DocRef,
    current: Option<Document>,
    data: Map<String, Value>,
) -> Result<Map<String, Value>, StoreError> {
    match current {
        Some(existing) => Err(StoreError::Conflict {
            path: doc.path().to_string(),
            expected: 0,
            found: existing.version,
        }),
        None => Ok(data),
    }
}

pub(crate) fn overwrite_field(
    doc: &DocRef,
    current: Option<Document>,
    field: &str,
    value: Value,
    expected_version: Option<u64>,
) -> Result<Map<String, Value>, StoreError> {
    let found = current.as_ref().map(|d| d.version).unwrap_or(0);
    if let Some(expected) = expected_version {
        if found != expected {
            return Err(StoreError::Conflict {
                path: doc.path().to_string(),
                expected,
                found,
            });
        }
    }
    let mut data = current.map(|d| d.data).unwrap_or_default();
    data.insert(field.to_string(), value);
    Ok(data)
}

// A non-array value under `field` is replaced, not merged.
fn take_array(data: &mut Map<String, Value>, field: &str) -> Vec<Value> {
    match data.remove(field) {
        Some(Value::Array(elements)) => elements,
        _ => Vec::new(),
    }
}

fn deep_merge(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        if let Value::Object(incoming) = value {
            if let Some(Value::Object(existing)) = target.get_mut(&key) {
                deep_merge(existing, incoming);
                continue;
            }
            target.insert(key, Value::Object(incoming));
        } else {
            target.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(data: Value, version: u64) -> Option<Document> {
        Some(Document {
            id: "u1".into(),
            data: data.as_object().cloned().unwrap_or_default(),
            version,
        })
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_keeps_unrelated_fields_and_merges_nested_maps() {
        let current = doc(json!({"a": 1, "nested": {"x": 1, "y": 2}}), 3);
        let out = set(current, obj(json!({"b": 2, "nested": {"y": 5}})), SetMode::Merge);
        assert_eq!(
            Value::Object(out),
            json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 5}})
        );
    }

    #[test]
    fn replace_drops_previous_fields() {
        let current = doc(json!({"a": 1}), 1);
        let out = set(current, obj(json!({"b": 2})), SetMode::Replace);
        assert_eq!(Value::Object(out), json!({"b": 2}));
    }

    #[test]
    fn update_requires_existing_document() {
        let err = update(&DocRef::user("u1"), None, Map::new()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(p) if p == "users/u1"));
    }

    #[test]
    fn union_skips_values_already_present() {
        let current = doc(json!({"tags": ["Work"]}), 1);
        let out = array_union(current, "tags", vec![json!("Work"), json!("Gym")]);
        assert_eq!(out["tags"], json!(["Work", "Gym"]));
    }

    #[test]
    fn union_creates_missing_field_and_replaces_non_arrays() {
        let out = array_union(None, "tags", vec![json!("a")]);
        assert_eq!(out["tags"], json!(["a"]));

        let current = doc(json!({"tags": "oops"}), 1);
        let out = array_union(current, "tags", vec![json!("b")]);
        assert_eq!(out["tags"], json!(["b"]));
    }

    #[test]
    fn remove_drops_every_equal_element() {
        let current = doc(json!({"tags": ["a", "b", "a"]}), 1);
        let out = array_remove(current, "tags", vec![json!("a")]);
        assert_eq!(out["tags"], json!(["b"]));
    }

    #[test]
    fn replace_keeps_position_and_avoids_duplicates() {
        let current = doc(json!({"tags": ["Work", "Gym", "Trips"]}), 1);
        let out = array_replace(current, "tags", &json!("Gym"), json!("Office"));
        assert_eq!(out["tags"], json!(["Work", "Office", "Trips"]));

        let current = doc(json!({"tags": ["Work", "Gym"]}), 1);
        let out = array_replace(current, "tags", &json!("Work"), json!("Gym"));
        assert_eq!(out["tags"], json!(["Gym"]));

        let out = array_replace(None, "tags", &json!("gone"), json!("new"));
        assert_eq!(out["tags"], json!(["new"]));
    }

    #[test]
    fn create_refuses_existing_documents() {
        let data = obj(json!({"uid": "x"}));
        let err = create(&DocRef::user("u1"), doc(json!({}), 2), data.clone()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 0, found: 2, .. }));
        assert_eq!(create(&DocRef::user("u1"), None, data.clone()).unwrap(), data);
    }

    #[test]
    fn overwrite_checks_expected_version() {
        let current = doc(json!({"items": []}), 4);
        let err = overwrite_field(&DocRef::user("u1"), current.clone(), "items", json!([1]), Some(3))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { expected: 3, found: 4, .. }));

        let out = overwrite_field(&DocRef::user("u1"), current, "items", json!([1]), Some(4)).unwrap();
        assert_eq!(out["items"], json!([1]));
    }
}
