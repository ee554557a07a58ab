//! Smart JSON merge
//!
//! Remote defaults flow into local files without clobbering user edits: new
//! keys are added, existing keys keep their local value, and nested objects
//! are merged recursively.

use serde_json::{Map, Value};

/// Merge `remote` into `local`. Local wins at every leaf.
pub fn smart_merge(local: &Map<String, Value>, remote: &Map<String, Value>) -> Map<String, Value> {
    let mut result = local.clone();

    for (key, remote_value) in remote {
        if !result.contains_key(key) {
            result.insert(key.clone(), remote_value.clone());
            continue;
        }
        if let (Some(Value::Object(local_obj)), Value::Object(remote_obj)) = (result.get_mut(key), remote_value) {
            let merged = smart_merge(local_obj, remote_obj);
            *local_obj = merged;
        }
    }

    result
}

/// Merge two arbitrary documents. When either side is not an object the local
/// document is kept as-is.
pub fn merge_values(local: Value, remote: &Value) -> Value {
    match (local, remote) {
        (Value::Object(l), Value::Object(r)) => Value::Object(smart_merge(&l, r)),
        (local, _) => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let x = obj(json!({
            "prefix": "!",
            "nested": {"a": 1, "b": [1, 2], "c": {"d": null}},
            "list": ["x"]
        }));
        assert_eq!(smart_merge(&x, &x), x);
    }

    #[test]
    fn test_local_wins_on_scalars_and_arrays() {
        let local = obj(json!({"prefix": "?", "roles": [1], "flag": false}));
        let remote = obj(json!({"prefix": "!", "roles": [2, 3], "flag": true}));
        let merged = smart_merge(&local, &remote);
        assert_eq!(merged["prefix"], json!("?"));
        assert_eq!(merged["roles"], json!([1]));
        assert_eq!(merged["flag"], json!(false));
    }

    #[test]
    fn test_remote_only_keys_are_added() {
        let local = obj(json!({"a": 1}));
        let remote = obj(json!({"a": 2, "b": {"c": 3}}));
        let merged = smart_merge(&local, &remote);
        assert_eq!(merged["a"], json!(1));
        assert_eq!(merged["b"], json!({"c": 3}));
    }

    #[test]
    fn test_nested_objects_merge_recursively() {
        let local = obj(json!({"auto_actions": {"warns": 3, "custom": true}}));
        let remote = obj(json!({"auto_actions": {"warns": 5, "mute_after": 2}}));
        let merged = smart_merge(&local, &remote);
        assert_eq!(
            merged["auto_actions"],
            json!({"warns": 3, "custom": true, "mute_after": 2})
        );
    }

    #[test]
    fn test_object_vs_scalar_keeps_local() {
        let local = obj(json!({"a": {"x": 1}, "b": 5}));
        let remote = obj(json!({"a": 7, "b": {"y": 2}}));
        let merged = smart_merge(&local, &remote);
        assert_eq!(merged["a"], json!({"x": 1}));
        assert_eq!(merged["b"], json!(5));
    }

    #[test]
    fn test_local_key_order_preserved() {
        let local = obj(json!({"z": 1, "a": 2}));
        let remote = obj(json!({"m": 3, "a": 9}));
        let merged = smart_merge(&local, &remote);
        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_merge_values_non_object_keeps_local() {
        assert_eq!(merge_values(json!([1]), &json!({"a": 1})), json!([1]));
        assert_eq!(merge_values(json!({}), &json!({"a": 1})), json!({"a": 1}));
    }
}
