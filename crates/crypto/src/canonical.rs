use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Stable serialization for ETag hashing and replica-identical blobs.
///
/// Maps are emitted key-sorted, output is compact, and explicit nulls are
/// preserved (a field the schema serializes as null stays null; only
/// fields the schema omits are absent). Two semantically equal values
/// canonicalize to identical bytes on any platform.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let tree = serde_json::to_value(value)?;
    let mut out = Vec::with_capacity(256);
    write_canonical(&tree, &mut out);
    Ok(out)
}

/// Canonical form as a `serde_json::Value` with all maps key-sorted.
pub fn canonicalize_to_value<T: Serialize>(value: &T) -> Result<Value> {
    let tree = serde_json::to_value(value)?;
    Ok(sort_value(tree))
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                sorted.insert(k, sort_value(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => {
            // serde_json already renders integers in their smallest form.
            out.extend_from_slice(n.to_string().as_bytes());
        }
        Value::String(s) => {
            // serde_json's escaping is deterministic.
            out.extend_from_slice(serde_json::to_string(s).expect("string serialization").as_bytes());
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                out.extend_from_slice(
                    serde_json::to_string(key).expect("string serialization").as_bytes(),
                );
                out.push(b':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push(b'}');
        }
    }
}

/// Short fingerprint of a canonicalized value, quoted for direct use as an
/// HTTP `ETag` header.
pub fn etag<T: Serialize>(value: &T) -> Result<String> {
    let canonical = canonicalize(value)?;
    let digest = Sha256::digest(&canonical);
    Ok(format!("\"{}\"", hex::encode(&digest[..8])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_sorts_keys() {
        let value = json!({"zeta": 1, "alpha": {"b": 2, "a": 1}});
        let bytes = canonicalize(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"alpha":{"a":1,"b":2},"zeta":1}"#
        );
    }

    #[test]
    fn test_canonical_preserves_explicit_null() {
        let value = json!({"kept": null});
        let bytes = canonicalize(&value).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"kept":null}"#);
    }

    #[test]
    fn test_canonical_equal_for_reordered_maps() {
        let a = json!({"x": 1, "y": [ {"k": 1, "j": 2} ]});
        let b = json!({"y": [ {"j": 2, "k": 1} ], "x": 1});
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn test_etag_is_quoted_hex() {
        let tag = etag(&json!({"a": 1})).unwrap();
        assert!(tag.starts_with('"') && tag.ends_with('"'));
        // 8 bytes -> 16 hex characters plus the quotes
        assert_eq!(tag.len(), 18);
        assert!(tag[1..17].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_etag_changes_when_value_changes() {
        let before = etag(&json!({"mfaEnabled": false})).unwrap();
        let after = etag(&json!({"mfaEnabled": true})).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_etag_stable_for_equal_values() {
        let a = etag(&json!({"b": 2, "a": 1})).unwrap();
        let b = etag(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(a, b);
    }
}
