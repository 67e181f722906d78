//! Content-addressed job fingerprinting.
//!
//! A fingerprint is the dedup key for a job: two specs that normalize to the
//! same content must hash identically regardless of how the client spelled
//! them. Normalization (list sorting, default filling, scheme-prefix
//! stripping) happens in the per-kind request types before anything reaches
//! this module; here we only guarantee a canonical encoding and a stable
//! digest over it.

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::models::JobKind;

/// Serialize a JSON value canonically: object keys recursively sorted,
/// no insignificant whitespace.
pub fn canonical_json(value: &JsonValue) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&JsonValue::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Compute the fingerprint for a normalized spec.
///
/// Pure, total, deterministic: equal `(kind, canonical spec)` pairs produce
/// equal fingerprints. The digest is SHA-256 over the kind tag and the
/// canonical JSON encoding, hex-encoded lowercase.
pub fn fingerprint(kind: JobKind, spec: &JsonValue) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_json(spec).as_bytes());
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-256 of raw bytes.
///
/// Used to fingerprint file-content-derived parameters (uploaded datasets)
/// by their bytes rather than their filename.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a = json!({"b": 1, "a": {"z": true, "y": [1, 2]}});
        assert_eq!(canonical_json(&a), r#"{"a":{"y":[1,2],"z":true},"b":1}"#);
    }

    #[test]
    fn test_canonical_json_preserves_array_order() {
        // Array order is semantic; list parameters are sorted during
        // normalization, not here.
        let a = json!({"seeds": ["b", "a"]});
        assert_eq!(canonical_json(&a), r#"{"seeds":["b","a"]}"#);
    }

    #[test]
    fn test_canonical_json_escapes_strings() {
        let a = json!({"k": "line\nbreak"});
        assert_eq!(canonical_json(&a), r#"{"k":"line\nbreak"}"#);
    }

    #[test]
    fn test_fingerprint_key_order_independent() {
        let a = json!({"damping_factor": 0.85, "seeds": ["P1", "P2"]});
        let b = json!({"seeds": ["P1", "P2"], "damping_factor": 0.85});
        assert_eq!(
            fingerprint(JobKind::TrustRank, &a),
            fingerprint(JobKind::TrustRank, &b)
        );
    }

    #[test]
    fn test_fingerprint_differs_across_kinds() {
        let spec = json!({"seeds": ["P1"]});
        assert_ne!(
            fingerprint(JobKind::TrustRank, &spec),
            fingerprint(JobKind::Closeness, &spec)
        );
    }

    #[test]
    fn test_fingerprint_differs_on_content() {
        let a = json!({"seeds": ["P1"]});
        let b = json!({"seeds": ["P2"]});
        assert_ne!(
            fingerprint(JobKind::TrustRank, &a),
            fingerprint(JobKind::TrustRank, &b)
        );
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint(JobKind::Diamond, &json!({}));
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_content_hash_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_hash_ignores_nothing_but_bytes() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }
}
