//! Canonical checksum of a transaction batch.
//!
//! The canonical form is the one the Safe transaction builder verifies:
//!
//! - object: `{` + JSON array of the sorted keys + each value's canonical
//!   form followed by `,` + `}`
//! - array: `[` + comma-joined canonical elements + `]`
//! - scalar: plain JSON
//!
//! Keys sort by UTF-16 code units. Before serializing, `meta.name` is set to
//! `null` and `meta.checksum` is dropped, so renaming a batch keeps its
//! checksum. The canonical string is hashed with Keccak-256.

use alloy_primitives::{hex, keccak256};
use serde_json::{Map, Value};

/// Outcome of checking the checksum embedded in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumStatus {
    Valid,
    Missing,
    Mismatch { embedded: String, computed: String },
}

/// Deterministic serialization of a JSON value.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            out.push_str(&Value::from(keys.iter().map(|k| k.as_str()).collect::<Vec<_>>()).to_string());
            for key in keys {
                write_canonical(&map[key.as_str()], out);
                out.push(',');
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Copy of `document` as it enters the hash: name nulled, checksum removed.
fn checksum_input(document: &Value) -> Value {
    let mut input = document.clone();
    if let Value::Object(root) = &mut input {
        let meta = root
            .entry("meta")
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        if let Value::Object(meta) = meta {
            meta.insert("name".to_string(), Value::Null);
            meta.remove("checksum");
        }
    }
    input
}

/// `0x`-prefixed Keccak-256 of the canonical form.
pub fn compute_checksum(document: &Value) -> String {
    let canonical = canonicalize(&checksum_input(document));
    hex::encode_prefixed(keccak256(canonical.as_bytes()))
}

/// Write the checksum into `meta.checksum`. Returns it.
pub fn stamp(document: &mut Value) -> String {
    let checksum = compute_checksum(document);
    if let Some(Value::Object(meta)) = document.get_mut("meta") {
        meta.insert("checksum".to_string(), Value::String(checksum.clone()));
    }
    checksum
}

/// Recompute and compare against `meta.checksum` (case-insensitive hex).
pub fn verify_checksum(document: &Value) -> ChecksumStatus {
    let embedded = match document.pointer("/meta/checksum").and_then(Value::as_str) {
        Some(c) => c.to_string(),
        None => return ChecksumStatus::Missing,
    };
    let computed = compute_checksum(document);
    if embedded.eq_ignore_ascii_case(&computed) {
        ChecksumStatus::Valid
    } else {
        ChecksumStatus::Mismatch { embedded, computed }
    }
}
