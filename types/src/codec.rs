//! Canonical JSON encoding and content hashing.
//!
//! Every byte that is hashed or chained in this system goes through this
//! module: mappings are rewritten key-sorted (lexicographic byte order),
//! sequence order is preserved, separators carry no whitespace, and
//! non-ASCII text is emitted as literal UTF-8 rather than `\uXXXX` escapes.
//! Two values that are equal as JSON up to mapping key order therefore
//! produce identical bytes and identical hashes.
//!
//! Floating-point values are out of scope: hashed payloads are restricted
//! to strings, integers, booleans, null, mappings, and sequences.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Rewrite `value` into canonical form: key-sorted mappings, recursively.
///
/// Scalars pass through unchanged; sequences keep their order. Idempotent.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            let mut out = serde_json::Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        scalar => scalar.clone(),
    }
}

/// Emit the canonical UTF-8 JSON bytes of `value`.
///
/// Key order is enforced during the write itself, so the guarantee holds
/// regardless of how the backing `serde_json::Map` is ordered.
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    write_canonical(value, &mut buf);
    buf
}

/// SHA-256 over [`canonical_bytes`], rendered as 64 lowercase hex chars.
#[must_use]
pub fn content_hash(value: &Value) -> String {
    hex::encode(Sha256::digest(canonical_bytes(value)))
}

/// Hash any serde-serializable record through its canonical JSON form.
pub fn hash_record<T: Serialize>(record: &T) -> Result<String, serde_json::Error> {
    Ok(content_hash(&serde_json::to_value(record)?))
}

fn write_canonical(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_json_string(s, buf),
        Value::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_canonical(item, buf);
            }
            buf.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            buf.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_json_string(key, buf);
                buf.push(b':');
                write_canonical(&map[key.as_str()], buf);
            }
            buf.push(b'}');
        }
    }
}

fn write_json_string(s: &str, buf: &mut Vec<u8>) {
    buf.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => buf.extend_from_slice(b"\\\""),
            '\\' => buf.extend_from_slice(b"\\\\"),
            '\n' => buf.extend_from_slice(b"\\n"),
            '\r' => buf.extend_from_slice(b"\\r"),
            '\t' => buf.extend_from_slice(b"\\t"),
            '\u{08}' => buf.extend_from_slice(b"\\b"),
            '\u{0C}' => buf.extend_from_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                let mut escaped = String::with_capacity(6);
                escaped.push_str("\\u");
                let code = c as u32;
                for shift in [12, 8, 4, 0] {
                    let digit = (code >> shift) & 0xF;
                    escaped.push(char::from_digit(digit, 16).unwrap_or('0'));
                }
                buf.extend_from_slice(escaped.as_bytes());
            }
            c => {
                let mut utf8 = [0u8; 4];
                buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }
    buf.push(b'"');
}
