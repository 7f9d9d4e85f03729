//! The CSON subset used for meta-data headers.
//!
//! Decoding accepts JSON and the YAML-compatible part of CSON (indented
//! `key: value` pairs, inline arrays and objects, `#` comments). Headers are
//! data only, nothing is evaluated.
//!
//! Encoding writes one `key: value` line per entry, nesting objects by
//! indentation and writing every scalar and array as JSON.

use serde_json::{Map, Value};

use super::meta::DecodeError;

/// Decode a CSON header into a value.
pub fn decode(source: &str) -> Result<Value, DecodeError> {
    if let Ok(value) = serde_json::from_str(source) {
        return Ok(value);
    }
    Ok(serde_yaml::from_str(&source.replace('\t', "    "))?)
}

/// Encode a mapping as CSON.
pub fn encode(map: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_map(&mut out, map, 0);
    out.truncate(out.trim_end().len());
    out
}

fn write_map(out: &mut String, map: &Map<String, Value>, depth: usize) {
    for (key, value) in map {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&encode_key(key));
        out.push(':');
        match value {
            Value::Object(inner) if !inner.is_empty() => {
                out.push('\n');
                write_map(out, inner, depth + 1);
            }
            other => {
                out.push(' ');
                out.push_str(&other.to_string());
                out.push('\n');
            }
        }
    }
}

fn encode_key(key: &str) -> String {
    if is_bare_key(key) {
        key.to_string()
    } else {
        Value::String(key.to_string()).to_string()
    }
}

/// Keys that read back as the same string without quoting.
fn is_bare_key(key: &str) -> bool {
    let mut chars = key.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !matches!(
            key.to_ascii_lowercase().as_str(),
            "true" | "false" | "null" | "yes" | "no" | "on" | "off" | "y" | "n" | "undefined"
        )
}
