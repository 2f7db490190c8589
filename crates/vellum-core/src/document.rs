//! Document helpers.
//!
//! Documents are `serde_json` values; a stored document is always a JSON
//! object. Literals embedded in directive and predicate text are parsed with
//! the lenient JSON5 grammar so that single-quoted strings are accepted.

use crate::error::SyntaxError;
use serde_json::{Map, Value};

/// A semi-structured document: nested objects, arrays and scalars.
pub type Document = Value;

/// The key holding a document's identifier.
pub const ID_KEY: &str = "_id";

/// Parses a JSON-like literal, accepting single or double quoted strings.
///
/// # Example
///
/// ```
/// use vellum_core::document::parse_literal;
///
/// let value = parse_literal("{'a': 1, \"b\": [true, null]}").unwrap();
/// assert_eq!(value["a"], 1);
/// assert!(value["b"][1].is_null());
/// ```
pub fn parse_literal(text: &str) -> Result<Value, SyntaxError> {
    json5::from_str::<Value>(text)
        .map_err(|e| SyntaxError::new(format!("invalid literal: {e}"), text))
}

/// Shallow merge: keys of `patch` replace the same keys of `target`, other
/// keys of `target` are kept.
pub fn shallow_merge(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
}

/// Returns the canonical form of an identifier.
///
/// Integral floating point numbers become integers and `{"$oid": ...}` hex
/// is lowercased, so `1` and `1.0` (or upper and lower case ObjectIds) name
/// the same document. Other values are returned unchanged.
///
/// ```
/// use serde_json::json;
/// use vellum_core::document::canonical_id;
///
/// assert_eq!(canonical_id(&json!(1.0)), json!(1));
/// assert_eq!(canonical_id(&json!({"$oid": "ABC"})), json!({"$oid": "abc"}));
/// assert_eq!(canonical_id(&json!(1.5)), json!(1.5));
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn canonical_id(id: &Value) -> Value {
    match id {
        Value::Number(n) if !n.is_i64() && !n.is_u64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Value::from(f as i64),
            _ => id.clone(),
        },
        Value::Object(map) if map.len() == 1 => match map.get("$oid") {
            Some(Value::String(hex)) => serde_json::json!({ "$oid": hex.to_ascii_lowercase() }),
            _ => id.clone(),
        },
        other => other.clone(),
    }
}

/// Renders an identifier the way it appears in a resource path.
///
/// `{"$oid": "..."}` renders as its hex string, strings render unquoted and
/// everything else renders as JSON.
#[must_use]
pub fn id_to_path_segment(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("$oid") {
            Some(Value::String(hex)) if map.len() == 1 => hex.clone(),
            _ => id.to_string(),
        },
        other => other.to_string(),
    }
}
