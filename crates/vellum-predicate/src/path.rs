//! Dot-separated field paths into nested documents.

use serde_json::Value;
use std::fmt;
use vellum_core::SyntaxError;

/// An ordered sequence of segment names addressing nested structure.
///
/// Object segments select a key; on arrays a segment must be a decimal index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dot-separated path such as `sub.items.0.name`.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SyntaxError::new("empty field path", text));
        }

        let segments: Vec<String> = text.split('.').map(str::to_string).collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || s.chars().any(char::is_whitespace))
        {
            return Err(SyntaxError::new("invalid field path", text));
        }

        Ok(Self { segments })
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolves the path inside `document`.
    ///
    /// Returns `None` when a key is absent, an index is out of range or an
    /// intermediate value is a scalar. A present `null` resolves to
    /// `Some(&Value::Null)`.
    #[must_use]
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(document, |current, segment| match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Whether the path resolves to a present key (possibly `null`).
    #[must_use]
    pub fn exists_in(&self, document: &Value) -> bool {
        self.resolve(document).is_some()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse(".a").is_err());
        assert!(FieldPath::parse("a.b").is_ok());
    }

    #[test]
    fn test_null_vs_absent() {
        let doc = json!({"bar": null});
        assert!(FieldPath::parse("bar").unwrap().exists_in(&doc));
        assert!(!FieldPath::parse("foo").unwrap().exists_in(&doc));
    }

    #[test]
    fn test_scalar_intermediate_resolves_to_none() {
        let doc = json!({"bar": 1});
        assert!(FieldPath::parse("bar.foo").unwrap().resolve(&doc).is_none());
    }

    #[test]
    fn test_array_index_segments() {
        let doc = json!({"items": [{"name": "a"}, {"name": "b"}]});
        let path = FieldPath::parse("items.1.name").unwrap();
        assert_eq!(path.resolve(&doc), Some(&json!("b")));
        assert!(FieldPath::parse("items.2.name").unwrap().resolve(&doc).is_none());
        assert!(FieldPath::parse("items.x").unwrap().resolve(&doc).is_none());
    }
}
