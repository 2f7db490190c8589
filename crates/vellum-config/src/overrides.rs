//! Override directives: path-addressed overlays onto a configuration tree.
//!
//! The surface syntax is a `;`-separated list of `path->value` directives:
//!
//! ```text
//! /logging/level->"debug";/plugins/audit/priority->10;/resources/users->{id_type: 'string'}
//! ```
//!
//! `path` is absolute with segments of letters, digits, `_` and `-` (a
//! segment cannot start with `-`). `value` is tried as an integer, then a
//! boolean, then a quoted string, then a lenient JSON object or array.

use crate::ConfigError;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;
use vellum_core::SyntaxError;

const OPERATOR: &str = "->";

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]*$").expect("valid regex"))
}

/// The typed value of a directive.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideValue {
    /// Integer literal.
    Integer(i64),
    /// `true` or `false`.
    Boolean(bool),
    /// Quoted string, unescaped.
    String(String),
    /// JSON-like object.
    Object(Map<String, Value>),
    /// JSON-like array.
    Array(Vec<Value>),
}

impl OverrideValue {
    /// Converts the value to a JSON tree node.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(n) => Value::from(*n),
            Self::Boolean(b) => Value::Bool(*b),
            Self::String(s) => Value::String(s.clone()),
            Self::Object(map) => Value::Object(map.clone()),
            Self::Array(items) => Value::Array(items.clone()),
        }
    }
}

impl fmt::Display for OverrideValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Self::Object(_) | Self::Array(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// One `path->value` overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideDirective {
    path: String,
    segments: Vec<String>,
    value: OverrideValue,
}

impl OverrideDirective {
    /// Builds a directive, validating the path.
    pub fn new(path: &str, value: OverrideValue) -> Result<Self, SyntaxError> {
        let segments = parse_path(path)?;
        Ok(Self {
            path: path.trim().to_string(),
            segments,
            value,
        })
    }

    /// The absolute path, e.g. `/a/b/c`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The directive value.
    #[must_use]
    pub fn value(&self) -> &OverrideValue {
        &self.value
    }

    /// Overlays this directive onto `tree`.
    ///
    /// Missing intermediate objects are created. On an array a segment is an
    /// index; an index equal to the length appends.
    pub fn apply(&self, tree: &mut Value) -> Result<(), ConfigError> {
        if tree.is_null() {
            *tree = Value::Object(Map::new());
        }

        let (last, parents) = self
            .segments
            .split_last()
            .ok_or_else(|| ConfigError::invalid_override(&self.path, "empty path"))?;

        let mut current = tree;
        for segment in parents {
            current = self.child_mut(current, segment)?;
        }

        match current {
            Value::Object(map) => {
                map.insert(last.clone(), self.value.to_json());
                Ok(())
            }
            Value::Array(items) => {
                let index = self.index(last, items.len())?;
                if index == items.len() {
                    items.push(self.value.to_json());
                } else {
                    items[index] = self.value.to_json();
                }
                Ok(())
            }
            _ => Err(ConfigError::invalid_override(
                &self.path,
                format!("parent of `{last}` is not a container"),
            )),
        }
    }

    fn child_mut<'t>(&self, node: &'t mut Value, segment: &str) -> Result<&'t mut Value, ConfigError> {
        match node {
            Value::Object(map) => Ok(map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()))),
            Value::Array(items) => {
                let index = self.index(segment, items.len())?;
                if index == items.len() {
                    items.push(Value::Object(Map::new()));
                }
                Ok(&mut items[index])
            }
            _ => Err(ConfigError::invalid_override(
                &self.path,
                format!("cannot descend into `{segment}`: parent is a scalar"),
            )),
        }
    }

    fn index(&self, segment: &str, len: usize) -> Result<usize, ConfigError> {
        match segment.parse::<usize>() {
            Ok(index) if index <= len => Ok(index),
            Ok(index) => Err(ConfigError::invalid_override(
                &self.path,
                format!("index {index} out of bounds for array of length {len}"),
            )),
            Err(_) => Err(ConfigError::invalid_override(
                &self.path,
                format!("`{segment}` is not an array index"),
            )),
        }
    }
}

impl fmt::Display for OverrideDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{OPERATOR}{}", self.path, self.value)
    }
}

/// Parses a directive string. Blank input yields no directives.
///
/// # Example
///
/// ```
/// use vellum_config::{parse_overrides, OverrideValue};
///
/// let directives = parse_overrides("/a/b->1;/c->'x;y'").unwrap();
/// assert_eq!(directives.len(), 2);
/// assert_eq!(directives[1].value(), &OverrideValue::String("x;y".into()));
/// ```
pub fn parse_overrides(text: &str) -> Result<Vec<OverrideDirective>, SyntaxError> {
    split_directives(text)
        .into_iter()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(parse_directive)
        .collect()
}

/// Applies directives left to right.
pub fn apply_overrides(tree: &mut Value, directives: &[OverrideDirective]) -> Result<(), ConfigError> {
    for directive in directives {
        directive.apply(tree)?;
        tracing::debug!(path = %directive.path(), "applied configuration override");
    }
    Ok(())
}

/// Parses one directive value.
pub fn parse_value(text: &str) -> Result<OverrideValue, SyntaxError> {
    let text = text.trim();

    if let Ok(n) = text.parse::<i64>() {
        return Ok(OverrideValue::Integer(n));
    }
    match text {
        "true" => return Ok(OverrideValue::Boolean(true)),
        "false" => return Ok(OverrideValue::Boolean(false)),
        _ => {}
    }

    if let Some(quote) = text.chars().next().filter(|c| *c == '\'' || *c == '"') {
        return parse_quoted(text, quote).map(OverrideValue::String);
    }

    match json5::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(OverrideValue::Object(map)),
        Ok(Value::Array(items)) => Ok(OverrideValue::Array(items)),
        Ok(_) => Err(SyntaxError::new(
            "value must be an integer, boolean, quoted string, object or array",
            text,
        )),
        Err(e) => Err(SyntaxError::new(format!("invalid value: {e}"), text)),
    }
}

fn parse_directive(raw: &str) -> Result<OverrideDirective, SyntaxError> {
    let (path, value) = raw
        .split_once(OPERATOR)
        .ok_or_else(|| SyntaxError::new("missing `->` operator", raw))?;
    let segments = parse_path(path)?;
    let value = parse_value(value)?;
    Ok(OverrideDirective {
        path: path.trim().to_string(),
        segments,
        value,
    })
}

fn parse_path(path: &str) -> Result<Vec<String>, SyntaxError> {
    let path = path.trim();
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| SyntaxError::new("path must be absolute", path))?;

    let segments: Vec<String> = rest.split('/').map(str::to_string).collect();
    if let Some(bad) = segments.iter().find(|s| !segment_pattern().is_match(s)) {
        return Err(SyntaxError::new(format!("invalid path segment `{bad}`"), path));
    }
    Ok(segments)
}

fn parse_quoted(text: &str, quote: char) -> Result<String, SyntaxError> {
    let mut out = String::new();
    let mut chars = text.char_indices().skip(1).peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some((_, '\'' | '"' | '\\'))) => {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            c if c == quote => {
                let trailing = &text[i + c.len_utf8()..];
                if !trailing.trim().is_empty() {
                    return Err(SyntaxError::new(
                        "unexpected text after quoted string",
                        text,
                    ));
                }
                return Ok(out);
            }
            c => out.push(c),
        }
    }

    Err(SyntaxError::new("unterminated quoted string", text))
}

/// Splits on `;` outside quoted text.
fn split_directives(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                if matches!(chars.peek(), Some((_, '\'' | '"' | '\\'))) {
                    chars.next();
                }
            }
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, ';') => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn directive(text: &str) -> OverrideDirective {
        let mut all = parse_overrides(text).unwrap();
        assert_eq!(all.len(), 1);
        all.remove(0)
    }

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(split_directives("/a->1;/b->2"), vec!["/a->1", "/b->2"]);
        assert_eq!(split_directives("/a->'x;y';/b->2"), vec!["/a->'x;y'", "/b->2"]);
        assert_eq!(split_directives(r"/a->'x\';y'"), vec![r"/a->'x\';y'"]);
        assert_eq!(split_directives(r#"/a->{"k": "v;"}"#), vec![r#"/a->{"k": "v;"}"#]);
    }

    #[test]
    fn test_value_precedence() {
        assert_eq!(parse_value("42").unwrap(), OverrideValue::Integer(42));
        assert_eq!(parse_value("-7").unwrap(), OverrideValue::Integer(-7));
        assert_eq!(parse_value("true").unwrap(), OverrideValue::Boolean(true));
        assert_eq!(parse_value("'42'").unwrap(), OverrideValue::String("42".into()));
        assert_eq!(parse_value("\"true\"").unwrap(), OverrideValue::String("true".into()));
    }

    #[test]
    fn test_scalar_json_fallback_is_rejected() {
        assert!(parse_value("1.5").is_err());
        assert!(parse_value("null").is_err());
        assert!(parse_value("bare").is_err());
        assert!(parse_value("").is_err());
    }

    #[test]
    fn test_quoted_string_rules() {
        assert_eq!(
            parse_value(r#""say \"hi\"""#).unwrap(),
            OverrideValue::String("say \"hi\"".into())
        );
        assert!(parse_value("'open").is_err());
        assert!(parse_value("'done' extra").is_err());
        assert_eq!(parse_value("'done'   ").unwrap(), OverrideValue::String("done".into()));
    }

    #[test]
    fn test_path_validation() {
        assert!(parse_path("/a/b_c/d-e/0").is_ok());
        assert!(parse_path("a/b").is_err());
        assert!(parse_path("/").is_err());
        assert!(parse_path("/a//b").is_err());
        assert!(parse_path("/a/").is_err());
        assert!(parse_path("/-a").is_err());
        assert!(parse_path("/a b").is_err());
    }

    #[test]
    fn test_apply_creates_intermediate_objects() {
        let mut tree = json!({});
        directive("/a/b/c->1").apply(&mut tree).unwrap();
        assert_eq!(tree, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_apply_replaces_existing_value() {
        let mut tree = json!({"a": {"b": "old", "keep": true}});
        directive("/a/b->\"new\"").apply(&mut tree).unwrap();
        assert_eq!(tree, json!({"a": {"b": "new", "keep": true}}));
    }

    #[test]
    fn test_apply_array_index_and_append() {
        let mut tree = json!({"list": [1, 2]});
        directive("/list/0->10").apply(&mut tree).unwrap();
        directive("/list/2->30").apply(&mut tree).unwrap();
        assert_eq!(tree, json!({"list": [10, 2, 30]}));

        assert!(directive("/list/9->1").apply(&mut tree).is_err());
        assert!(directive("/list/x->1").apply(&mut tree).is_err());
    }

    #[test]
    fn test_apply_through_array_element() {
        let mut tree = json!({"list": [{"name": "a"}]});
        directive("/list/0/name->'b'").apply(&mut tree).unwrap();
        assert_eq!(tree, json!({"list": [{"name": "b"}]}));
    }

    #[test]
    fn test_apply_through_scalar_fails() {
        let mut tree = json!({"a": 1});
        let err = directive("/a/b->2").apply(&mut tree).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
        assert_eq!(tree, json!({"a": 1}));
    }

    #[test]
    fn test_apply_in_order() {
        let mut tree = json!({});
        let directives = parse_overrides("/a->1;/a->2").unwrap();
        apply_overrides(&mut tree, &directives).unwrap();
        assert_eq!(tree, json!({"a": 2}));
    }

    #[test]
    fn test_display() {
        assert_eq!(directive("/a/b->1").to_string(), "/a/b->1");
        assert_eq!(directive("/a->'x'").to_string(), "/a->\"x\"");
        assert_eq!(directive("/a->{'k': [1]}").to_string(), r#"/a->{"k":[1]}"#);
    }
}
