//! The document resource model.
//!
//! A [`ResourceRef`] names a collection (and optionally one document in it)
//! together with the collection's declared [`DocIdType`] and concurrency
//! policy. [`ETag`] is the opaque concurrency token of a stored document.

use crate::document::canonical_id;
use crate::error::{SyntaxError, VellumError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Internal resource names that can never be used as document identifiers.
const INTERNAL_RESOURCE_NAMES: [&str; 6] =
    ["_size", "_meta", "_indexes", "_aggrs", "_schemas", "_streams"];

/// Length of a generated object id in hex characters.
const OBJECT_ID_HEX_LEN: usize = 24;

/// Declared type of the `_id` of documents in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocIdType {
    /// Object id, stored as `{"$oid": "<24 hex>"}`. Auto-generated.
    #[default]
    #[serde(rename = "oid")]
    ObjectId,
    /// Object id rendered as a plain 24-hex string. Auto-generated.
    #[serde(rename = "string_oid")]
    StringObjectId,
    /// Free-form string id.
    String,
    /// Numeric id.
    Number,
}

impl DocIdType {
    /// Returns the configuration/query name of this id type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ObjectId => "oid",
            Self::StringObjectId => "string_oid",
            Self::String => "string",
            Self::Number => "number",
        }
    }

    /// Whether the store may generate identifiers of this type.
    #[must_use]
    pub const fn is_auto_generatable(self) -> bool {
        matches!(self, Self::ObjectId | Self::StringObjectId)
    }

    /// Generates a fresh identifier, if this type supports generation.
    #[must_use]
    pub fn generate(self) -> Option<Value> {
        let hex = Uuid::now_v7().simple().to_string();
        let hex = &hex[..OBJECT_ID_HEX_LEN];
        match self {
            Self::ObjectId => Some(json!({ "$oid": hex })),
            Self::StringObjectId => Some(Value::String(hex.to_string())),
            Self::String | Self::Number => None,
        }
    }

    /// Converts a path segment to an identifier value of this type.
    pub fn id_from_segment(self, segment: &str) -> Result<Value, SyntaxError> {
        match self {
            Self::ObjectId => {
                if is_object_id_hex(segment) {
                    Ok(json!({ "$oid": segment.to_ascii_lowercase() }))
                } else {
                    Err(SyntaxError::new("invalid ObjectId", segment))
                }
            }
            Self::StringObjectId | Self::String => Ok(Value::String(segment.to_string())),
            Self::Number => segment
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| {
                    segment
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .ok_or(())
                })
                .map(|id| canonical_id(&id))
                .map_err(|()| SyntaxError::new("invalid numeric id", segment)),
        }
    }

    /// Whether `id` falls in the reserved identifier namespace of this type.
    ///
    /// Internal resource names are reserved for every type; with string-like
    /// id types any `_`-prefixed string is reserved because it would shadow
    /// internal routes.
    #[must_use]
    pub fn is_reserved(self, id: &Value) -> bool {
        let Value::String(s) = id else {
            return false;
        };
        if INTERNAL_RESOURCE_NAMES.contains(&s.as_str()) {
            return true;
        }
        matches!(self, Self::String | Self::StringObjectId) && s.starts_with('_')
    }
}

impl fmt::Display for DocIdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocIdType {
    type Err = VellumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oid" => Ok(Self::ObjectId),
            "string_oid" => Ok(Self::StringObjectId),
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            other => Err(SyntaxError::new("unknown id type", other).into()),
        }
    }
}

fn is_object_id_hex(s: &str) -> bool {
    s.len() == OBJECT_ID_HEX_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// How a write combines the submitted content with the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// The submitted content replaces the stored document.
    #[default]
    Replace,
    /// Top-level keys of the submitted content replace the stored keys;
    /// other stored keys are left untouched.
    Merge,
}

/// An opaque document version used for compare-and-swap writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// Creates a token from an existing value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh, unique token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Parses an `If-Match`/`ETag` header value.
    ///
    /// Accepts quoted or bare values and ignores a weak `W/` prefix. Returns
    /// `None` for an empty value.
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        let value = value.strip_prefix("W/").unwrap_or(value);
        let value = value.trim_matches('"');
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    /// Returns the quoted header form of this token.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a collection, or to one document in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Collection name.
    pub collection: String,
    /// Document id addressed by the request path, if any.
    pub document_id: Option<Value>,
    /// The collection's declared id type.
    pub id_type: DocIdType,
    /// Whether writes must present the current concurrency token.
    pub etag_check_required: bool,
}

impl ResourceRef {
    /// Creates a reference to a whole collection.
    #[must_use]
    pub fn collection(name: impl Into<String>, id_type: DocIdType) -> Self {
        Self {
            collection: name.into(),
            document_id: None,
            id_type,
            etag_check_required: false,
        }
    }

    /// Addresses one document of the collection.
    #[must_use]
    pub fn with_document(mut self, id: Value) -> Self {
        self.document_id = Some(id);
        self
    }

    /// Sets the concurrency check policy.
    #[must_use]
    pub fn with_etag_check(mut self, required: bool) -> Self {
        self.etag_check_required = required;
        self
    }

    /// Whether a single document is addressed.
    #[must_use]
    pub fn is_document(&self) -> bool {
        self.document_id.is_some()
    }

    /// Returns the path of a document in this collection.
    #[must_use]
    pub fn document_path(&self, id: &Value) -> String {
        format!(
            "/{}/{}",
            self.collection,
            crate::document::id_to_path_segment(id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_object_id_shape() {
        let id = DocIdType::ObjectId.generate().unwrap();
        let hex = id["$oid"].as_str().unwrap();
        assert_eq!(hex.len(), 24);
        assert!(is_object_id_hex(hex));

        let plain = DocIdType::StringObjectId.generate().unwrap();
        assert_eq!(plain.as_str().unwrap().len(), 24);
    }

    #[test]
    fn test_non_generatable_types() {
        assert!(DocIdType::String.generate().is_none());
        assert!(DocIdType::Number.generate().is_none());
        assert!(!DocIdType::String.is_auto_generatable());
        assert!(DocIdType::ObjectId.is_auto_generatable());
    }

    #[test]
    fn test_id_from_segment() {
        assert_eq!(
            DocIdType::Number.id_from_segment("42").unwrap(),
            Value::from(42)
        );
        assert_eq!(
            DocIdType::String.id_from_segment("abc").unwrap(),
            Value::String("abc".into())
        );
        assert!(DocIdType::ObjectId.id_from_segment("xyz").is_err());
        assert!(DocIdType::Number.id_from_segment("forty").is_err());
        assert_eq!(DocIdType::Number.id_from_segment("1.0").unwrap(), json!(1));
        assert_eq!(DocIdType::Number.id_from_segment("1.5").unwrap(), json!(1.5));
    }

    #[test]
    fn test_reserved_ids() {
        assert!(DocIdType::ObjectId.is_reserved(&json!("_size")));
        assert!(DocIdType::String.is_reserved(&json!("_anything")));
        assert!(!DocIdType::ObjectId.is_reserved(&json!("_anything")));
        assert!(!DocIdType::String.is_reserved(&json!("plain")));
        assert!(!DocIdType::Number.is_reserved(&json!(7)));
    }

    #[test]
    fn test_id_type_from_str() {
        assert_eq!("string_oid".parse::<DocIdType>().unwrap(), DocIdType::StringObjectId);
        assert!("uuid".parse::<DocIdType>().is_err());
    }

    #[test]
    fn test_etag_header_parsing() {
        assert_eq!(ETag::from_header("\"abc\"").unwrap().as_str(), "abc");
        assert_eq!(ETag::from_header("W/\"abc\"").unwrap().as_str(), "abc");
        assert_eq!(ETag::from_header("abc").unwrap().as_str(), "abc");
        assert!(ETag::from_header("  ").is_none());
        assert_eq!(ETag::new("abc").to_header_value(), "\"abc\"");
    }

    #[test]
    fn test_document_path() {
        let resource = ResourceRef::collection("users", DocIdType::String);
        assert_eq!(resource.document_path(&json!("bob")), "/users/bob");
    }
}
