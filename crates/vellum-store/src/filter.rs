//! Equality constraints scoping a write.

use serde_json::Value;
use vellum_core::SyntaxError;
use vellum_predicate::{values_equal, FieldPath};

/// A conjunction of `path == value` constraints.
///
/// Used for request filters and shard keys: a write may only touch a stored
/// document that satisfies every constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    constraints: Vec<(FieldPath, Value)>,
}

impl DocumentFilter {
    /// A filter matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from an object mapping dot-paths to values.
    ///
    /// ```
    /// use serde_json::json;
    /// use vellum_store::DocumentFilter;
    ///
    /// let filter = DocumentFilter::from_value(&json!({"owner.name": "ann"})).unwrap();
    /// assert!(filter.matches(&json!({"owner": {"name": "ann"}})));
    /// assert!(!filter.matches(&json!({"owner": {"name": "bob"}})));
    /// ```
    pub fn from_value(value: &Value) -> Result<Self, SyntaxError> {
        let Value::Object(map) = value else {
            return Err(SyntaxError::new("filter must be an object", value.to_string()));
        };
        let constraints = map
            .iter()
            .map(|(path, expected)| Ok((FieldPath::parse(path)?, expected.clone())))
            .collect::<Result<_, SyntaxError>>()?;
        Ok(Self { constraints })
    }

    /// Adds one constraint.
    pub fn with(mut self, path: FieldPath, value: Value) -> Self {
        self.constraints.push((path, value));
        self
    }

    /// Combines two filters.
    pub fn and(mut self, other: Self) -> Self {
        self.constraints.extend(other.constraints);
        self
    }

    /// Whether no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether `document` satisfies every constraint.
    pub fn matches(&self, document: &Value) -> bool {
        self.constraints.iter().all(|(path, expected)| {
            path.resolve(document)
                .is_some_and(|actual| values_equal(actual, expected))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(DocumentFilter::new().matches(&json!({})));
    }

    #[test]
    fn test_all_constraints_must_hold() {
        let filter = DocumentFilter::from_value(&json!({"a": 1}))
            .unwrap()
            .and(DocumentFilter::from_value(&json!({"region": "eu"})).unwrap());
        assert!(filter.matches(&json!({"a": 1.0, "region": "eu"})));
        assert!(!filter.matches(&json!({"a": 1})));
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(DocumentFilter::from_value(&json!([1])).is_err());
        assert!(DocumentFilter::from_value(&json!({"a..b": 1})).is_err());
    }
}
