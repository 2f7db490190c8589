//! Predicate syntax tree and evaluation.

use crate::path::FieldPath;
use serde_json::Value;
use std::fmt;

/// A node of a parsed predicate.
///
/// Trees are immutable once built; evaluation has no side effects and
/// never fails.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateNode {
    /// The path resolves to a present key (a `null` value counts).
    FieldExists(FieldPath),
    /// The path resolves to a value structurally equal to the literal.
    FieldEquals(FieldPath, Value),
    /// The path resolves to a value that differs from the literal.
    FieldNotEquals(FieldPath, Value),
    /// Every child holds.
    And(Vec<PredicateNode>),
    /// At least one child holds.
    Or(Vec<PredicateNode>),
    /// The child does not hold.
    Not(Box<PredicateNode>),
    /// A constant.
    Const(bool),
}

impl PredicateNode {
    /// Evaluates this node against a document.
    #[must_use]
    pub fn evaluate(&self, document: &Value) -> bool {
        match self {
            Self::FieldExists(path) => path.exists_in(document),
            Self::FieldEquals(path, expected) => path
                .resolve(document)
                .is_some_and(|actual| values_equal(actual, expected)),
            Self::FieldNotEquals(path, expected) => path
                .resolve(document)
                .is_some_and(|actual| !values_equal(actual, expected)),
            Self::And(children) => children.iter().all(|c| c.evaluate(document)),
            Self::Or(children) => children.iter().any(|c| c.evaluate(document)),
            Self::Not(child) => !child.evaluate(document),
            Self::Const(value) => *value,
        }
    }
}

/// Structural equality of two values.
///
/// Objects compare key by key regardless of order, arrays element by element
/// in order, numbers by numeric value (`1 == 1.0`).
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => a == b,
    }
}

fn quote_literal(value: &Value) -> String {
    format!("'{}'", value.to_string().replace('\'', "\\'"))
}

impl fmt::Display for PredicateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldExists(path) => write!(f, "field-exists({path})"),
            Self::FieldEquals(path, value) => {
                write!(f, "field-eq(field={path}, value={})", quote_literal(value))
            }
            Self::FieldNotEquals(path, value) => {
                write!(f, "field-ne(field={path}, value={})", quote_literal(value))
            }
            Self::And(children) | Self::Or(children) => {
                let op = if matches!(self, Self::And(_)) { " and " } else { " or " };
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(op)?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
            Self::Not(child) => write!(f, "not {child}"),
            Self::Const(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> FieldPath {
        FieldPath::parse(p).unwrap()
    }

    #[test]
    fn test_numeric_equality_across_representations() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(!values_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn test_object_key_order_is_irrelevant() {
        assert!(values_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
        assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_array_order_is_relevant() {
        assert!(values_equal(&json!([1, 2]), &json!([1, 2])));
        assert!(!values_equal(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_field_not_equals_requires_presence() {
        let node = PredicateNode::FieldNotEquals(path("kind"), json!("draft"));
        assert!(node.evaluate(&json!({"kind": "final"})));
        assert!(!node.evaluate(&json!({"kind": "draft"})));
        assert!(!node.evaluate(&json!({})));
    }

    #[test]
    fn test_display_reparses_to_same_tree() {
        let node = PredicateNode::Or(vec![
            PredicateNode::FieldEquals(path("a.b"), json!("it's")),
            PredicateNode::Not(Box::new(PredicateNode::FieldExists(path("c")))),
        ]);
        let reparsed = crate::parser::parse(&node.to_string()).unwrap();
        assert_eq!(reparsed, node);
    }
}
