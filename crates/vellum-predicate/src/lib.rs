//! # Vellum Predicates
//!
//! A small boolean expression language evaluated against a document, used to
//! decide whether a plugin applies to an exchange.
//!
//! ## Surface syntax
//!
//! ```text
//! field-exists(sub.foo, bar)                  every path is present
//! field-eq(field=sub.foo, value=1)            path equals a literal
//! field-ne(field=kind, value='"draft"')       path present and not equal
//! field-exists(a) or not field-exists(b)      combinators
//! !(field-exists(a) and field-exists(b))      grouping, prefix negation
//! ```
//!
//! `or` binds looser than `and`. String literals for `field-eq` must be
//! quoted inside the argument (`value='"a string"'`) so that bare numbers and
//! booleans stay unambiguous.
//!
//! ## Evaluation
//!
//! Evaluation is pure and total: an absent path resolves to "not found",
//! never to an error, and evaluating without a document yields `false`.
//!
//! ```
//! use vellum_predicate::Predicate;
//! use serde_json::json;
//!
//! let p = Predicate::parse("field-exists(sub.foo) or field-exists(bar)").unwrap();
//! assert!(p.evaluate(Some(&json!({"bar": null}))));
//! assert!(!p.evaluate(Some(&json!({"sub": 1}))));
//! assert!(!p.evaluate(None));
//! ```

#![doc(html_root_url = "https://docs.rs/vellum-predicate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod ast;
mod parser;
mod path;

pub use ast::{values_equal, PredicateNode};
pub use path::FieldPath;

use serde_json::Value;
use std::fmt;
use vellum_core::{Exchange, SyntaxError};

/// A parsed, immutable predicate together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    root: PredicateNode,
    source: String,
}

impl Predicate {
    /// Parses predicate text.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let root = parser::parse(text)?;
        Ok(Self {
            root,
            source: text.trim().to_string(),
        })
    }

    /// Wraps an already built tree.
    #[must_use]
    pub fn from_node(root: PredicateNode) -> Self {
        let source = root.to_string();
        Self { root, source }
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> &PredicateNode {
        &self.root
    }

    /// Returns the source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates against a document; `None` yields `false`.
    #[must_use]
    pub fn evaluate(&self, document: Option<&Value>) -> bool {
        document.is_some_and(|doc| self.root.evaluate(doc))
    }

    /// Evaluates against the request document of an exchange.
    #[must_use]
    pub fn evaluate_exchange(&self, exchange: &Exchange) -> bool {
        let matched = self.evaluate(exchange.content());
        tracing::trace!(
            request_id = %exchange.request_id(),
            predicate = %self.source,
            matched,
            "predicate evaluated"
        );
        matched
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Predicate {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
