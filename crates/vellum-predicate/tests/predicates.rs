//! Evaluation tests for the predicate language against realistic documents.

use proptest::prelude::*;
use serde_json::{json, Value};
use vellum_core::Exchange;
use vellum_predicate::Predicate;

fn document() -> Value {
    json!({
        "bar": null,
        "sub": {
            "foo": 1,
            "string": "a string",
            "items": [{"name": "first"}, {"name": "second"}]
        },
        "obj": {"a": 1}
    })
}

fn eval(text: &str, doc: &Value) -> bool {
    Predicate::parse(text)
        .unwrap_or_else(|e| panic!("`{text}` failed to parse: {e}"))
        .evaluate(Some(doc))
}

#[test]
fn test_field_exists_distinguishes_null_from_absent() {
    let doc = document();
    assert!(eval("field-exists(bar)", &doc));
    assert!(!eval("field-exists(foo)", &doc));
}

#[test]
fn test_nested_field_exists() {
    let doc = document();
    assert!(eval("field-exists(sub.foo)", &doc));
    assert!(!eval("field-exists(bar.foo)", &doc));
    assert!(eval("field-exists(sub.items.1.name)", &doc));
    assert!(!eval("field-exists(sub.items.2.name)", &doc));
}

#[test]
fn test_or_and_multi_argument_exists() {
    let doc = document();
    assert!(eval("field-exists(sub.foo) or field-exists(bar)", &doc));
    assert!(eval("field-exists(sub.foo, bar)", &doc));
    assert!(!eval("field-exists(sub.foo, nope)", &doc));
    assert!(eval("field-exists(nope) or field-exists(bar)", &doc));
}

#[test]
fn test_field_eq_number() {
    let doc = document();
    assert!(eval("field-eq(field=sub.foo, value=1)", &doc));
    assert!(eval("field-eq(field=sub.foo, value=1.0)", &doc));
    assert!(!eval("field-eq(field=sub.foo, value=2)", &doc));
}

#[test]
fn test_field_eq_quoted_string() {
    let doc = document();
    assert!(eval(r#"field-eq(field=sub.string, value='"a string"')"#, &doc));
    assert!(!eval(r#"field-eq(field=sub.string, value='"other"')"#, &doc));
}

#[test]
fn test_field_eq_object_and_null() {
    let doc = document();
    assert!(eval(r#"field-eq(field=obj, value='{"a":1}')"#, &doc));
    assert!(eval("field-eq(field=bar, value=null)", &doc));
    assert!(!eval("field-eq(field=missing, value=null)", &doc));
}

#[test]
fn test_field_ne() {
    let doc = document();
    assert!(eval("field-ne(field=sub.foo, value=2)", &doc));
    assert!(!eval("field-ne(field=sub.foo, value=1)", &doc));
    assert!(!eval("field-ne(field=missing, value=1)", &doc));
}

#[test]
fn test_negation_and_constants() {
    let doc = document();
    assert!(eval("not field-exists(foo)", &doc));
    assert!(eval("!(field-exists(foo) or false)", &doc));
    assert!(eval("true", &doc));
    assert!(!eval("false and true", &doc));
}

#[test]
fn test_absent_document_is_false() {
    for text in ["true", "not false", "!field-exists(a)", "not (true and false)"] {
        let p = Predicate::parse(text).unwrap();
        assert!(!p.evaluate(None), "`{text}` matched without a document");
        assert!(p.evaluate(Some(&json!({}))), "`{text}` failed on an empty document");
    }

    let bodiless = Exchange::new(http::Method::GET, "/coll/a");
    assert!(!Predicate::parse("not false").unwrap().evaluate_exchange(&bodiless));
}

#[test]
fn test_evaluate_exchange_uses_request_content() {
    let exchange =
        Exchange::new(http::Method::POST, "/coll").with_content(json!({"kind": "draft"}));
    let p = Predicate::parse(r#"field-eq(field=kind, value='"draft"')"#).unwrap();
    assert!(p.evaluate_exchange(&exchange));

    let empty = Exchange::new(http::Method::GET, "/coll");
    assert!(!p.evaluate_exchange(&empty));
}

#[test]
fn test_source_text_is_retained() {
    let p: Predicate = "  field-exists(a)  ".parse().unwrap();
    assert_eq!(p.source(), "field-exists(a)");
    assert_eq!(p.to_string(), "field-exists(a)");
}

proptest! {
    #[test]
    fn field_exists_matches_key_presence(
        key in "[a-z][a-z0-9_]{0,8}",
        other in "[a-z][a-z0-9_]{0,8}",
        value in any::<i64>(),
    ) {
        let doc = json!({ key.clone(): value });
        let p = Predicate::parse(&format!("field-exists({key})")).unwrap();
        prop_assert!(p.evaluate(Some(&doc)));

        let q = Predicate::parse(&format!("field-exists({other})")).unwrap();
        prop_assert_eq!(q.evaluate(Some(&doc)), key == other);
    }

    #[test]
    fn field_eq_matches_integer_value(n in any::<i32>(), m in any::<i32>()) {
        let doc = json!({"n": n});
        let p = Predicate::parse(&format!("field-eq(field=n, value={m})")).unwrap();
        prop_assert_eq!(p.evaluate(Some(&doc)), n == m);
    }
}
