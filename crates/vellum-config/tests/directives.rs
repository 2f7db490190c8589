//! Override directive parsing against the documented surface syntax.

use proptest::prelude::*;
use vellum_config::{parse_overrides, OverrideDirective, OverrideValue};

fn first(text: &str) -> OverrideDirective {
    parse_overrides(text)
        .unwrap_or_else(|e| panic!("`{text}` failed to parse: {e}"))
        .remove(0)
}

#[test]
fn blank_input_yields_nothing() {
    assert!(parse_overrides("").unwrap().is_empty());
    assert!(parse_overrides("   ").unwrap().is_empty());
}

#[test]
fn single_integer_directive() {
    let directives = parse_overrides("/a/b/c->1").unwrap();
    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].path(), "/a/b/c");
    assert_eq!(directives[0].value(), &OverrideValue::Integer(1));
}

#[test]
fn missing_operator_fails() {
    assert!(parse_overrides("/a/b/c").is_err());
}

#[test]
fn missing_path_fails() {
    assert!(parse_overrides("->1").is_err());
}

#[test]
fn malformed_path_fails() {
    assert!(parse_overrides("/@@@@->1").is_err());
    assert!(parse_overrides("/---->1").is_err());
}

#[test]
fn malformed_value_fails() {
    assert!(parse_overrides("/a->[1,2").is_err());
}

#[test]
fn relative_path_fails_even_with_bad_value() {
    let err = parse_overrides("a->[1,2").unwrap_err();
    assert!(err.to_string().contains("absolute"));
}

#[test]
fn split_ignores_quoted_separators_and_trailing_separator() {
    let text = r#"/a/b/c->{"k": "v;"};/a/b/c->{"k": "v"};/a->1;/a->"1";"#;
    let directives = parse_overrides(text).unwrap();
    assert_eq!(directives.len(), 4);
    assert_eq!(directives[3].value(), &OverrideValue::String("1".into()));
}

#[test]
fn lenient_object_literal() {
    assert!(matches!(
        first("/a->{'a': 1, 'b': 2}").value(),
        OverrideValue::Object(map) if map.len() == 2
    ));
}

#[test]
fn array_literal() {
    assert!(matches!(
        first("/a->[1,2,3]").value(),
        OverrideValue::Array(items) if items.len() == 3
    ));
}

#[test]
fn single_quoted_string_keeps_separator() {
    let directive = first("/a->'ciao;';/b->'eccolo;'");
    assert_eq!(directive.value(), &OverrideValue::String("ciao;".into()));
}

#[test]
fn single_quoted_string_with_escapes() {
    let directives = parse_overrides(r"/a->'ciao;';/b->'eccolo \'qui;\''").unwrap();
    assert_eq!(directives.len(), 2);
    assert_eq!(directives[1].value(), &OverrideValue::String("eccolo 'qui;'".into()));
}

#[test]
fn double_quoted_string() {
    let directive = first(r#"/a->"ciao";/b->"eccolo;""#);
    assert_eq!(directive.value(), &OverrideValue::String("ciao".into()));
}

#[test]
fn double_quoted_string_with_escapes() {
    let directives = parse_overrides(r#"/a->"ciao";/b->"eccolo \"qui;\" ""#).unwrap();
    assert_eq!(directives.len(), 2);
    assert_eq!(
        directives[1].value(),
        &OverrideValue::String("eccolo \"qui;\" ".into())
    );
}

#[test]
fn zero_is_an_integer() {
    assert_eq!(first("/a->0").value(), &OverrideValue::Integer(0));
}

#[test]
fn booleans() {
    assert_eq!(first("/flag->true").value(), &OverrideValue::Boolean(true));
    assert_eq!(first("/flag->false").value(), &OverrideValue::Boolean(false));
}

#[test]
fn backslashes_survive_display() {
    let value = OverrideValue::String(r"C:\dir\".into());
    let directive = OverrideDirective::new("/a", value.clone()).unwrap();
    assert_eq!(directive.to_string(), r#"/a->"C:\\dir\\""#);
    assert_eq!(first(&directive.to_string()).value(), &value);

    let text = format!("{directive};/b->1");
    assert_eq!(parse_overrides(&text).unwrap().len(), 2);
}

#[test]
fn lone_backslash_is_literal() {
    assert_eq!(first(r"/a->'C:\dir'").value(), &OverrideValue::String(r"C:\dir".into()));
}

fn value_strategy() -> impl Strategy<Value = OverrideValue> {
    prop_oneof![
        any::<i64>().prop_map(OverrideValue::Integer),
        any::<bool>().prop_map(OverrideValue::Boolean),
        "[a-zA-Z0-9 ;'\"_.\\\\-]{0,16}".prop_map(OverrideValue::String),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(|items| {
            OverrideValue::Array(items.into_iter().map(serde_json::Value::from).collect())
        }),
        prop::collection::btree_map("[a-z]{1,6}", "[a-z; \\\\]{0,6}", 0..4).prop_map(|entries| {
            OverrideValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect(),
            )
        }),
    ]
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9_][a-z0-9_-]{0,6}", 1..4)
        .prop_map(|segments| format!("/{}", segments.join("/")))
}

proptest! {
    #[test]
    fn directives_round_trip_through_display(
        entries in prop::collection::vec((path_strategy(), value_strategy()), 1..5)
    ) {
        let directives: Vec<OverrideDirective> = entries
            .iter()
            .map(|(path, value)| OverrideDirective::new(path, value.clone()).unwrap())
            .collect();
        let text = directives
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";");

        let reparsed = parse_overrides(&text).unwrap();
        prop_assert_eq!(reparsed, directives);
    }
}
