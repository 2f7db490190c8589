//! Tokenizer and recursive-descent parser for predicate text.
//!
//! ```text
//! expr    := and_expr ("or" and_expr)*
//! and_expr:= unary ("and" unary)*
//! unary   := ("not" | "!") unary | primary
//! primary := "(" expr ")" | "true" | "false" | NAME "(" args ")"
//! args    := arg ("," arg)*
//! arg     := [WORD "="] (WORD | QUOTED)
//! ```

use crate::ast::PredicateNode;
use crate::path::FieldPath;
use vellum_core::document::parse_literal;
use vellum_core::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    LParen,
    RParen,
    Comma,
    Equals,
    Bang,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Word(w) => format!("`{w}`"),
            Self::Quoted(q) => format!("quoted `{q}`"),
            Self::LParen => "`(`".to_string(),
            Self::RParen => "`)`".to_string(),
            Self::Comma => "`,`".to_string(),
            Self::Equals => "`=`".to_string(),
            Self::Bang => "`!`".to_string(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '$' | '+')
}

fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | ',' | '=' | '!' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '=' => Token::Equals,
                    _ => Token::Bang,
                });
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    if ch == '\\' && chars.peek() == Some(&c) {
                        chars.next();
                        text.push(c);
                    } else if ch == c {
                        closed = true;
                        break;
                    } else {
                        text.push(ch);
                    }
                }
                if !closed {
                    return Err(SyntaxError::new("unterminated quoted argument", input));
                }
                tokens.push(Token::Quoted(text));
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(SyntaxError::new(
                    format!("unexpected character `{other}`"),
                    input,
                ))
            }
        }
    }

    Ok(tokens)
}

struct Arg {
    name: Option<String>,
    value: String,
}

/// Deepest allowed nesting of negations and groups.
pub(crate) const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.input)
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("predicate nests deeper than {MAX_DEPTH} levels")));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SyntaxError> {
        match self.next() {
            Some(ref t) if t == expected => Ok(()),
            Some(t) => Err(self.error(format!(
                "expected {}, found {}",
                expected.describe(),
                t.describe()
            ))),
            None => Err(self.error(format!(
                "expected {}, found end of input",
                expected.describe()
            ))),
        }
    }

    fn parse_or(&mut self) -> Result<PredicateNode, SyntaxError> {
        let mut children = vec![self.parse_and()?];
        while self.peek().is_some_and(|t| t.is_keyword("or")) {
            self.pos += 1;
            children.push(self.parse_and()?);
        }
        Ok(collapse(children, PredicateNode::Or))
    }

    fn parse_and(&mut self) -> Result<PredicateNode, SyntaxError> {
        let mut children = vec![self.parse_unary()?];
        while self.peek().is_some_and(|t| t.is_keyword("and")) {
            self.pos += 1;
            children.push(self.parse_unary()?);
        }
        Ok(collapse(children, PredicateNode::And))
    }

    fn parse_unary(&mut self) -> Result<PredicateNode, SyntaxError> {
        let negated = self
            .peek()
            .is_some_and(|t| *t == Token::Bang || t.is_keyword("not"));
        if negated {
            self.pos += 1;
            self.enter()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(PredicateNode::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<PredicateNode, SyntaxError> {
        match self.next() {
            Some(Token::LParen) => {
                self.enter()?;
                let node = self.parse_or()?;
                self.expect(&Token::RParen)?;
                self.depth -= 1;
                Ok(node)
            }
            Some(Token::Word(word)) => {
                if self.peek() != Some(&Token::LParen) {
                    return match word.to_ascii_lowercase().as_str() {
                        "true" => Ok(PredicateNode::Const(true)),
                        "false" => Ok(PredicateNode::Const(false)),
                        _ => Err(self.error(format!("expected `(` after `{word}`"))),
                    };
                }
                self.pos += 1;
                let args = self.parse_args()?;
                self.build_call(&word, args)
            }
            Some(t) => Err(self.error(format!("unexpected {}", t.describe()))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, SyntaxError> {
        let mut args = Vec::new();
        loop {
            let first = match self.next() {
                Some(Token::Word(w)) => (w, false),
                Some(Token::Quoted(q)) => (q, true),
                Some(Token::RParen) if args.is_empty() => {
                    return Err(self.error("empty argument list"));
                }
                Some(t) => return Err(self.error(format!("unexpected {}", t.describe()))),
                None => return Err(self.error("unterminated argument list")),
            };

            let arg = if !first.1 && self.peek() == Some(&Token::Equals) {
                self.pos += 1;
                let value = match self.next() {
                    Some(Token::Word(w) | Token::Quoted(w)) => w,
                    _ => return Err(self.error(format!("missing value for `{}`", first.0))),
                };
                Arg {
                    name: Some(first.0.to_ascii_lowercase()),
                    value,
                }
            } else {
                Arg {
                    name: None,
                    value: first.0,
                }
            };
            args.push(arg);

            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(args),
                Some(t) => return Err(self.error(format!("unexpected {}", t.describe()))),
                None => return Err(self.error("unterminated argument list")),
            }
        }
    }

    fn build_call(&self, name: &str, args: Vec<Arg>) -> Result<PredicateNode, SyntaxError> {
        match name.to_ascii_lowercase().as_str() {
            "field-exists" => {
                let mut nodes = Vec::with_capacity(args.len());
                for arg in args {
                    if arg.name.as_deref().is_some_and(|n| n != "field") {
                        return Err(self.error("field-exists only accepts field paths"));
                    }
                    nodes.push(PredicateNode::FieldExists(FieldPath::parse(&arg.value)?));
                }
                Ok(collapse(nodes, PredicateNode::And))
            }
            op @ ("field-eq" | "field-ne") => {
                let (field, value) = self.field_and_value(op, args)?;
                let path = FieldPath::parse(&field)?;
                let literal = parse_literal(&value)?;
                Ok(if op == "field-eq" {
                    PredicateNode::FieldEquals(path, literal)
                } else {
                    PredicateNode::FieldNotEquals(path, literal)
                })
            }
            other => Err(self.error(format!("unknown predicate `{other}`"))),
        }
    }

    fn field_and_value(&self, op: &str, args: Vec<Arg>) -> Result<(String, String), SyntaxError> {
        let mut field = None;
        let mut value = None;
        let mut positional = 0;

        for arg in args {
            let slot = match arg.name.as_deref() {
                Some("field") => &mut field,
                Some("value") => &mut value,
                Some(other) => {
                    return Err(self.error(format!("unknown argument `{other}` for {op}")))
                }
                None => {
                    positional += 1;
                    match positional {
                        1 => &mut field,
                        2 => &mut value,
                        _ => return Err(self.error(format!("too many arguments for {op}"))),
                    }
                }
            };
            if slot.replace(arg.value).is_some() {
                return Err(self.error(format!("duplicate argument for {op}")));
            }
        }

        match (field, value) {
            (Some(f), Some(v)) => Ok((f, v)),
            _ => Err(self.error(format!("{op} requires `field` and `value`"))),
        }
    }
}

fn collapse(mut children: Vec<PredicateNode>, combine: fn(Vec<PredicateNode>) -> PredicateNode) -> PredicateNode {
    if children.len() == 1 {
        children.remove(0)
    } else {
        combine(children)
    }
}

/// Parses predicate text into a tree.
pub(crate) fn parse(input: &str) -> Result<PredicateNode, SyntaxError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(SyntaxError::new("empty predicate", input));
    }

    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.parse_or()?;
    if let Some(t) = parser.peek() {
        return Err(parser.error(format!("unexpected trailing {}", t.describe())));
    }
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exists(p: &str) -> PredicateNode {
        PredicateNode::FieldExists(FieldPath::parse(p).unwrap())
    }

    #[test]
    fn test_multiple_exists_arguments_are_anded() {
        let node = parse("field-exists(sub.foo, bar)").unwrap();
        assert_eq!(node, PredicateNode::And(vec![exists("sub.foo"), exists("bar")]));
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let node = parse("field-exists(a) or field-exists(b) and field-exists(c)").unwrap();
        assert_eq!(
            node,
            PredicateNode::Or(vec![
                exists("a"),
                PredicateNode::And(vec![exists("b"), exists("c")]),
            ])
        );
    }

    #[test]
    fn test_grouping_overrides_precedence() {
        let node = parse("(field-exists(a) or field-exists(b)) and field-exists(c)").unwrap();
        assert_eq!(
            node,
            PredicateNode::And(vec![
                PredicateNode::Or(vec![exists("a"), exists("b")]),
                exists("c"),
            ])
        );
    }

    #[test]
    fn test_negation_forms() {
        let expected = PredicateNode::Not(Box::new(exists("a")));
        assert_eq!(parse("not field-exists(a)").unwrap(), expected);
        assert_eq!(parse("!field-exists(a)").unwrap(), expected);
        assert_eq!(parse("NOT (field-exists(a))").unwrap(), expected);
    }

    #[test]
    fn test_field_eq_literals() {
        assert_eq!(
            parse("field-eq(field=sub.foo, value=1)").unwrap(),
            PredicateNode::FieldEquals(FieldPath::parse("sub.foo").unwrap(), json!(1))
        );
        assert_eq!(
            parse(r#"field-eq(field=s, value='"a string"')"#).unwrap(),
            PredicateNode::FieldEquals(FieldPath::parse("s").unwrap(), json!("a string"))
        );
        assert_eq!(
            parse(r#"field-eq(field=bar, value='{"a":1}')"#).unwrap(),
            PredicateNode::FieldEquals(FieldPath::parse("bar").unwrap(), json!({"a": 1}))
        );
        assert_eq!(
            parse("field-eq(flag, true)").unwrap(),
            PredicateNode::FieldEquals(FieldPath::parse("flag").unwrap(), json!(true))
        );
    }

    #[test]
    fn test_unquoted_string_literal_is_rejected() {
        assert!(parse("field-eq(field=s, value='a string')").is_err());
        assert!(parse("field-eq(field=s, value=abc)").is_err());
    }

    #[test]
    fn test_constants() {
        assert_eq!(parse("true").unwrap(), PredicateNode::Const(true));
        assert_eq!(parse("false or true").unwrap(), PredicateNode::Or(vec![
            PredicateNode::Const(false),
            PredicateNode::Const(true),
        ]));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nested = |n: usize| format!("{}field-exists(a){}", "not (".repeat(n), ")".repeat(n));
        assert!(parse(&nested(MAX_DEPTH / 2)).is_ok());

        let err = parse(&nested(MAX_DEPTH)).unwrap_err();
        assert!(err.to_string().contains("nests deeper"));

        assert!(parse(&format!("{}true", "!".repeat(100_000))).is_err());
        assert!(parse(&format!("{}true{}", "(".repeat(100_000), ")".repeat(100_000))).is_err());
    }

    #[test]
    fn test_malformed_input() {
        for bad in [
            "",
            "   ",
            "field-exists()",
            "field-exists(a",
            "field-exists(a) or",
            "field-exists(a) field-exists(b)",
            "unknown(a)",
            "field-eq(field=a)",
            "field-eq(field=a, value=1, extra=2)",
            "field-exists(a..b)",
            "(field-exists(a)",
            "field-exists(a) @",
            "field-eq(field=a, value='1)",
        ] {
            assert!(parse(bad).is_err(), "`{bad}` should not parse");
        }
    }
}
