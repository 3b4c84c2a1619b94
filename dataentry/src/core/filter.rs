//! Row filter expressions over column values.
//!
//! A small query language in the spirit of dataframe `query` strings:
//!
//! ```text
//! country == 'US' and (age >= 18 or `Guardian Consent` == 'yes')
//! not status != "active"
//! ```
//!
//! `and`/`&`, `or`/`|`, `not`/`~` combine comparisons (`==`, `!=`, `<`, `<=`,
//! `>`, `>=`). Columns are bare identifiers or backtick-quoted names; literals
//! are quoted strings or numbers. An empty cell only satisfies `!=`.

use std::cmp::Ordering;

use crate::core::rules::ConfigError;
use crate::core::types::{Cell, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Text(String),
    Number(f64),
}

impl Literal {
    fn as_text(&self) -> String {
        match self {
            Literal::Text(text) => text.clone(),
            Literal::Number(n) => Cell::Number(*n).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        column: String,
        op: CompareOp,
        literal: Literal,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Op(CompareOp),
    LParen,
    RParen,
    And,
    Or,
    Not,
}

/// Parsed filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    root: Expr,
}

impl RowFilter {
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidFilter {
            expr: expr.to_string(),
            reason,
        };
        let tokens = tokenize(expr).map_err(invalid)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.parse_or().map_err(invalid)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected trailing token {token:?}")));
        }
        Ok(Self { root })
    }

    pub fn matches(&self, row: &Row) -> bool {
        eval(&self.root, row)
    }
}

fn eval(expr: &Expr, row: &Row) -> bool {
    match expr {
        Expr::Or(lhs, rhs) => eval(lhs, row) || eval(rhs, row),
        Expr::And(lhs, rhs) => eval(lhs, row) && eval(rhs, row),
        Expr::Not(inner) => !eval(inner, row),
        Expr::Compare {
            column,
            op,
            literal,
        } => compare(row.value(column).as_deref(), *op, literal),
    }
}

fn compare(cell: Option<&str>, op: CompareOp, literal: &Literal) -> bool {
    let Some(cell) = cell else {
        return op == CompareOp::Ne;
    };
    let ordering = match (literal, cell.trim().parse::<f64>()) {
        (Literal::Number(expected), Ok(actual)) => actual.partial_cmp(expected),
        (Literal::Number(_), Err(_)) if matches!(op, CompareOp::Eq | CompareOp::Ne) => {
            return op == CompareOp::Ne;
        }
        (Literal::Text(text), Ok(actual)) if !matches!(op, CompareOp::Eq | CompareOp::Ne) => {
            match text.trim().parse::<f64>() {
                Ok(expected) => actual.partial_cmp(&expected),
                Err(_) => Some(cell.cmp(text.as_str())),
            }
        }
        _ => Some(cell.cmp(literal.as_text().as_str())),
    };
    let Some(ordering) = ordering else {
        return op == CompareOp::Ne;
    };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += if chars.get(i + 1) == Some(&'&') { 2 } else { 1 };
            }
            '|' => {
                tokens.push(Token::Or);
                i += if chars.get(i + 1) == Some(&'|') { 2 } else { 1 };
            }
            '~' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next_is_eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, next_is_eq) {
                    ('=', true) => CompareOp::Eq,
                    ('!', true) => CompareOp::Ne,
                    ('<', true) => CompareOp::Le,
                    ('>', true) => CompareOp::Ge,
                    ('<', false) => CompareOp::Lt,
                    ('>', false) => CompareOp::Gt,
                    _ => return Err(format!("unexpected '{c}' at offset {i}")),
                };
                tokens.push(Token::Op(op));
                i += if next_is_eq { 2 } else { 1 };
            }
            '\'' | '"' | '`' => {
                let (text, next) = read_quoted(&chars, i)?;
                tokens.push(if c == '`' {
                    Token::Ident(text)
                } else {
                    Token::Str(text)
                });
                i = next;
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}' at offset {start}"))?;
                tokens.push(Token::Num(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(format!("unexpected '{c}' at offset {i}")),
        }
    }
    Ok(tokens)
}

/// Read a quoted run starting at `start`; backslash escapes the next char.
fn read_quoted(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                text.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(format!("unterminated {quote} quote at offset {start}"))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    other => Err(format!("expected ')', found {other:?}")),
                }
            }
            Some(Token::Ident(column)) => {
                let op = match self.advance() {
                    Some(Token::Op(op)) => op,
                    other => {
                        return Err(format!(
                            "expected comparison after '{column}', found {other:?}"
                        ));
                    }
                };
                let literal = match self.advance() {
                    Some(Token::Str(text)) => Literal::Text(text),
                    Some(Token::Num(number)) => Literal::Number(number),
                    other => return Err(format!("expected literal, found {other:?}")),
                };
                Ok(Expr::Compare {
                    column,
                    op,
                    literal,
                })
            }
            None => Err("unexpected end of expression".to_string()),
            Some(other) => Err(format!("expected column or '(', found {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().map(|(k, v)| (*k, Cell::from(*v))).collect()
    }

    fn matches(expr: &str, row: &Row) -> bool {
        RowFilter::parse(expr).expect("parse").matches(row)
    }

    #[test]
    fn string_equality() {
        let us = row(&[("country", "US")]);
        assert!(matches("country == 'US'", &us));
        assert!(!matches("country == \"CA\"", &us));
        assert!(matches("country != 'CA'", &us));
    }

    #[test]
    fn numeric_comparison_parses_cells() {
        let adult = row(&[("age", "42")]);
        assert!(matches("age >= 18", &adult));
        assert!(matches("age > 41.5", &adult));
        assert!(!matches("age < 18", &adult));
        assert!(matches("age == 42", &adult));
        let spreadsheet: Row = [("age", Cell::Number(42.0))].into_iter().collect();
        assert!(matches("age == 42", &spreadsheet));
    }

    #[test]
    fn numeric_literal_against_text_is_not_equal() {
        let r = row(&[("age", "unknown")]);
        assert!(!matches("age == 3", &r));
        assert!(matches("age != 3", &r));
    }

    #[test]
    fn boolean_combinators_and_precedence() {
        let r = row(&[("country", "US"), ("plan", "pro")]);
        assert!(matches("country == 'CA' or country == 'US' and plan == 'pro'", &r));
        assert!(!matches("(country == 'CA' or country == 'US') and plan == 'free'", &r));
        assert!(matches("not plan == 'free'", &r));
        assert!(matches("country == 'US' & ~(plan == 'free')", &r));
    }

    #[test]
    fn backticks_quote_column_names() {
        let r = row(&[("Opt In", "yes")]);
        assert!(matches("`Opt In` == 'yes'", &r));
    }

    #[test]
    fn empty_cells_only_satisfy_not_equal() {
        let r = row(&[("country", "")]);
        assert!(!matches("country == ''", &r));
        assert!(matches("country != 'US'", &r));
        assert!(!matches("missing > 1", &r));
    }

    #[test]
    fn malformed_expressions_are_config_errors() {
        for expr in [
            "",
            "country ==",
            "country = 'US'",
            "'US' == country",
            "(country == 'US'",
            "country == 'US",
            "country == 'US' extra",
        ] {
            let err = RowFilter::parse(expr).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidFilter { .. }),
                "{expr:?} should be rejected"
            );
        }
    }
}
