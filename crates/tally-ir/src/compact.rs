//! Compact textual rendering of IR trees, plus a parser for the subset
//! used as test fixtures.
//!
//! The format is for debugging and golden tests, not persistence: one node
//! per constructor-style term, children in evaluation order, literal tags
//! for scannability:
//!
//! ```text
//! "hello":s  42:n  3.5:w  Bool(true)  Color(#FF00FF00)  10<m>:U
//! BinaryOp(Concat, "a":s, "b":s)
//! Call(Sum, Scope(1), args...)   Scope(1)   Scope(1, fullname)
//! ```
//!
//! [`parse`] accepts literals, operators, `Lazy`, `Chain`, `Interp`, and
//! `Error` — the kinds whose result types are derivable without a binder.
//! Node kinds that carry binder output (calls, scopes, resolved objects,
//! coercions) render but do not parse.

use crate::foundation::{ResultType, ScopeAccess, Span, Unit};
use crate::node::{BinaryOp, IrNode, NodeKind, NodeRef, UnaryOp};
use logos::Logos;
use std::error::Error;
use std::fmt;
use std::fmt::Write as _;

/// Render a tree to its compact form.
pub fn render(node: &IrNode) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

fn write_node(node: &IrNode, out: &mut String) {
    match &node.kind {
        NodeKind::Text(value) => {
            out.push('"');
            escape_text(value, out);
            out.push_str("\":s");
        }
        NodeKind::Number(value) => {
            let _ = write!(out, "{value}:n");
        }
        NodeKind::Decimal(value) => {
            let _ = write!(out, "{value}:w");
        }
        NodeKind::Boolean(value) => {
            let _ = write!(out, "Bool({value})");
        }
        NodeKind::Color(argb) => {
            let _ = write!(out, "Color(#{argb:08X})");
        }
        NodeKind::Units { value, unit } => {
            let _ = write!(out, "{value}<{unit}>:U");
        }
        NodeKind::Record(fields) => {
            out.push_str("Record(");
            for (idx, (name, child)) in fields.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{name}: ");
                write_node(child, out);
            }
            out.push(')');
        }
        NodeKind::Table(rows) => write_seq("Table", rows, out),
        NodeKind::Chain(items) => write_seq("Chain", items, out),
        NodeKind::Interpolation(segments) => write_seq("Interp", segments, out),
        NodeKind::Unary { op, child } => {
            let _ = write!(out, "UnaryOp({op}, ");
            write_node(child, out);
            out.push(')');
        }
        NodeKind::Binary { op, left, right } => {
            let _ = write!(out, "BinaryOp({op}, ");
            write_node(left, out);
            out.push_str(", ");
            write_node(right, out);
            out.push(')');
        }
        NodeKind::Call {
            function,
            args,
            scope,
        } => {
            let _ = write!(out, "Call({}", function.name);
            if let Some(scope) = scope {
                let _ = write!(out, ", Scope({})", scope.id);
            }
            for arg in args {
                out.push_str(", ");
                write_node(arg, out);
            }
            out.push(')');
        }
        NodeKind::Lazy(child) => {
            out.push_str("Lazy(");
            write_node(child, out);
            out.push(')');
        }
        NodeKind::FieldAccess { from, field } => {
            out.push_str("FieldAccess(");
            write_node(from, out);
            let _ = write!(out, ", {field})");
        }
        NodeKind::ScopeAccess(access) => match access {
            ScopeAccess::Whole(id) => {
                let _ = write!(out, "Scope({id})");
            }
            ScopeAccess::Field { scope, name } => {
                let _ = write!(out, "Scope({scope}, {name})");
            }
        },
        NodeKind::Resolved(object) => {
            let _ = write!(out, "ResolvedObject({})", object.name);
        }
        NodeKind::AggregateCoercion {
            op,
            scope,
            child,
            fields,
        } => {
            let _ = write!(out, "AggCoercion({op}, Scope({}), ", scope.id);
            write_node(child, out);
            for (name, coercion) in fields {
                let _ = write!(out, ", {name}: ");
                write_node(coercion, out);
            }
            out.push(')');
        }
        NodeKind::Error { hint } => {
            out.push_str("Error(\"");
            escape_text(hint, out);
            out.push_str("\")");
        }
    }
}

fn write_seq(head: &str, items: &[NodeRef], out: &mut String) {
    out.push_str(head);
    out.push('(');
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        write_node(item, out);
    }
    out.push(')');
}

fn escape_text(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
}

/// Failure to parse a compact-form string.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Input contained a character no token matches
    Lex(usize),
    /// A token appeared where another was expected
    Unexpected { expected: String, found: String },
    /// The node kind renders but has no parse (carries binder output)
    Unsupported(String),
    /// Tokens remained after a complete expression
    Trailing,
    /// Input ended mid-expression
    Eof,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(offset) => write!(f, "unrecognized input at byte {offset}"),
            ParseError::Unexpected { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            ParseError::Unsupported(head) => {
                write!(f, "`{head}` nodes cannot be parsed from compact form")
            }
            ParseError::Trailing => write!(f, "trailing input after expression"),
            ParseError::Eof => write!(f, "unexpected end of input"),
        }
    }
}

impl Error for ParseError {}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"#[0-9A-Fa-f]{8}", |lex| u32::from_str_radix(&lex.slice()[1..], 16).ok())]
    ColorHex(u32),
}

fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            _ => return None,
        }
    }
    Some(out)
}

fn token_name(token: &Token) -> String {
    match token {
        Token::LParen => "`(`".into(),
        Token::RParen => "`)`".into(),
        Token::Comma => "`,`".into(),
        Token::Colon => "`:`".into(),
        Token::Lt => "`<`".into(),
        Token::Gt => "`>`".into(),
        Token::Number(value) => format!("number `{value}`"),
        Token::Str(value) => format!("string {value:?}"),
        Token::Ident(name) => format!("`{name}`"),
        Token::ColorHex(_) => "color literal".into(),
    }
}

/// Parse the fixture subset of the compact form.
///
/// Spans on the result are all zero; the compact form does not carry
/// source locations.
pub fn parse(input: &str) -> Result<NodeRef, ParseError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(input).spanned() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => return Err(ParseError::Lex(span.start)),
        }
    }
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ParseError::Trailing);
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ParseError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(ParseError::Eof)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        let found = self.next()?;
        if found == expected {
            Ok(())
        } else {
            Err(ParseError::Unexpected {
                expected: token_name(&expected),
                found: token_name(&found),
            })
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(ParseError::Unexpected {
                expected: "identifier".into(),
                found: token_name(&other),
            }),
        }
    }

    fn expr(&mut self) -> Result<NodeRef, ParseError> {
        let span = Span::zero(0);
        match self.next()? {
            Token::Str(value) => {
                self.expect(Token::Colon)?;
                self.tag("s")?;
                Ok(IrNode::text(value, span))
            }
            Token::Number(value) => match self.next()? {
                Token::Colon => match self.ident()?.as_str() {
                    "n" => Ok(IrNode::number(value, span)),
                    "w" => Ok(IrNode::decimal(value, span)),
                    tag => Err(ParseError::Unexpected {
                        expected: "literal tag `n` or `w`".into(),
                        found: format!("`{tag}`"),
                    }),
                },
                Token::Lt => {
                    let unit = self.ident()?;
                    self.expect(Token::Gt)?;
                    self.expect(Token::Colon)?;
                    self.tag("U")?;
                    Ok(IrNode::units(value, Unit::new(unit), span))
                }
                other => Err(ParseError::Unexpected {
                    expected: "`:` or `<`".into(),
                    found: token_name(&other),
                }),
            },
            Token::Ident(head) => self.headed(&head, span),
            other => Err(ParseError::Unexpected {
                expected: "expression".into(),
                found: token_name(&other),
            }),
        }
    }

    fn headed(&mut self, head: &str, span: Span) -> Result<NodeRef, ParseError> {
        self.expect(Token::LParen)?;
        let node = match head {
            "Bool" => match self.ident()?.as_str() {
                "true" => IrNode::boolean(true, span),
                "false" => IrNode::boolean(false, span),
                other => {
                    return Err(ParseError::Unexpected {
                        expected: "`true` or `false`".into(),
                        found: format!("`{other}`"),
                    })
                }
            },
            "Color" => match self.next()? {
                Token::ColorHex(argb) => IrNode::color(argb, span),
                other => {
                    return Err(ParseError::Unexpected {
                        expected: "color literal".into(),
                        found: token_name(&other),
                    })
                }
            },
            "UnaryOp" => {
                let op = unary_op(&self.ident()?)?;
                self.expect(Token::Comma)?;
                let child = self.expr()?;
                let ty = match op {
                    UnaryOp::Not => ResultType::Boolean,
                    UnaryOp::Negate | UnaryOp::Percent => child.result_type().clone(),
                };
                IrNode::unary(op, child, ty, span)
            }
            "BinaryOp" => {
                let op = binary_op(&self.ident()?)?;
                self.expect(Token::Comma)?;
                let left = self.expr()?;
                self.expect(Token::Comma)?;
                let right = self.expr()?;
                let ty = binary_result_type(op, &left);
                IrNode::binary(op, left, right, ty, span)
            }
            "Lazy" => IrNode::lazy(self.expr()?),
            "Chain" => IrNode::chain(self.list()?, span),
            "Interp" => IrNode::interpolation(self.list()?, span),
            "Error" => match self.next()? {
                Token::Str(hint) => IrNode::error(hint, span),
                other => {
                    return Err(ParseError::Unexpected {
                        expected: "string".into(),
                        found: token_name(&other),
                    })
                }
            },
            other => return Err(ParseError::Unsupported(other.to_string())),
        };
        self.expect(Token::RParen)?;
        Ok(node)
    }

    /// Comma-separated expressions, at least one, up to the closing paren.
    fn list(&mut self) -> Result<Vec<NodeRef>, ParseError> {
        let mut items = vec![self.expr()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            items.push(self.expr()?);
        }
        Ok(items)
    }

    fn tag(&mut self, expected: &str) -> Result<(), ParseError> {
        let tag = self.ident()?;
        if tag == expected {
            Ok(())
        } else {
            Err(ParseError::Unexpected {
                expected: format!("literal tag `{expected}`"),
                found: format!("`{tag}`"),
            })
        }
    }
}

fn unary_op(name: &str) -> Result<UnaryOp, ParseError> {
    Ok(match name {
        "Negate" => UnaryOp::Negate,
        "Not" => UnaryOp::Not,
        "Percent" => UnaryOp::Percent,
        _ => {
            return Err(ParseError::Unexpected {
                expected: "unary operator".into(),
                found: format!("`{name}`"),
            })
        }
    })
}

fn binary_op(name: &str) -> Result<BinaryOp, ParseError> {
    Ok(match name {
        "Add" => BinaryOp::Add,
        "Subtract" => BinaryOp::Subtract,
        "Multiply" => BinaryOp::Multiply,
        "Divide" => BinaryOp::Divide,
        "Power" => BinaryOp::Power,
        "Concat" => BinaryOp::Concat,
        "And" => BinaryOp::And,
        "Or" => BinaryOp::Or,
        "Eq" => BinaryOp::Eq,
        "Neq" => BinaryOp::Neq,
        "Lt" => BinaryOp::Lt,
        "Leq" => BinaryOp::Leq,
        "Gt" => BinaryOp::Gt,
        "Geq" => BinaryOp::Geq,
        _ => {
            return Err(ParseError::Unexpected {
                expected: "binary operator".into(),
                found: format!("`{name}`"),
            })
        }
    })
}

/// Result type the fixture parser assigns to a binary node. The left
/// operand decides arithmetic; comparisons and logic are boolean; concat
/// is text. Good enough for fixtures, not a type checker.
fn binary_result_type(op: BinaryOp, left: &NodeRef) -> ResultType {
    match op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Power => left.result_type().clone(),
        BinaryOp::Concat => ResultType::Text,
        BinaryOp::And
        | BinaryOp::Or
        | BinaryOp::Eq
        | BinaryOp::Neq
        | BinaryOp::Lt
        | BinaryOp::Leq
        | BinaryOp::Gt
        | BinaryOp::Geq => ResultType::Boolean,
    }
}
