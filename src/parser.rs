//! Parser for jqlite query programs.
//!
//! A recursive-descent parser over ten precedence levels (spec.md
//! §4.2), lowest to highest: `pipe`, `alt`, `comma`, `or`, `and`,
//! `cmp`, `sum`, `mul`, `postfix`, `primary`.
//!
//! # Example
//!
//! ```rust
//! use jqlite::parser::Parser;
//!
//! let mut parser = Parser::new(".foo | length");
//! let expr = parser.parse().unwrap();
//! ```

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};

/// The parser for jqlite program text.
///
/// Holds one token of lookahead in `current`/`previous` the way the
/// teacher's parser does, plus an explicit `peek` buffer for the
/// handful of productions (object-entry shorthand, `.[` vs plain
/// index) that need to see one token ahead without consuming it.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    peeked: Option<Token>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source text.
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        let previous = Token::new(TokenKind::Eof, "", Span::default());

        Parser {
            lexer,
            current,
            previous,
            peeked: None,
        }
    }

    /// Parses the full token stream into an expression tree.
    /// Unconsumed trailing tokens are a `ParseError::TrailingInput`.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_pipe()?;
        if self.current.kind != TokenKind::Eof {
            return Err(ParseError::TrailingInput {
                found: self.current.lexeme.clone(),
                span: self.current.span,
            });
        }
        Ok(expr)
    }

    // === Helper methods ===

    fn advance(&mut self) -> Token {
        self.previous = self.current.clone();
        self.current = match self.peeked.take() {
            Some(tok) => tok,
            None => self.lexer.next_token(),
        };
        self.previous.clone()
    }

    fn peek(&mut self) -> &Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token());
        }
        self.peeked.as_ref().unwrap()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.current.kind == kind {
            Ok(self.advance())
        } else {
            Err(ParseError::Unexpected {
                expected: expected.to_string(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if self.current.kind == TokenKind::Identifier {
            Ok(self.advance().lexeme)
        } else {
            Err(ParseError::Unexpected {
                expected: "identifier".to_string(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            })
        }
    }

    // === Precedence climbing, lowest to highest ===

    fn parse_pipe(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_alt()?;
        while self.matches(&TokenKind::Pipe) {
            let rhs = self.parse_alt()?;
            lhs = Expr::Pipe(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_alt(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comma()?;
        while self.matches(&TokenKind::SlashSlash) {
            let rhs = self.parse_comma()?;
            lhs = Expr::Alternative(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comma(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_or()?;
        while self.matches(&TokenKind::Comma) {
            let rhs = self.parse_or()?;
            lhs = Expr::Comma(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.matches(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Operation(Box::new(lhs), BinaryOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_cmp()?;
        while self.matches(&TokenKind::And) {
            let rhs = self.parse_cmp()?;
            lhs = Expr::Operation(Box::new(lhs), BinaryOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_sum()?;
        loop {
            let op = match self.current.kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                TokenKind::Less => BinaryOp::Lt,
                TokenKind::LessEq => BinaryOp::Le,
                TokenKind::Greater => BinaryOp::Gt,
                TokenKind::GreaterEq => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_sum()?;
            lhs = Expr::Operation(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_sum(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Operation(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_postfix()?;
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_postfix()?;
            lhs = Expr::Operation(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.matches(&TokenKind::Question) {
            expr = Expr::Optional(Box::new(expr));
        }
        Ok(expr)
    }

    // === Terms and access suffixes ===

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_term()?;
        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    // only a suffix if followed by a key or `[`; a bare
                    // trailing `.` was already consumed as its own term
                    if matches!(self.peek().kind, TokenKind::Identifier | TokenKind::String(_)) {
                        self.advance();
                        expr = Expr::Pipe(Box::new(expr), Box::new(self.parse_dot_key()?));
                    } else if self.peek().kind == TokenKind::LeftBracket {
                        self.advance();
                        self.advance();
                        expr = Expr::Pipe(Box::new(expr), Box::new(self.parse_bracket_suffix()?));
                    } else {
                        break;
                    }
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    expr = Expr::Pipe(Box::new(expr), Box::new(self.parse_bracket_suffix()?));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_dot_key(&mut self) -> Result<Expr, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Identifier => {
                let name = self.advance().lexeme;
                Ok(Expr::Key(name))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Key(s))
            }
            _ => Err(ParseError::Unexpected {
                expected: "field name".to_string(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            }),
        }
    }

    /// Parses the inside of `[...]` having already consumed `[`:
    /// `.[]`, `.[i]`, `.[i,j,...]`, `.[lo:hi]`.
    fn parse_bracket_suffix(&mut self) -> Result<Expr, ParseError> {
        if self.matches(&TokenKind::RightBracket) {
            return Ok(Expr::Index(Vec::new()));
        }

        // `.[:hi]` — leading colon means an absent lower bound
        if self.matches(&TokenKind::Colon) {
            let hi = self.parse_index_int()?;
            self.expect(TokenKind::RightBracket, "]")?;
            return Ok(Expr::Slice(None, Some(hi)));
        }

        let first = self.parse_index_int()?;

        if self.matches(&TokenKind::Colon) {
            if self.matches(&TokenKind::RightBracket) {
                return Ok(Expr::Slice(Some(first), None));
            }
            let hi = self.parse_index_int()?;
            self.expect(TokenKind::RightBracket, "]")?;
            return Ok(Expr::Slice(Some(first), Some(hi)));
        }

        let mut indices = vec![first];
        while self.matches(&TokenKind::Comma) {
            indices.push(self.parse_index_int()?);
        }
        self.expect(TokenKind::RightBracket, "]")?;
        Ok(Expr::Index(indices))
    }

    fn parse_index_int(&mut self) -> Result<i64, ParseError> {
        let negative = self.matches(&TokenKind::Minus);
        match self.current.kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                let v = n as i64;
                Ok(if negative { -v } else { v })
            }
            _ => Err(ParseError::Unexpected {
                expected: "integer index".to_string(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            }),
        }
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Dot => {
                self.advance();
                match self.current.kind.clone() {
                    TokenKind::Identifier => self.parse_dot_key(),
                    TokenKind::String(_) => self.parse_dot_key(),
                    TokenKind::LeftBracket => {
                        self.advance();
                        self.parse_bracket_suffix()
                    }
                    _ => Ok(Expr::Identity),
                }
            }
            TokenKind::DotDot => {
                self.advance();
                Ok(Expr::Recurse)
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenKind::Variable => {
                let name = self.advance().lexeme;
                Ok(Expr::Variable(name))
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_postfix()?;
                Ok(Expr::Operation(
                    Box::new(Expr::Literal(Literal::Number(0.0))),
                    BinaryOp::Sub,
                    Box::new(operand),
                ))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_pipe()?;
                self.expect(TokenKind::RightParen, ")")?;
                Ok(inner)
            }
            TokenKind::LeftBracket => {
                self.advance();
                if self.matches(&TokenKind::RightBracket) {
                    return Ok(Expr::ArrayConstruct(None));
                }
                let inner = self.parse_pipe()?;
                self.expect(TokenKind::RightBracket, "]")?;
                Ok(Expr::ArrayConstruct(Some(Box::new(inner))))
            }
            TokenKind::LeftBrace => self.parse_object_construct(),
            TokenKind::If => self.parse_if(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Not => {
                self.advance();
                Ok(Expr::Call(Builtin::Not))
            }
            TokenKind::Identifier => self.parse_identifier_term(),
            _ => Err(ParseError::Unexpected {
                expected: "expression".to_string(),
                found: self.current.kind.to_string(),
                span: self.current.span,
            }),
        }
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::If, "if")?;
        let cond = self.parse_pipe()?;
        self.expect(TokenKind::Then, "then")?;
        let then_branch = self.parse_pipe()?;

        let else_branch = if self.matches(&TokenKind::Elif) {
            self.parse_elif_chain()?
        } else if self.matches(&TokenKind::Else) {
            let e = self.parse_pipe()?;
            self.expect(TokenKind::End, "end")?;
            e
        } else {
            self.expect(TokenKind::End, "end")?;
            Expr::Identity
        };

        Ok(Expr::IfThenElse(
            Box::new(cond),
            Box::new(then_branch),
            Box::new(else_branch),
        ))
    }

    /// Parses the chain of `elif cond then branch` clauses after the
    /// leading `elif` has already been consumed, desugaring into
    /// nested `IfThenElse` terminated by the final `else`/`end`.
    fn parse_elif_chain(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_pipe()?;
        self.expect(TokenKind::Then, "then")?;
        let then_branch = self.parse_pipe()?;

        let else_branch = if self.matches(&TokenKind::Elif) {
            self.parse_elif_chain()?
        } else if self.matches(&TokenKind::Else) {
            let e = self.parse_pipe()?;
            self.expect(TokenKind::End, "end")?;
            e
        } else {
            self.expect(TokenKind::End, "end")?;
            Expr::Identity
        };

        Ok(Expr::IfThenElse(
            Box::new(cond),
            Box::new(then_branch),
            Box::new(else_branch),
        ))
    }

    fn parse_try(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::Try, "try")?;
        let body = self.parse_postfix()?;
        let handler = if self.matches(&TokenKind::Catch) {
            Some(Box::new(self.parse_postfix()?))
        } else {
            None
        };
        Ok(Expr::TryCatch(Box::new(body), handler))
    }

    fn parse_object_construct(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LeftBrace, "{")?;
        let mut entries = Vec::new();

        if !self.check(&TokenKind::RightBrace) {
            loop {
                entries.push(self.parse_object_entry()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightBrace, "}")?;
        Ok(Expr::ObjectConstruct(entries))
    }

    fn parse_object_entry(&mut self) -> Result<ObjectEntry, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Variable => {
                let name = self.advance().lexeme;
                if self.matches(&TokenKind::Colon) {
                    let value = self.parse_or()?;
                    Ok(ObjectEntry {
                        key: Expr::Literal(Literal::String(name)),
                        value: Some(value),
                    })
                } else {
                    Ok(ObjectEntry {
                        key: Expr::Literal(Literal::String(name.clone())),
                        value: Some(Expr::Variable(name)),
                    })
                }
            }
            TokenKind::Identifier => {
                let name = self.advance().lexeme;
                if self.matches(&TokenKind::Colon) {
                    let value = self.parse_or()?;
                    Ok(ObjectEntry {
                        key: Expr::Literal(Literal::String(name)),
                        value: Some(value),
                    })
                } else {
                    Ok(ObjectEntry {
                        key: Expr::Literal(Literal::String(name.clone())),
                        value: Some(Expr::Key(name)),
                    })
                }
            }
            TokenKind::String(s) => {
                self.advance();
                self.expect(TokenKind::Colon, ":")?;
                let value = self.parse_or()?;
                Ok(ObjectEntry {
                    key: Expr::Literal(Literal::String(s)),
                    value: Some(value),
                })
            }
            TokenKind::LeftParen => {
                self.advance();
                let key = self.parse_pipe()?;
                self.expect(TokenKind::RightParen, ")")?;
                self.expect(TokenKind::Colon, ":")?;
                let value = self.parse_or()?;
                Ok(ObjectEntry {
                    key,
                    value: Some(value),
                })
            }
            _ => Err(ParseError::BadObjectKey {
                span: self.current.span,
            }),
        }
    }

    /// Identifier-led terms: either a recognized built-in call or a
    /// bare identifier used where jqlite has no user-defined function
    /// support (an unrecognized name is a parse error, not deferred
    /// to evaluation, since `def` is out of scope).
    fn parse_identifier_term(&mut self) -> Result<Expr, ParseError> {
        let name = self.advance().lexeme;

        let has_args = self.matches(&TokenKind::LeftParen);
        let mut args = Vec::new();
        if has_args {
            if !self.check(&TokenKind::RightParen) {
                loop {
                    args.push(self.parse_pipe()?);
                    if !self.matches(&TokenKind::Semicolon) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen, ")")?;
        }

        let builtin = match name.as_str() {
            "length" => Builtin::Length,
            "keys" => Builtin::Keys,
            "values" => Builtin::Values,
            "type" => Builtin::Type,
            "empty" => Builtin::Empty,
            "sort" => Builtin::Sort,
            "reverse" => Builtin::Reverse,
            "unique" => Builtin::Unique,
            "add" => Builtin::Add,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "floor" => Builtin::Floor,
            "sqrt" => Builtin::Sqrt,
            "any" => Builtin::Any,
            "all" => Builtin::All,
            "to_entries" => Builtin::ToEntries,
            "from_entries" => Builtin::FromEntries,
            "abs" => Builtin::Abs,
            "map" => {
                let arg = args.into_iter().next().ok_or_else(|| ParseError::Unexpected {
                    expected: "map(EXPR)".to_string(),
                    found: ")".to_string(),
                    span: self.previous.span,
                })?;
                Builtin::Map(Box::new(arg))
            }
            "select" => {
                let arg = args.into_iter().next().ok_or_else(|| ParseError::Unexpected {
                    expected: "select(EXPR)".to_string(),
                    found: ")".to_string(),
                    span: self.previous.span,
                })?;
                Builtin::Select(Box::new(arg))
            }
            "flatten" => {
                let depth = match args.into_iter().next() {
                    Some(Expr::Literal(Literal::Number(n))) => Some(n as i64),
                    Some(_) => {
                        return Err(ParseError::Unexpected {
                            expected: "integer depth".to_string(),
                            found: "expression".to_string(),
                            span: self.previous.span,
                        })
                    }
                    None => None,
                };
                Builtin::Flatten(depth)
            }
            _ => {
                return Err(ParseError::Unexpected {
                    expected: "recognized built-in name".to_string(),
                    found: name,
                    span: self.previous.span,
                })
            }
        };

        Ok(Expr::Call(builtin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Expr {
        Parser::new(source).parse().unwrap()
    }

    #[test]
    fn test_identity() {
        assert_eq!(parse("."), Expr::Identity);
    }

    #[test]
    fn test_key_access() {
        assert_eq!(parse(".foo"), Expr::Key("foo".to_string()));
    }

    #[test]
    fn test_pipe_chain() {
        assert_eq!(
            parse(".foo | .bar"),
            Expr::Pipe(
                Box::new(Expr::Key("foo".to_string())),
                Box::new(Expr::Key("bar".to_string())),
            )
        );
    }

    #[test]
    fn test_nested_key_desugars_to_pipe() {
        assert_eq!(
            parse(".foo.bar"),
            Expr::Pipe(
                Box::new(Expr::Key("foo".to_string())),
                Box::new(Expr::Key("bar".to_string())),
            )
        );
    }

    #[test]
    fn test_iterator_suffix() {
        assert_eq!(parse(".[]"), Expr::Index(vec![]));
    }

    #[test]
    fn test_index_list() {
        assert_eq!(parse(".[0,2]"), Expr::Index(vec![0, 2]));
    }

    #[test]
    fn test_slice() {
        assert_eq!(parse(".[1:3]"), Expr::Slice(Some(1), Some(3)));
    }

    #[test]
    fn test_array_construct() {
        assert_eq!(
            parse("[.foo]"),
            Expr::ArrayConstruct(Some(Box::new(Expr::Key("foo".to_string()))))
        );
        assert_eq!(parse("[]"), Expr::ArrayConstruct(None));
    }

    #[test]
    fn test_object_construct_shorthand() {
        let expr = parse("{foo}");
        match expr {
            Expr::ObjectConstruct(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].key, Expr::Literal(Literal::String("foo".to_string())));
                assert_eq!(entries[0].value, Some(Expr::Key("foo".to_string())));
            }
            _ => panic!("expected ObjectConstruct"),
        }
    }

    #[test]
    fn test_if_then_else() {
        assert!(matches!(parse("if . then 1 else 2 end"), Expr::IfThenElse(..)));
    }

    #[test]
    fn test_elif_desugars_to_nested_if() {
        let expr = parse("if .a then 1 elif .b then 2 else 3 end");
        match expr {
            Expr::IfThenElse(_, _, else_branch) => {
                assert!(matches!(*else_branch, Expr::IfThenElse(..)));
            }
            _ => panic!("expected IfThenElse"),
        }
    }

    #[test]
    fn test_try_catch() {
        assert!(matches!(parse("try .foo catch ."), Expr::TryCatch(_, Some(_))));
        assert!(matches!(parse("try .foo"), Expr::TryCatch(_, None)));
    }

    #[test]
    fn test_optional() {
        assert_eq!(
            parse(".foo?"),
            Expr::Optional(Box::new(Expr::Key("foo".to_string())))
        );
    }

    #[test]
    fn test_precedence_pipe_lowest() {
        // `.a, .b | .c` parses as `(.a, .b) | .c`
        let expr = parse(".a, .b | .c");
        assert!(matches!(expr, Expr::Pipe(..)));
        if let Expr::Pipe(lhs, _) = expr {
            assert!(matches!(*lhs, Expr::Comma(..)));
        }
    }

    #[test]
    fn test_alt_binds_looser_than_comma() {
        let expr = parse(".a, .b // .c");
        assert!(matches!(expr, Expr::Alternative(..)));
    }

    #[test]
    fn test_map_and_select_builtins() {
        assert!(matches!(parse("map(. * 2)"), Expr::Call(Builtin::Map(_))));
        assert!(matches!(parse("select(.x)"), Expr::Call(Builtin::Select(_))));
    }

    #[test]
    fn test_flatten_with_depth() {
        assert_eq!(parse("flatten(2)"), Expr::Call(Builtin::Flatten(Some(2))));
        assert_eq!(parse("flatten"), Expr::Call(Builtin::Flatten(None)));
    }

    #[test]
    fn test_trailing_input_is_error() {
        assert!(Parser::new(". .").parse().is_err());
    }

    #[test]
    fn test_unary_minus() {
        assert!(matches!(parse("-1"), Expr::Operation(_, BinaryOp::Sub, _)));
    }

    #[test]
    fn test_variable_unbound_is_still_parseable() {
        assert_eq!(parse("$foo"), Expr::Variable("foo".to_string()));
    }
}
