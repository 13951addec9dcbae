//! Error types for every stage of the jqlite pipeline.
//!
//! ```rust
//! use jqlite::error::ParseError;
//!
//! fn describe(err: &ParseError) -> String {
//!     err.to_string()
//! }
//! ```

use crate::ast::Span;
use thiserror::Error;

/// Errors produced while tokenizing program text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {}, column {}", span.line, span.column)]
    UnexpectedChar { ch: char, span: Span },

    #[error("unterminated string starting at line {}, column {}", span.line, span.column)]
    UnterminatedString { span: Span },

    #[error("invalid escape sequence '\\{ch}' at line {}, column {}", span.line, span.column)]
    BadEscape { ch: char, span: Span },

    #[error("invalid number literal '{text}' at line {}, column {}", span.line, span.column)]
    BadNumber { text: String, span: Span },
}

/// Errors produced while parsing a token sequence into an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token '{found}', expected {expected}")]
    Unexpected { expected: String, found: String, span: Span },

    #[error("trailing input after end of program: '{found}'")]
    TrailingInput { found: String, span: Span },

    #[error("object keys must be identifiers, strings, or parenthesized expressions")]
    BadObjectKey { span: Span },

    #[error(transparent)]
    Lex(#[from] LexError),
}

/// Errors raised during evaluation of an expression against a value.
///
/// `Type` and `KeyMissing`/`IndexOutOfRange` are the categories a
/// trailing `?` suppresses (spec.md §4.3 "Optional"); `TryCatch`
/// catches all of them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{actual} cannot be used where {expected} is required")]
    Type { expected: String, actual: String },

    #[error("cannot index {actual_type} with {description}")]
    KeyMissing {
        description: String,
        actual_type: String,
    },

    #[error("array index out of range")]
    IndexOutOfRange,

    #[error("division by zero")]
    DivByZero,

    #[error("${name} is not defined")]
    UnboundVariable { name: String },

    #[error("{0}")]
    UserError(String),
}

impl EvalError {
    /// Builds a `Type` error, e.g. `type_error("number to add", "string")`.
    pub fn type_error(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        EvalError::Type {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True for the categories a trailing `?` or bare access suffix
    /// failure is allowed to suppress (spec.md §4.3 "Optional").
    pub fn is_suppressible(&self) -> bool {
        matches!(
            self,
            EvalError::Type { .. } | EvalError::KeyMissing { .. } | EvalError::IndexOutOfRange
        )
    }
}

/// Unified error type for the convenience `run` entry point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
