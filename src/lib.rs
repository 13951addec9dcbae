//! # jqlite - a jq-compatible JSON query interpreter
//!
//! jqlite implements a lexer, recursive-descent parser, and lazy
//! stream evaluator for a subset of the `jq` query language, operating
//! directly on `serde_json::Value` (built with the `preserve_order`
//! feature so objects keep insertion order).
//!
//! ## Overview
//!
//! ```text
//! program text → [lexer] → tokens → [parser] → Expr → [interpreter] → Stream<Value>
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use jqlite::run;
//!
//! let output = run(".name", r#"{"name": "ferris"}"#).unwrap();
//! assert_eq!(output, "\"ferris\"");
//! ```
//!
//! ## Modules
//!
//! - [`ast`]: the expression tree the parser produces
//! - [`lexer`]: tokenization of program text
//! - [`parser`]: recursive-descent parser producing an [`ast::Expr`]
//! - [`value`]: the JSON value model, total ordering, and environment
//! - [`eval`]: the stream-producing tree-walking interpreter
//! - [`error`]: error types for every pipeline stage

#![doc(html_root_url = "https://docs.rs/jqlite/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

use serde_json::Value;
use std::rc::Rc;

pub use ast::Expr;
pub use error::{Error, EvalError, LexError, ParseError};
pub use eval::{Interpreter, Stream};
pub use parser::Parser;
pub use value::Env;

/// Parses `text` into an [`Expr`] (spec.md §6 "Program API").
pub fn parse(text: &str) -> Result<Expr, ParseError> {
    Parser::new(text).parse()
}

/// Evaluates `expr` against `input` under a fresh root environment,
/// returning the lazy value stream (spec.md §6 "Program API").
pub fn eval(expr: &Expr, input: Value) -> Stream<'_> {
    Interpreter::new().eval(expr, input, Rc::new(Env::root()))
}

/// Parses `query_text`, evaluates it against the JSON value in
/// `input_text`, and joins the serialized results with `"\n"`
/// (spec.md §6 "Program API" convenience `run`).
pub fn run(query_text: &str, input_text: &str) -> Result<String, Error> {
    let expr = parse(query_text)?;
    let input: Value = serde_json::from_str(input_text)
        .map_err(|_| Error::Eval(EvalError::UserError("invalid JSON input".to_string())))?;

    let mut lines = Vec::new();
    for result in eval(&expr, input) {
        let value = result?;
        lines.push(serde_json::to_string(&value).expect("serde_json::Value always serializes"));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_identity() {
        assert_eq!(parse(".").unwrap(), Expr::Identity);
    }

    #[test]
    fn test_eval_collects_stream() {
        let expr = parse(".[]").unwrap();
        let results: Vec<Value> = eval(&expr, json!([1, 2, 3])).map(|r| r.unwrap()).collect();
        assert_eq!(results, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_run_joins_with_newlines() {
        let output = run(".[]", "[1, 2, 3]").unwrap();
        assert_eq!(output, "1\n2\n3");
    }

    #[test]
    fn test_run_propagates_eval_errors() {
        let result = run(".foo", "1");
        assert!(result.is_err());
    }

    #[test]
    fn test_run_propagates_parse_errors() {
        let result = run("|||", "null");
        assert!(result.is_err());
    }
}
