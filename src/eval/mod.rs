//! Expression evaluation.
//!
//! This module provides the lazy stream evaluator described in
//! spec.md §4.3: [`interpreter::Interpreter`] walks the AST and
//! produces [`interpreter::Stream`]s of JSON values, with
//! [`builtins`] supplying the binary-operator semantics and built-in
//! function library it dispatches to.
//!
//! # Example
//!
//! ```rust
//! use jqlite::parser::Parser;
//! use jqlite::eval::Interpreter;
//! use jqlite::value::Env;
//! use serde_json::json;
//! use std::rc::Rc;
//!
//! let expr = Parser::new(".foo").parse().unwrap();
//! let mut results = Interpreter::new().eval(&expr, json!({"foo": 1}), Rc::new(Env::root()));
//! assert_eq!(results.next().unwrap().unwrap(), json!(1));
//! ```

pub mod builtins;
pub mod interpreter;

pub use interpreter::{Interpreter, Stream};
