//! The jqlite tree-walking interpreter.
//!
//! `eval` maps `(expression, input value, environment)` to a lazy
//! stream of output values (spec.md §4.3). `|` sequences streams via
//! flat-map, `,` concatenates them; every other construct is built
//! from those two combinators plus the per-node rules below.

use crate::ast::{BinaryOp, Builtin, Expr, Literal, ObjectEntry};
use crate::error::EvalError;
use crate::eval::builtins;
use crate::value::{self, Env};
use serde_json::Value;
use std::rc::Rc;

/// A lazy, finite, single-pass sequence of evaluation results.
pub type Stream<'a> = Box<dyn Iterator<Item = Result<Value, EvalError>> + 'a>;

fn once(result: Result<Value, EvalError>) -> Stream<'static> {
    Box::new(std::iter::once(result))
}

fn ok(v: Value) -> Stream<'static> {
    once(Ok(v))
}

fn err(e: EvalError) -> Stream<'static> {
    once(Err(e))
}

fn empty() -> Stream<'static> {
    Box::new(std::iter::empty())
}

/// The jqlite interpreter. Holds no state of its own — evaluation is
/// a pure function of `(expr, input, env)` — but is kept as a struct,
/// mirroring the teacher's `Interpreter::new()` / `.eval(...)` shape,
/// so callers have a stable handle to extend later (e.g. injected
/// host variables).
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }

    /// Evaluates `expr` against `input` in `env`, producing a lazy
    /// stream of result values.
    pub fn eval<'a>(&self, expr: &'a Expr, input: Value, env: Rc<Env>) -> Stream<'a> {
        let interp = *self;
        match expr {
            Expr::Identity => ok(input),

            Expr::Literal(lit) => ok(literal_value(lit)),

            Expr::Pipe(e1, e2) => {
                let env2 = Rc::clone(&env);
                let rest = interp.eval(e1, input, env);
                Box::new(rest.flat_map(move |r| match r {
                    Ok(v) => interp.eval(e2, v, Rc::clone(&env2)),
                    Err(e) => err(e),
                }))
            }

            Expr::Comma(e1, e2) => {
                let first = interp.eval(e1, input.clone(), Rc::clone(&env));
                let second = interp.eval(e2, input, env);
                Box::new(first.chain(second))
            }

            Expr::Key(k) => eval_key(&input, k),

            Expr::Index(indices) => eval_index(&input, indices),

            Expr::Slice(lo, hi) => eval_slice(&input, *lo, *hi),

            Expr::Optional(inner) => {
                let stream = interp.eval(inner, input, env);
                Box::new(stream.filter_map(|r| match r {
                    Ok(v) => Some(Ok(v)),
                    Err(e) if e.is_suppressible() => None,
                    Err(e) => Some(Err(e)),
                }))
            }

            Expr::ArrayConstruct(inner) => eval_array_construct(interp, inner.as_deref(), input, env),

            Expr::ObjectConstruct(entries) => eval_object_construct(interp, entries, input, env),

            Expr::Operation(lhs, op, rhs) => eval_operation(interp, lhs, *op, rhs, input, env),

            Expr::IfThenElse(cond, then_e, else_e) => {
                let env2 = Rc::clone(&env);
                let env3 = Rc::clone(&env);
                let cond_stream = interp.eval(cond, input.clone(), env);
                Box::new(cond_stream.flat_map(move |r| match r {
                    Ok(v) if value::is_truthy(&v) => {
                        interp.eval(then_e, input.clone(), Rc::clone(&env2))
                    }
                    Ok(_) => interp.eval(else_e, input.clone(), Rc::clone(&env3)),
                    Err(e) => err(e),
                }))
            }

            Expr::TryCatch(body, handler) => {
                eval_try_catch(interp, body, handler.as_deref(), input, env)
            }

            Expr::Variable(name) => match env.lookup(name) {
                Some(v) => ok(v.clone()),
                None => err(EvalError::UnboundVariable { name: name.clone() }),
            },

            Expr::Recurse => eval_recurse(input),

            Expr::Call(builtin) => builtins::eval_builtin(interp, builtin, input, env),

            Expr::Alternative(lhs, rhs) => eval_alternative(interp, lhs, rhs, input, env),
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => value::number(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn eval_key(input: &Value, key: &str) -> Stream<'static> {
    match input {
        Value::Object(map) => ok(map.get(key).cloned().unwrap_or(Value::Null)),
        Value::Null => ok(Value::Null),
        other => err(EvalError::type_error("an object", value::type_name(other))),
    }
}

/// jq negative-index wraparound: `-1` is the last element.
fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if i < 0 { i + len } else { i };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

fn eval_index(input: &Value, indices: &[i64]) -> Stream<'static> {
    if indices.is_empty() {
        return eval_iterate(input);
    }

    match input {
        Value::Array(items) => {
            let results: Vec<Result<Value, EvalError>> = indices
                .iter()
                .map(|i| {
                    Ok(match normalize_index(*i, items.len()) {
                        Some(idx) => items[idx].clone(),
                        None => Value::Null,
                    })
                })
                .collect();
            Box::new(results.into_iter())
        }
        Value::Null => {
            let results: Vec<Result<Value, EvalError>> =
                indices.iter().map(|_| Ok(Value::Null)).collect();
            Box::new(results.into_iter())
        }
        other => err(EvalError::type_error("an array", value::type_name(other))),
    }
}

fn eval_iterate(input: &Value) -> Stream<'static> {
    match input {
        Value::Array(items) => Box::new(items.clone().into_iter().map(Ok)),
        Value::Object(map) => Box::new(map.values().cloned().collect::<Vec<_>>().into_iter().map(Ok)),
        Value::Null => empty(),
        other => err(EvalError::type_error(
            "an array or object",
            value::type_name(other),
        )),
    }
}

fn normalize_slice_bound(bound: Option<i64>, len: usize, default: usize) -> usize {
    match bound {
        None => default,
        Some(i) => {
            let len_i = len as i64;
            let idx = if i < 0 { (i + len_i).max(0) } else { i };
            idx.clamp(0, len_i) as usize
        }
    }
}

fn eval_slice(input: &Value, lo: Option<i64>, hi: Option<i64>) -> Stream<'static> {
    match input {
        Value::Array(items) => {
            let lo = normalize_slice_bound(lo, items.len(), 0);
            let hi = normalize_slice_bound(hi, items.len(), items.len());
            if lo >= hi {
                ok(Value::Array(Vec::new()))
            } else {
                ok(Value::Array(items[lo..hi].to_vec()))
            }
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let lo = normalize_slice_bound(lo, chars.len(), 0);
            let hi = normalize_slice_bound(hi, chars.len(), chars.len());
            let slice: String = if lo >= hi {
                String::new()
            } else {
                chars[lo..hi].iter().collect()
            };
            ok(Value::String(slice))
        }
        Value::Null => ok(Value::Null),
        other => err(EvalError::type_error(
            "an array or string",
            value::type_name(other),
        )),
    }
}

fn eval_array_construct<'a>(
    interp: Interpreter,
    inner: Option<&'a Expr>,
    input: Value,
    env: Rc<Env>,
) -> Stream<'a> {
    let Some(inner) = inner else {
        return ok(Value::Array(Vec::new()));
    };
    let stream = interp.eval(inner, input, env);
    let mut items = Vec::new();
    for r in stream {
        match r {
            Ok(v) => items.push(v),
            Err(e) => return err(e),
        }
    }
    ok(Value::Array(items))
}

/// Cartesian product of each entry's key/value streams, left to
/// right, yielding one object per combination with the entries'
/// source order preserved as key-insertion order (spec.md §4.3
/// "Construction").
fn eval_object_construct<'a>(
    interp: Interpreter,
    entries: &'a [ObjectEntry],
    input: Value,
    env: Rc<Env>,
) -> Stream<'a> {
    let mut combinations: Vec<Vec<(String, Value)>> = vec![Vec::new()];

    for entry in entries {
        let key_stream = interp.eval(&entry.key, input.clone(), Rc::clone(&env));
        let mut keys = Vec::new();
        for r in key_stream {
            match r {
                Ok(v) => keys.push(v),
                Err(e) => return err(e),
            }
        }

        let mut pairs = Vec::new();
        for key in &keys {
            let key_str = match key {
                Value::String(s) => s.clone(),
                other => {
                    return err(EvalError::type_error(
                        "a string object key",
                        value::type_name(other),
                    ))
                }
            };
            let values: Vec<Result<Value, EvalError>> = match &entry.value {
                Some(ve) => interp.eval(ve, input.clone(), Rc::clone(&env)).collect(),
                None => interp
                    .eval(&Expr::Identity, input.clone(), Rc::clone(&env))
                    .collect(),
            };
            for v in values {
                match v {
                    Ok(v) => pairs.push((key_str.clone(), v)),
                    Err(e) => return err(e),
                }
            }
        }

        let mut next = Vec::with_capacity(combinations.len() * pairs.len().max(1));
        for combo in &combinations {
            for pair in &pairs {
                let mut extended = combo.clone();
                extended.push(pair.clone());
                next.push(extended);
            }
        }
        combinations = next;
    }

    let objects: Vec<Result<Value, EvalError>> = combinations
        .into_iter()
        .map(|pairs| {
            let mut map = serde_json::Map::new();
            for (k, v) in pairs {
                map.insert(k, v);
            }
            Ok(Value::Object(map))
        })
        .collect();
    Box::new(objects.into_iter())
}

fn eval_operation<'a>(
    interp: Interpreter,
    lhs: &'a Expr,
    op: BinaryOp,
    rhs: &'a Expr,
    input: Value,
    env: Rc<Env>,
) -> Stream<'a> {
    match op {
        BinaryOp::And => {
            let env2 = Rc::clone(&env);
            let left = interp.eval(lhs, input.clone(), env);
            return Box::new(left.flat_map(move |r| match r {
                Ok(v) if !value::is_truthy(&v) => ok(Value::Bool(false)),
                Ok(_) => {
                    let right = interp.eval(rhs, input.clone(), Rc::clone(&env2));
                    Box::new(right.map(|r| r.map(|v| Value::Bool(value::is_truthy(&v))))) as Stream<'a>
                }
                Err(e) => err(e),
            }));
        }
        BinaryOp::Or => {
            let env2 = Rc::clone(&env);
            let left = interp.eval(lhs, input.clone(), env);
            return Box::new(left.flat_map(move |r| match r {
                Ok(v) if value::is_truthy(&v) => ok(Value::Bool(true)),
                Ok(_) => {
                    let right = interp.eval(rhs, input.clone(), Rc::clone(&env2));
                    Box::new(right.map(|r| r.map(|v| Value::Bool(value::is_truthy(&v))))) as Stream<'a>
                }
                Err(e) => err(e),
            }));
        }
        _ => {}
    }

    // Arithmetic/comparison operators broadcast over the Cartesian
    // product of the left and right streams (spec.md §4.3
    // "Operations").
    let left_values: Vec<Result<Value, EvalError>> =
        interp.eval(lhs, input.clone(), Rc::clone(&env)).collect();
    let right_values: Vec<Result<Value, EvalError>> = interp.eval(rhs, input, env).collect();

    let mut results = Vec::with_capacity(left_values.len() * right_values.len().max(1));
    for l in &left_values {
        for r in &right_values {
            let result = match (l, r) {
                (Err(e), _) => Err(e.clone()),
                (_, Err(e)) => Err(e.clone()),
                (Ok(l), Ok(r)) => apply_binary_op(op, l, r),
            };
            results.push(result);
        }
    }
    Box::new(results.into_iter())
}

fn apply_binary_op(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    use BinaryOp::*;
    match op {
        Add => builtins::add(l, r),
        Sub => builtins::sub(l, r),
        Mul => builtins::mul(l, r),
        Div => builtins::div(l, r),
        Mod => builtins::rem(l, r),
        Eq => Ok(Value::Bool(l == r)),
        Ne => Ok(Value::Bool(l != r)),
        Lt => Ok(Value::Bool(value::compare(l, r) == std::cmp::Ordering::Less)),
        Le => Ok(Value::Bool(value::compare(l, r) != std::cmp::Ordering::Greater)),
        Gt => Ok(Value::Bool(value::compare(l, r) == std::cmp::Ordering::Greater)),
        Ge => Ok(Value::Bool(value::compare(l, r) != std::cmp::Ordering::Less)),
        And | Or => unreachable!("short-circuit operators handled before broadcasting"),
    }
}

fn eval_try_catch<'a>(
    interp: Interpreter,
    body: &'a Expr,
    handler: Option<&'a Expr>,
    input: Value,
    env: Rc<Env>,
) -> Stream<'a> {
    let stream = interp.eval(body, input, Rc::clone(&env));
    let mut out = Vec::new();
    for r in stream {
        match r {
            Ok(v) => out.push(Ok(v)),
            Err(e) => {
                if let Some(h) = handler {
                    let message = Value::String(e.to_string());
                    out.extend(interp.eval(h, message, env));
                }
                return Box::new(out.into_iter());
            }
        }
    }
    Box::new(out.into_iter())
}

fn eval_recurse(input: Value) -> Stream<'static> {
    let mut out = vec![input.clone()];
    collect_recurse(&input, &mut out);
    Box::new(out.into_iter().map(Ok))
}

fn collect_recurse(v: &Value, out: &mut Vec<Value>) {
    match v {
        Value::Array(items) => {
            for item in items {
                out.push(item.clone());
                collect_recurse(item, out);
            }
        }
        Value::Object(map) => {
            for value in map.values() {
                out.push(value.clone());
                collect_recurse(value, out);
            }
        }
        _ => {}
    }
}

/// `//`: non-null, non-false values from the left; falls back to the
/// right only if the left stream produced none and raised no error
/// (spec.md §4.3 "Alternative").
fn eval_alternative<'a>(
    interp: Interpreter,
    lhs: &'a Expr,
    rhs: &'a Expr,
    input: Value,
    env: Rc<Env>,
) -> Stream<'a> {
    let left: Vec<Result<Value, EvalError>> = interp.eval(lhs, input.clone(), Rc::clone(&env)).collect();
    let mut produced = Vec::new();
    for r in left {
        if let Ok(v) = r {
            if value::is_truthy(&v) {
                produced.push(Ok(v));
            }
        }
    }
    if produced.is_empty() {
        interp.eval(rhs, input, env)
    } else {
        Box::new(produced.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use serde_json::json;

    fn run(query: &str, input: Value) -> Vec<Value> {
        let expr = Parser::new(query).parse().unwrap();
        Interpreter::new()
            .eval(&expr, input, Rc::new(Env::root()))
            .map(|r| r.unwrap())
            .collect()
    }

    fn run_err(query: &str, input: Value) -> EvalError {
        let expr = Parser::new(query).parse().unwrap();
        Interpreter::new()
            .eval(&expr, input, Rc::new(Env::root()))
            .find_map(|r| r.err())
            .unwrap()
    }

    #[test]
    fn test_identity() {
        assert_eq!(run(".", json!(42)), vec![json!(42)]);
    }

    #[test]
    fn test_key_access_missing_is_null() {
        assert_eq!(run(".foo", json!({"bar": 1})), vec![Value::Null]);
    }

    #[test]
    fn test_pipe_flat_maps() {
        assert_eq!(run(".foo | .bar", json!({"foo": {"bar": 7}})), vec![json!(7)]);
    }

    #[test]
    fn test_comma_concatenates() {
        assert_eq!(run(".a, .b", json!({"a": 1, "b": 2})), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_index_negative_wraps() {
        assert_eq!(run(".[-1]", json!([1, 2, 3])), vec![json!(3)]);
    }

    #[test]
    fn test_index_out_of_range_is_null() {
        assert_eq!(run(".[10]", json!([1, 2, 3])), vec![Value::Null]);
    }

    #[test]
    fn test_iterator_over_object_is_insertion_order() {
        assert_eq!(run(".[]", json!({"z": 1, "a": 2})), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_slice() {
        assert_eq!(run(".[1:3]", json!([1, 2, 3, 4])), vec![json!([2, 3])]);
    }

    #[test]
    fn test_array_construct_collects_stream() {
        assert_eq!(run("[.[]]", json!([1, 2, 3])), vec![json!([1, 2, 3])]);
    }

    #[test]
    fn test_object_construct_cartesian_product() {
        assert_eq!(
            run("{a: (1,2)}", Value::Null),
            vec![json!({"a": 1}), json!({"a": 2})]
        );
    }

    #[test]
    fn test_if_then_else() {
        assert_eq!(run("if . then 1 else 2 end", json!(true)), vec![json!(1)]);
        assert_eq!(run("if . then 1 else 2 end", json!(false)), vec![json!(2)]);
    }

    #[test]
    fn test_optional_suppresses_type_error() {
        assert_eq!(run(".foo?", json!(1)), Vec::<Value>::new());
    }

    #[test]
    fn test_recurse_preorder() {
        assert_eq!(
            run("..", json!([1, [2]])),
            vec![json!([1, [2]]), json!(1), json!([2]), json!(2)]
        );
    }

    #[test]
    fn test_select() {
        assert_eq!(
            run(".[] | select(. > 1)", json!([1, 2, 3])),
            vec![json!(2), json!(3)]
        );
    }

    #[test]
    fn test_map() {
        assert_eq!(run("map(. * 2)", json!([1, 2, 3])), vec![json!([2, 4, 6])]);
    }

    #[test]
    fn test_alternative_falls_back_on_empty() {
        assert_eq!(run(".x // 1", json!({})), vec![json!(1)]);
        assert_eq!(run(".x // 1", json!({"x": 2})), vec![json!(2)]);
    }

    #[test]
    fn test_alternative_falls_back_on_type_error() {
        assert_eq!(
            run(".user.name? // \"(unknown)\"", json!({"user": {}})),
            vec![json!("(unknown)")]
        );
    }

    #[test]
    fn test_and_or_short_circuit_to_booleans() {
        assert_eq!(run("1 and 2", Value::Null), vec![json!(true)]);
        assert_eq!(run("false or 0", Value::Null), vec![json!(true)]);
    }

    #[test]
    fn test_total_order_comparison() {
        assert_eq!(run("1 < 2", Value::Null), vec![json!(true)]);
        assert_eq!(run("null < false", Value::Null), vec![json!(true)]);
    }

    #[test]
    fn test_unbound_variable_errors() {
        let e = run_err("$x", Value::Null);
        assert!(matches!(e, EvalError::UnboundVariable { .. }));
    }

    #[test]
    fn test_division_by_zero() {
        let e = run_err("1 / 0", Value::Null);
        assert_eq!(e, EvalError::DivByZero);
    }
}
