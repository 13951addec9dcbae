//! Binary operator semantics and the built-in function library.
//!
//! `add`/`sub`/`mul`/`div`/`rem` implement spec.md §4.3's "Operations"
//! table; `eval_builtin` implements "Recursion and built-ins" plus the
//! supplemental functions SPEC_FULL.md adds (`any`, `all`, `to_entries`,
//! `from_entries`, `abs`).

use crate::ast::Builtin;
use crate::error::EvalError;
use crate::eval::interpreter::{Interpreter, Stream};
use crate::value::{self, Env};
use serde_json::{Map, Value};
use std::rc::Rc;

fn num(v: &Value) -> Result<f64, EvalError> {
    match v {
        Value::Number(n) => Ok(n.as_f64().unwrap_or(f64::NAN)),
        other => Err(EvalError::type_error("a number", value::type_name(other))),
    }
}

fn to_value_number(n: f64) -> Value {
    value::number(n)
}

/// `l + r` (spec.md §4.3 operations table).
pub fn add(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Null, r) => Ok(r.clone()),
        (l, Value::Null) => Ok(l.clone()),
        (Value::Number(a), Value::Number(b)) => {
            Ok(to_value_number(a.as_f64().unwrap_or(f64::NAN) + b.as_f64().unwrap_or(f64::NAN)))
        }
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::Array(a), Value::Array(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Ok(Value::Array(out))
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut out = a.clone();
            for (k, v) in b {
                out.insert(k.clone(), v.clone());
            }
            Ok(Value::Object(out))
        }
        (a, b) => Err(EvalError::type_error(
            format!("{} + {}", value::type_name(a), value::type_name(b)),
            "incompatible operand types",
        )),
    }
}

/// `l - r`: numeric subtraction or array difference.
pub fn sub(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => {
            Ok(to_value_number(a.as_f64().unwrap_or(f64::NAN) - b.as_f64().unwrap_or(f64::NAN)))
        }
        (Value::Array(a), Value::Array(b)) => {
            Ok(Value::Array(a.iter().filter(|x| !b.contains(x)).cloned().collect()))
        }
        (a, b) => Err(EvalError::type_error(
            format!("{} - {}", value::type_name(a), value::type_name(b)),
            "incompatible operand types",
        )),
    }
}

/// `l * r`: numeric product, string repetition, or deep object merge.
pub fn mul(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => {
            Ok(to_value_number(a.as_f64().unwrap_or(f64::NAN) * b.as_f64().unwrap_or(f64::NAN)))
        }
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            let count = n.as_f64().unwrap_or(0.0);
            if count <= 0.0 {
                Ok(Value::Null)
            } else {
                Ok(Value::String(s.repeat(count as usize)))
            }
        }
        (Value::Object(a), Value::Object(b)) => Ok(Value::Object(deep_merge(a, b))),
        (a, b) => Err(EvalError::type_error(
            format!("{} * {}", value::type_name(a), value::type_name(b)),
            "incompatible operand types",
        )),
    }
}

fn deep_merge(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
    let mut out = a.clone();
    for (k, bv) in b {
        match (out.get(k), bv) {
            (Some(Value::Object(av)), Value::Object(bv)) => {
                out.insert(k.clone(), Value::Object(deep_merge(av, bv)));
            }
            _ => {
                out.insert(k.clone(), bv.clone());
            }
        }
    }
    out
}

/// `l / r`: numeric division or string split.
pub fn div(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Number(_), Value::Number(b)) if b.as_f64() == Some(0.0) => Err(EvalError::DivByZero),
        (Value::Number(a), Value::Number(b)) => {
            Ok(to_value_number(a.as_f64().unwrap_or(f64::NAN) / b.as_f64().unwrap_or(f64::NAN)))
        }
        (Value::String(a), Value::String(b)) => {
            if b.is_empty() {
                Ok(Value::Array(a.chars().map(|c| Value::String(c.to_string())).collect()))
            } else {
                Ok(Value::Array(a.split(b.as_str()).map(|s| Value::String(s.to_string())).collect()))
            }
        }
        (a, b) => Err(EvalError::type_error(
            format!("{} / {}", value::type_name(a), value::type_name(b)),
            "incompatible operand types",
        )),
    }
}

/// `l % r`: integer remainder, truncating both operands toward zero.
pub fn rem(l: &Value, r: &Value) -> Result<Value, EvalError> {
    let a = num(l)?;
    let b = num(r)?;
    if b.trunc() == 0.0 {
        return Err(EvalError::DivByZero);
    }
    let result = (a.trunc() as i64) % (b.trunc() as i64);
    Ok(to_value_number(result as f64))
}

fn array_or_err(v: &Value) -> Result<&Vec<Value>, EvalError> {
    match v {
        Value::Array(items) => Ok(items),
        other => Err(EvalError::type_error("an array", value::type_name(other))),
    }
}

fn once_ok(v: Value) -> Stream<'static> {
    Box::new(std::iter::once(Ok(v)))
}

fn once_err(e: EvalError) -> Stream<'static> {
    Box::new(std::iter::once(Err(e)))
}

/// Dispatches a recognized built-in call against `input`.
pub fn eval_builtin<'a>(
    interp: Interpreter,
    builtin: &'a Builtin,
    input: Value,
    env: Rc<Env>,
) -> Stream<'a> {
    match builtin {
        Builtin::Length => once_ok(match &input {
            Value::Null => Value::from(0),
            Value::Bool(_) => return once_err(EvalError::type_error("a sizable value", "boolean")),
            Value::Number(n) => to_value_number(n.as_f64().unwrap_or(0.0).abs()),
            Value::String(s) => Value::from(s.chars().count()),
            Value::Array(items) => Value::from(items.len()),
            Value::Object(map) => Value::from(map.len()),
        }),

        Builtin::Keys => match &input {
            Value::Object(map) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                once_ok(Value::Array(keys.into_iter().map(Value::String).collect()))
            }
            Value::Array(items) => {
                once_ok(Value::Array((0..items.len()).map(Value::from).collect()))
            }
            other => once_err(EvalError::type_error("an object or array", value::type_name(other))),
        },

        Builtin::Values => match &input {
            Value::Object(map) => once_ok(Value::Array(map.values().cloned().collect())),
            Value::Array(items) => once_ok(Value::Array(items.clone())),
            other => once_err(EvalError::type_error("an object or array", value::type_name(other))),
        },

        Builtin::Type => once_ok(Value::String(value::type_name(&input).to_string())),

        Builtin::Empty => Box::new(std::iter::empty()),

        Builtin::Not => once_ok(Value::Bool(!value::is_truthy(&input))),

        Builtin::Map(f) => {
            let items = match array_or_err(&input) {
                Ok(items) => items.clone(),
                Err(e) => return once_err(e),
            };
            let mut out = Vec::new();
            for item in items {
                for r in interp.eval(f, item, Rc::clone(&env)) {
                    match r {
                        Ok(v) => out.push(v),
                        Err(e) => return once_err(e),
                    }
                }
            }
            once_ok(Value::Array(out))
        }

        Builtin::Select(f) => {
            let results: Vec<Result<Value, EvalError>> =
                interp.eval(f, input.clone(), env).collect();
            let mut out = Vec::new();
            for r in results {
                match r {
                    Ok(v) if value::is_truthy(&v) => out.push(Ok(input.clone())),
                    Ok(_) => continue,
                    Err(e) => return once_err(e),
                }
            }
            Box::new(out.into_iter())
        }

        Builtin::Sort => match array_or_err(&input) {
            Ok(items) => {
                let mut sorted = items.clone();
                sorted.sort_by(value::compare);
                once_ok(Value::Array(sorted))
            }
            Err(e) => once_err(e),
        },

        Builtin::Reverse => match &input {
            Value::Array(items) => {
                let mut reversed = items.clone();
                reversed.reverse();
                once_ok(Value::Array(reversed))
            }
            Value::String(s) => once_ok(Value::String(s.chars().rev().collect())),
            other => once_err(EvalError::type_error("an array or string", value::type_name(other))),
        },

        Builtin::Flatten(depth) => match array_or_err(&input) {
            Ok(items) => {
                let mut out = Vec::new();
                flatten_into(items, depth.unwrap_or(i64::MAX), &mut out);
                once_ok(Value::Array(out))
            }
            Err(e) => once_err(e),
        },

        Builtin::Unique => match array_or_err(&input) {
            Ok(items) => {
                let mut sorted = items.clone();
                sorted.sort_by(value::compare);
                sorted.dedup_by(|a, b| value::compare(a, b) == std::cmp::Ordering::Equal);
                once_ok(Value::Array(sorted))
            }
            Err(e) => once_err(e),
        },

        Builtin::Add => match array_or_err(&input) {
            Ok(items) => {
                let mut acc = Value::Null;
                for item in items {
                    match add(&acc, item) {
                        Ok(v) => acc = v,
                        Err(e) => return once_err(e),
                    }
                }
                once_ok(acc)
            }
            Err(e) => once_err(e),
        },

        Builtin::Min => match array_or_err(&input) {
            Ok(items) => once_ok(items.iter().min_by(|a, b| value::compare(a, b)).cloned().unwrap_or(Value::Null)),
            Err(e) => once_err(e),
        },

        Builtin::Max => match array_or_err(&input) {
            Ok(items) => once_ok(items.iter().max_by(|a, b| value::compare(a, b)).cloned().unwrap_or(Value::Null)),
            Err(e) => once_err(e),
        },

        Builtin::Floor => match num(&input) {
            Ok(n) => once_ok(to_value_number(n.floor())),
            Err(e) => once_err(e),
        },

        Builtin::Sqrt => match num(&input) {
            Ok(n) => once_ok(to_value_number(n.sqrt())),
            Err(e) => once_err(e),
        },

        Builtin::Abs => match num(&input) {
            Ok(n) => once_ok(to_value_number(n.abs())),
            Err(e) => once_err(e),
        },

        Builtin::Any => match array_or_err(&input) {
            Ok(items) => once_ok(Value::Bool(items.iter().any(value::is_truthy))),
            Err(e) => once_err(e),
        },

        Builtin::All => match array_or_err(&input) {
            Ok(items) => once_ok(Value::Bool(items.iter().all(value::is_truthy))),
            Err(e) => once_err(e),
        },

        Builtin::ToEntries => match &input {
            Value::Object(map) => {
                let entries: Vec<Value> = map
                    .iter()
                    .map(|(k, v)| {
                        let mut entry = Map::new();
                        entry.insert("key".to_string(), Value::String(k.clone()));
                        entry.insert("value".to_string(), v.clone());
                        Value::Object(entry)
                    })
                    .collect();
                once_ok(Value::Array(entries))
            }
            other => once_err(EvalError::type_error("an object", value::type_name(other))),
        },

        Builtin::FromEntries => match array_or_err(&input) {
            Ok(items) => {
                let mut map = Map::new();
                for entry in items {
                    let Value::Object(entry) = entry else {
                        return once_err(EvalError::type_error("an object", value::type_name(entry)));
                    };
                    let key = entry
                        .get("key")
                        .or_else(|| entry.get("k"))
                        .or_else(|| entry.get("name"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    let key = match key {
                        Value::String(s) => s,
                        other => match serde_json::to_string(&other) {
                            Ok(s) => s.trim_matches('"').to_string(),
                            Err(_) => continue,
                        },
                    };
                    let value = entry
                        .get("value")
                        .or_else(|| entry.get("v"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    map.insert(key, value);
                }
                once_ok(Value::Object(map))
            }
            Err(e) => once_err(e),
        },
    }
}

fn flatten_into(items: &[Value], depth: i64, out: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => flatten_into(inner, depth - 1, out),
            other => out.push(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_numbers_and_strings() {
        assert_eq!(add(&json!(1), &json!(2)).unwrap(), json!(3));
        assert_eq!(add(&json!("a"), &json!("b")).unwrap(), json!("ab"));
        assert_eq!(add(&json!([1]), &json!([2])).unwrap(), json!([1, 2]));
        assert_eq!(add(&Value::Null, &json!(5)).unwrap(), json!(5));
    }

    #[test]
    fn test_add_objects_is_right_biased() {
        assert_eq!(
            add(&json!({"a": 1, "b": 1}), &json!({"b": 2})).unwrap(),
            json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn test_sub_array_difference() {
        assert_eq!(sub(&json!([1, 2, 3]), &json!([2])).unwrap(), json!([1, 3]));
    }

    #[test]
    fn test_mul_string_repeat() {
        assert_eq!(mul(&json!("ab"), &json!(3)).unwrap(), json!("ababab"));
    }

    #[test]
    fn test_mul_deep_merge() {
        assert_eq!(
            mul(&json!({"a": {"x": 1}}), &json!({"a": {"y": 2}})).unwrap(),
            json!({"a": {"x": 1, "y": 2}})
        );
    }

    #[test]
    fn test_div_by_zero() {
        assert_eq!(div(&json!(1), &json!(0)), Err(EvalError::DivByZero));
    }

    #[test]
    fn test_div_string_split() {
        assert_eq!(div(&json!("a,b,c"), &json!(",")).unwrap(), json!(["a", "b", "c"]));
    }

    #[test]
    fn test_rem_by_zero() {
        assert_eq!(rem(&json!(5), &json!(0)), Err(EvalError::DivByZero));
    }

    #[test]
    fn test_rem_truncates() {
        assert_eq!(rem(&json!(7), &json!(3)).unwrap(), json!(1));
    }

    #[test]
    fn test_flatten_depth() {
        let mut out = Vec::new();
        flatten_into(&[json!([1, [2, 3]]), json!(4)], 1, &mut out);
        assert_eq!(out, vec![json!(1), json!([2, 3]), json!(4)]);
    }
}
