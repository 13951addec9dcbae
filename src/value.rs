//! The JSON value model and jq-specific operations over it.
//!
//! spec.md §6 treats the JSON value as an external collaborator —
//! "any conforming JSON codec suffices." This crate promotes
//! `serde_json::Value` (built with the `preserve_order` feature, so
//! objects are backed by an order-preserving map rather than a
//! `BTreeMap`) from an optional serialization format to the value
//! model itself, satisfying every invariant in §3 directly: a
//! six-case tagged variant, insertion-order preserving objects,
//! structural equality, and a stable string representation.
//!
//! This module adds the handful of operations jq needs on top of that
//! external type: truthiness, the total order across types, and an
//! immutable, persistent variable environment.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

/// jq truthiness: everything except `false` and `null` is truthy.
pub fn is_truthy(v: &Value) -> bool {
    !matches!(v, Value::Null | Value::Bool(false))
}

/// The name `type` reports for a value.
pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builds the canonical `Value::Number` for a computed `f64`.
///
/// jq has a single numeric type; `serde_json::Number` does not — it
/// tags integers and floats differently, so `Number::from(2i64)` and
/// `Number::from_f64(2.0)` compare unequal even though jq would treat
/// them as the same value `2`. Collapsing whole numbers back to an
/// integer representation here keeps arithmetic results structurally
/// equal (and identically serialized) to same-valued numbers parsed
/// straight out of JSON input.
pub fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::Number((n as i64).into())
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Rank used to order values of different types: `null < false <
/// true < number < string < array < object` (spec.md's jq total
/// order, GLOSSARY). `Bool` folds its two values into adjacent ranks
/// so same-type comparison degenerates to rank comparison alone.
fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    a.as_f64()
        .unwrap_or(f64::NAN)
        .partial_cmp(&b.as_f64().unwrap_or(f64::NAN))
        .unwrap_or(Ordering::Equal)
}

fn compare_objects(a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    let mut a_keys: Vec<&String> = a.keys().collect();
    let mut b_keys: Vec<&String> = b.keys().collect();
    a_keys.sort();
    b_keys.sort();

    match a_keys.cmp(&b_keys) {
        Ordering::Equal => {
            for k in a_keys {
                match compare(&a[k], &b[k]) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        }
        other => other,
    }
}

/// jq's total order across all JSON values (spec.md §4.3 "Ordering").
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                match compare(xi, yi) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => compare_objects(x, y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// An immutable, persistent variable environment.
///
/// New scopes layer a fresh set of bindings over a shared, reference-
/// counted parent rather than cloning it (spec.md §9 "Immutable
/// environments" calls for a persistent mapping so lexical scoping is
/// trivial to extend). No construct in this core binds a variable;
/// `Env::root` is always empty unless the host supplies bindings.
#[derive(Debug, Clone, Default)]
pub struct Env {
    bindings: HashMap<String, Value>,
    parent: Option<Rc<Env>>,
}

impl Env {
    /// An empty, parentless environment.
    pub fn root() -> Self {
        Self::default()
    }

    /// A child scope that shadows `self` with `bindings`.
    pub fn child(self: &Rc<Self>, bindings: HashMap<String, Value>) -> Env {
        Env {
            bindings,
            parent: Some(Rc::clone(self)),
        }
    }

    /// Looks up a variable, searching outward through parent scopes.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(0)));
        assert!(is_truthy(&json!("")));
    }

    #[test]
    fn test_total_order_across_types() {
        assert_eq!(compare(&Value::Null, &json!(false)), Ordering::Less);
        assert_eq!(compare(&json!(false), &json!(true)), Ordering::Less);
        assert_eq!(compare(&json!(true), &json!(1)), Ordering::Less);
        assert_eq!(compare(&json!(1), &json!("a")), Ordering::Less);
        assert_eq!(compare(&json!("a"), &json!([1])), Ordering::Less);
        assert_eq!(compare(&json!([1]), &json!({"a": 1})), Ordering::Less);
    }

    #[test]
    fn test_array_ordering_lexicographic() {
        assert_eq!(compare(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(compare(&json!([1]), &json!([1, 2])), Ordering::Less);
    }

    #[test]
    fn test_object_equality_ignores_key_order() {
        assert_eq!(json!({"a": 1, "b": 2}), json!({"b": 2, "a": 1}));
    }

    #[test]
    fn test_env_lookup_through_parent() {
        let root = Rc::new(Env::root());
        let mut bindings = HashMap::new();
        bindings.insert("x".to_string(), json!(1));
        let child = root.child(bindings);
        assert_eq!(child.lookup("x"), Some(&json!(1)));
        assert_eq!(child.lookup("y"), None);
    }
}
