//! End-to-end scenarios and invariants from spec.md §8.

use jqlite::{eval, parse, run};
use serde_json::{json, Value};
use std::rc::Rc;

fn values(query: &str, input: Value) -> Vec<Value> {
    let expr = parse(query).unwrap();
    eval(&expr, input).map(|r| r.unwrap()).collect()
}

// -- end-to-end scenarios --------------------------------------------------

#[test]
fn scenario_plain_key_access() {
    let output = run(".foo", r#"{"foo":42,"bar":43}"#).unwrap();
    assert_eq!(output, "42");
}

#[test]
fn scenario_select_and_reshape() {
    let input = r#"{"users":[
        {"name":"Alice","age":25,"email":"a@x"},
        {"name":"Bob","age":17,"email":"b@x"}
    ]}"#;
    let output = run(
        ".users[] | select(.age >= 18) | {name: .name, email: .email}",
        input,
    )
    .unwrap();
    assert_eq!(output, r#"{"name":"Alice","email":"a@x"}"#);
}

#[test]
fn scenario_alternative_falls_back_through_optional() {
    let output = run(r#".user.name? // "(unknown)""#, r#"{"user":{}}"#).unwrap();
    assert_eq!(output, "\"(unknown)\"");
}

#[test]
fn scenario_map_then_add() {
    let output = run(".numbers | map(. * 2) | add", r#"{"numbers":[1,2,3]}"#).unwrap();
    assert_eq!(output, "12");
}

#[test]
fn scenario_select_filters_and_orders_matches() {
    let input = r#"{"events":[
        {"level":"info","message":"startup"},
        {"level":"error","message":"disk full"},
        {"level":"error","message":"timeout"}
    ]}"#;
    let output = run(r#".events[] | select(.level=="error") | .message"#, input).unwrap();
    assert_eq!(output, "\"disk full\"\n\"timeout\"");
}

#[test]
fn scenario_index_list_preserves_request_order() {
    let output = run(".[0,2]", "[1,2,3]").unwrap();
    assert_eq!(output, "1\n3");
}

#[test]
fn scenario_flatten_depth() {
    assert_eq!(run("flatten", "[[1,2],[3,[4,5]]]").unwrap(), "[1,2,3,[4,5]]");
    assert_eq!(run("flatten(2)", "[[1,2],[3,[4,5]]]").unwrap(), "[1,2,3,4,5]");
}

// -- invariants -------------------------------------------------------------

#[test]
fn invariant_identity_is_a_singleton_stream() {
    assert_eq!(values(".", json!({"a": 1})), vec![json!({"a": 1})]);
}

#[test]
fn invariant_pipe_is_flat_map_over_the_stream() {
    let direct = values(".[] | . + 1", json!([1, 2, 3]));
    let expected: Vec<Value> = values(".[]", json!([1, 2, 3]))
        .into_iter()
        .flat_map(|v| {
            let expr = parse(". + 1").unwrap();
            let interp = jqlite::Interpreter::new();
            interp
                .eval(&expr, v, Rc::new(jqlite::Env::root()))
                .map(|r| r.unwrap())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(direct, expected);
}

#[test]
fn invariant_comma_concatenates_independent_streams() {
    assert_eq!(
        values(".a, .b", json!({"a": 1, "b": 2})),
        vec![json!(1), json!(2)]
    );
}

#[test]
fn invariant_keys_sorted_but_iteration_is_insertion_order() {
    let input = json!({"z": 1, "a": 2, "m": 3});
    assert_eq!(values("keys", input.clone()), vec![json!(["a", "m", "z"])]);
    assert_eq!(values(".[]", input), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn invariant_reverse_is_its_own_inverse() {
    let input = json!([1, 2, 3, 4]);
    assert_eq!(values("reverse | reverse", input.clone()), vec![input]);
}

#[test]
fn invariant_sort_is_a_monotone_permutation() {
    let sorted = values("sort", json!([3, 1, 4, 1, 5, 9, 2, 6]));
    assert_eq!(sorted, vec![json!([1, 1, 2, 3, 4, 5, 6, 9])]);
}

#[test]
fn invariant_array_round_trips_through_iteration_and_construction() {
    let input = json!([1, 2, 3]);
    assert_eq!(values("[.[]]", input.clone()), vec![input]);
}

#[test]
fn invariant_deterministic_repeated_evaluation() {
    let input = json!({"a": [1, 2, 3]});
    let first = values(".a | map(. * 2)", input.clone());
    let second = values(".a | map(. * 2)", input);
    assert_eq!(first, second);
}
