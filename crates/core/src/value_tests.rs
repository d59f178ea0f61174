// SPDX-License-Identifier: MIT

use super::*;
use serde_json::json;

#[yare::parameterized(
    any_accepts_int      = { DataType::Any, DataType::Int, true },
    int_accepts_any      = { DataType::Int, DataType::Any, true },
    float_accepts_int    = { DataType::Float, DataType::Int, true },
    int_rejects_float    = { DataType::Int, DataType::Float, false },
    str_rejects_int      = { DataType::Str, DataType::Int, false },
    exact_match          = { DataType::List, DataType::List, true },
)]
fn assignability(target: DataType, source: DataType, expected: bool) {
    assert_eq!(target.is_assignable_from(source), expected);
}

#[yare::parameterized(
    bool_value   = { DataType::Bool, json!(true), true },
    int_value    = { DataType::Int, json!(3), true },
    float_int    = { DataType::Float, json!(3), true },
    int_float    = { DataType::Int, json!(3.5), false },
    str_value    = { DataType::Str, json!("x"), true },
    list_value   = { DataType::List, json!([1, 2]), true },
    dict_value   = { DataType::Dict, json!({"a": 1}), true },
    wrong_kind   = { DataType::List, json!("x"), false },
)]
fn value_matching(ty: DataType, value: Value, expected: bool) {
    assert_eq!(ty.accepts_value(&value), expected);
}

#[test]
fn null_matches_every_type() {
    for ty in [
        DataType::Any,
        DataType::Bool,
        DataType::Int,
        DataType::Float,
        DataType::Str,
        DataType::List,
        DataType::Dict,
    ] {
        assert!(ty.accepts_value(&Value::Null), "{ty} rejected null");
    }
}

#[test]
fn of_value_picks_most_specific() {
    assert_eq!(DataType::of_value(&json!(1)), DataType::Int);
    assert_eq!(DataType::of_value(&json!(1.5)), DataType::Float);
    assert_eq!(DataType::of_value(&json!(null)), DataType::Any);
}

#[test]
fn serde_names_are_snake_case() {
    assert_eq!(serde_json::to_string(&DataType::Int).unwrap(), "\"int\"");
    let back: DataType = serde_json::from_str("\"dict\"").unwrap();
    assert_eq!(back, DataType::Dict);
}
