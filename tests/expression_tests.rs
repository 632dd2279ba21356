mod common;

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use shapeql::{EvalContext, EvalError, Evaluator, ParseError, evaluate, try_evaluate};

fn scope() -> Map<String, Value> {
    let data = json!({
        "first": "Ada",
        "last": "Lovelace",
        "age": 36,
        "price": 10,
        "qty": 3,
        "nothing": null,
        "csv": "a,b,c",
        "padded": "  hi  ",
        "tags": ["math", "poetry", "engines"],
        "user": {"name": "ada", "roles": ["admin"]},
        "active": true
    });
    match data {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn eval(expr: &str) -> Value {
    evaluate(expr, &scope())
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval("price * qty"), json!(30));
    assert_eq!(eval("price - qty * 2"), json!(4));
    assert_eq!(eval("(price - qty) * 2"), json!(14));
    assert_eq!(eval("7 / 2"), json!(3.5));
    assert_eq!(eval("7 % 4"), json!(3));
    assert_eq!(eval("-price + 1"), json!(-9));
}

#[test]
fn test_decimal_arithmetic_is_exact() {
    assert_eq!(eval("0.1 + 0.2"), json!(0.3));
    assert_eq!(eval("2.5 * 2"), json!(5));
}

#[test]
fn test_division_by_zero() {
    assert_eq!(eval("price / 0"), Value::Null);
    assert_eq!(try_evaluate("price / 0", &scope()), Err(EvalError::DivisionByZero));
}

#[test]
fn test_string_concatenation() {
    assert_eq!(eval("first + ' ' + last"), json!("Ada Lovelace"));
    assert_eq!(eval("'age: ' + age"), json!("age: 36"));
    assert_eq!(eval("\"tags: \" + tags"), json!("tags: math,poetry,engines"));
}

#[test]
fn test_comparison() {
    assert_eq!(eval("age >= 18"), json!(true));
    assert_eq!(eval("age < 18"), json!(false));
    assert_eq!(eval("'36' == age"), json!(true));
    assert_eq!(eval("'36' === age"), json!(false));
    assert_eq!(eval("age !== 36"), json!(false));
    assert_eq!(eval("first < last"), json!(true));
    assert_eq!(eval("nothing == null"), json!(true));
}

#[test]
fn test_null_orders_as_zero() {
    assert_eq!(eval("nothing < 1"), json!(true));
    assert_eq!(eval("nothing >= 0"), json!(true));
    assert_eq!(eval("nothing > -1"), json!(true));
    assert_eq!(eval("nothing == 0"), json!(false));
    assert_eq!(eval("nothing < 'a'"), json!(false));
}

#[test]
fn test_logical_operators_return_operands() {
    assert_eq!(eval("active && first"), json!("Ada"));
    assert_eq!(eval("nothing || 'fallback'"), json!("fallback"));
    assert_eq!(eval("!active"), json!(false));
    assert_eq!(eval("!nothing"), json!(true));
    assert_eq!(eval("nothing ?? 'n/a'"), json!("n/a"));
    assert_eq!(eval("0 ?? 'n/a'"), json!(0));
}

#[test]
fn test_logical_operators_short_circuit() {
    // the right side would fail with an undefined identifier
    assert_eq!(eval("active || undefinedThing"), json!(true));
    assert_eq!(eval("nothing && undefinedThing"), Value::Null);
}

#[test]
fn test_ternary() {
    assert_eq!(eval("age > 18 ? 'adult' : 'minor'"), json!("adult"));
    assert_eq!(eval("nothing ? 1 : active ? 2 : 3"), json!(2));
}

#[test]
fn test_member_and_index_access() {
    assert_eq!(eval("user.name"), json!("ada"));
    assert_eq!(eval("user['name']"), json!("ada"));
    assert_eq!(eval("tags[1]"), json!("poetry"));
    assert_eq!(eval("user.roles[0]"), json!("admin"));
    assert_eq!(eval("tags[10]"), Value::Null);
    assert_eq!(eval("user.missing"), Value::Null);
}

#[test]
fn test_optional_chaining() {
    assert_eq!(try_evaluate("user?.profile?.email", &scope()), Ok(Value::Null));
    assert_eq!(try_evaluate("nothing?.a.b.c", &scope()), Ok(Value::Null));
    assert_eq!(eval("user?.name"), json!("ada"));
    assert_eq!(eval("nothing?.[0] ?? 'none'"), json!("none"));
    assert!(matches!(
        try_evaluate("user.profile.email", &scope()),
        Err(EvalError::TypeError(_))
    ));
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("first.toUpperCase()"), json!("ADA"));
    assert_eq!(eval("last.toLowerCase()"), json!("lovelace"));
    assert_eq!(eval("padded.trim()"), json!("hi"));
    assert_eq!(eval("csv.split(',')"), json!(["a", "b", "c"]));
    assert_eq!(eval("last.slice(0, 4)"), json!("Love"));
    assert_eq!(eval("last.slice(-4)"), json!("lace"));
    assert_eq!(eval("first.includes('d')"), json!(true));
    assert_eq!(eval("first.startsWith('A')"), json!(true));
    assert_eq!(eval("first.charAt(2)"), json!("a"));
    assert_eq!(eval("csv.replace(',', ';')"), json!("a;b,c"));
    assert_eq!(eval("first.length"), json!(3));
}

#[test]
fn test_array_methods() {
    assert_eq!(eval("tags.length"), json!(3));
    assert_eq!(eval("tags.join(' / ')"), json!("math / poetry / engines"));
    assert_eq!(eval("tags.includes('poetry')"), json!(true));
    assert_eq!(eval("tags.indexOf('engines')"), json!(2));
    assert_eq!(eval("tags.indexOf('knitting')"), json!(-1));
    assert_eq!(eval("tags.at(-1)"), json!("engines"));
    assert_eq!(eval("tags.slice(1)"), json!(["poetry", "engines"]));
    assert_eq!(eval("tags.reverse()[0]"), json!("engines"));
    assert_eq!(eval("[1, 2, 3].join('')"), json!("123"));
}

#[test]
fn test_number_methods() {
    assert_eq!(eval("price.toFixed(2)"), json!("10.00"));
    assert_eq!(eval("age.toString() + '!'"), json!("36!"));
}

#[test]
fn test_methods_outside_the_allow_list_fail() {
    assert_eq!(
        try_evaluate("first.constructor()", &scope()),
        Err(EvalError::UnknownMethod {
            receiver: "string",
            method: "constructor".to_string()
        })
    );
    assert!(matches!(
        try_evaluate("alert(1)", &scope()),
        Err(EvalError::Syntax(ParseError::UnsupportedCall(_)))
    ));
}

#[test]
fn test_failures_become_null() {
    assert_eq!(eval("undefinedThing"), Value::Null);
    assert_eq!(eval("undefinedThing.deeper"), Value::Null);
    assert_eq!(eval("price +"), Value::Null);
    assert_eq!(eval("'unterminated"), Value::Null);
    assert_eq!(eval("a = 1"), Value::Null);
    assert_eq!(eval("user * 2"), Value::Null);
}

#[test]
fn test_scope_layers() {
    let root = json!({"name": "root", "onlyRoot": 1});
    let current = json!({"name": "current"});
    let ctx = EvalContext::new(&root, &current).with_parent_key(Some("owner"));
    let evaluator = Evaluator::new();

    assert_eq!(evaluator.eval_str("name", &ctx), Ok(json!("current")));
    assert_eq!(evaluator.eval_str("onlyRoot", &ctx), Ok(json!(1)));
    assert_eq!(evaluator.eval_str("owner.name", &ctx), Ok(json!("current")));
    assert!(matches!(
        evaluator.eval_str("stranger", &ctx),
        Err(EvalError::UndefinedIdentifier(name)) if name == "stranger"
    ));
}

#[test]
fn test_transform_binds_value() {
    let data = json!({"factor": 3});
    let ctx = EvalContext::new(&data, &data);
    let evaluator = Evaluator::new();

    assert_eq!(evaluator.eval_transform("value * factor", &ctx, &json!(7)), Ok(json!(21)));
    assert_eq!(
        evaluator.eval_transform("v => v.toUpperCase()", &ctx, &json!("loud")),
        Ok(json!("LOUD"))
    );
    assert_eq!(
        evaluator.eval_transform("(s) => s.trim() + '!'", &ctx, &json!(" hey ")),
        Ok(json!("hey!"))
    );
    assert!(evaluator.eval_transform("value.toUpperCase()", &ctx, &json!(5)).is_err());
}
