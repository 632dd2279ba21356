// tests/parser_tests.rs

use shapeql::ast::{BinOp, Expr, Token, UnaryOp};
use shapeql::parser::{ParseError, parse_expr};

fn ident(name: &str) -> Expr {
    Expr::Identifier(name.to_string())
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn member(object: Expr, property: &str, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property: property.to_string(),
        optional,
    }
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_comparison() {
    let expr = parse_expr("price > 100").unwrap();

    assert!(matches!(
        expr,
        Expr::BinaryOp {
            op: BinOp::GreaterThan,
            ..
        }
    ));
}

#[test]
fn test_parentheses() {
    // Should be: Multiply(Add(1, 2), 3)
    assert_eq!(
        parse_expr("(1 + 2) * 3").unwrap(),
        binary(
            BinOp::Multiply,
            binary(BinOp::Add, Expr::Integer(1), Expr::Integer(2)),
            Expr::Integer(3)
        )
    );
}

#[test]
fn test_arithmetic() {
    // Should be: Add(1, Multiply(2, 3))
    assert_eq!(
        parse_expr("1 + 2 * 3").unwrap(),
        binary(
            BinOp::Add,
            Expr::Integer(1),
            binary(BinOp::Multiply, Expr::Integer(2), Expr::Integer(3))
        )
    );
}

#[test]
fn test_left_associativity() {
    // Should be: Subtract(Subtract(10, 4), 3)
    assert_eq!(
        parse_expr("10 - 4 - 3").unwrap(),
        binary(
            BinOp::Subtract,
            binary(BinOp::Subtract, Expr::Integer(10), Expr::Integer(4)),
            Expr::Integer(3)
        )
    );
}

#[test]
fn test_logical_precedence() {
    // && binds tighter than ||, which binds tighter than ??
    assert_eq!(
        parse_expr("a || b && c ?? d").unwrap(),
        binary(
            BinOp::NullCoalesce,
            binary(
                BinOp::Or,
                ident("a"),
                binary(BinOp::And, ident("b"), ident("c"))
            ),
            ident("d")
        )
    );
}

#[test]
fn test_equality_below_relational() {
    assert_eq!(
        parse_expr("a < b === c >= d").unwrap(),
        binary(
            BinOp::StrictEqual,
            binary(BinOp::LessThan, ident("a"), ident("b")),
            binary(BinOp::GreaterEqual, ident("c"), ident("d"))
        )
    );
}

#[test]
fn test_unary() {
    assert_eq!(
        parse_expr("!-x").unwrap(),
        Expr::UnaryOp {
            op: UnaryOp::Not,
            operand: Box::new(Expr::UnaryOp {
                op: UnaryOp::Negate,
                operand: Box::new(ident("x")),
            }),
        }
    );
}

#[test]
fn test_ternary_is_right_associative() {
    let expr = parse_expr("a ? 1 : b ? 2 : 3").unwrap();

    match expr {
        Expr::Conditional { alternate, .. } => {
            assert!(matches!(*alternate, Expr::Conditional { .. }));
        }
        other => panic!("Expected conditional, got {:?}", other),
    }
}

// ============================================================================
// Access
// ============================================================================

#[test]
fn test_member_chain() {
    assert_eq!(
        parse_expr("user.address.city").unwrap(),
        member(member(ident("user"), "address", false), "city", false)
    );
}

#[test]
fn test_index_and_method_call() {
    assert_eq!(
        parse_expr("tags[0].toUpperCase()").unwrap(),
        Expr::MethodCall {
            object: Box::new(Expr::Index {
                object: Box::new(ident("tags")),
                index: Box::new(Expr::Integer(0)),
                optional: false,
            }),
            method: "toUpperCase".to_string(),
            args: vec![],
            optional: false,
        }
    );
}

#[test]
fn test_method_arguments() {
    match parse_expr("name.slice(0, -1)").unwrap() {
        Expr::MethodCall { method, args, .. } => {
            assert_eq!(method, "slice");
            assert_eq!(args.len(), 2);
            assert!(matches!(args[1], Expr::UnaryOp { op: UnaryOp::Negate, .. }));
        }
        other => panic!("Expected method call, got {:?}", other),
    }
}

#[test]
fn test_optional_chain_wraps_whole_chain() {
    assert_eq!(
        parse_expr("user?.profile.email").unwrap(),
        Expr::OptionalChain(Box::new(member(
            member(ident("user"), "profile", true),
            "email",
            false
        )))
    );
}

#[test]
fn test_optional_index() {
    assert_eq!(
        parse_expr("items?.[2]").unwrap(),
        Expr::OptionalChain(Box::new(Expr::Index {
            object: Box::new(ident("items")),
            index: Box::new(Expr::Integer(2)),
            optional: true,
        }))
    );
}

#[test]
fn test_array_literal() {
    assert_eq!(
        parse_expr("[1, 'two', null]").unwrap(),
        Expr::Array(vec![
            Expr::Integer(1),
            Expr::String("two".into()),
            Expr::Null
        ])
    );
    assert_eq!(parse_expr("[]").unwrap(), Expr::Array(vec![]));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_free_function_calls_are_rejected() {
    assert_eq!(
        parse_expr("eval('x')"),
        Err(ParseError::UnsupportedCall("eval".into()))
    );
}

#[test]
fn test_trailing_input_is_rejected() {
    assert!(matches!(
        parse_expr("a b"),
        Err(ParseError::UnexpectedToken { found: Token::Identifier(_), .. })
    ));
}

#[test]
fn test_incomplete_expressions() {
    assert!(matches!(
        parse_expr("1 +"),
        Err(ParseError::UnexpectedToken { found: Token::Eof, .. })
    ));
    assert!(parse_expr("(a").is_err());
    assert!(parse_expr("a ? b").is_err());
    assert!(parse_expr("user.").is_err());
    assert!(matches!(parse_expr("'open"), Err(ParseError::Lex(_))));
}
