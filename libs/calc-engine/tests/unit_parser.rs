//! Integration-level tests for the LR(1) parser, exercised through the
//! crate's public `Engine` (table build + lex + parse in one call).

use calc_engine::ast::AstNode;
use calc_engine::{Engine, Error};

fn parse(formula: &str) -> Result<AstNode, Error> {
    let grammar = calc_engine::grammar::Grammar::new();
    let table = calc_engine::table::TableBuilder::new(&grammar).build().unwrap();
    let limits = calc_engine::Limits::default();
    let tokens = calc_engine::lexer::Lexer::new(formula, &limits)?.tokenize()?;
    calc_engine::parser::Parser::new(&grammar, &table, &limits).parse(tokens)
}

#[test]
fn parses_number_literal() {
    assert!(matches!(parse("42").unwrap(), AstNode::Number(n) if n == 42.0));
}

#[test]
fn parses_boolean_literal() {
    assert!(matches!(parse("true").unwrap(), AstNode::Boolean(true)));
}

#[test]
fn parses_variable_reference() {
    assert!(matches!(parse("my_var").unwrap(), AstNode::Variable(name) if name == "my_var"));
}

#[test]
fn precedence_binds_multiplication_tighter_than_addition() {
    match parse("1 + 2 * 3").unwrap() {
        AstNode::BinaryOp { op, right, .. } => {
            assert_eq!(op.as_str(), "+");
            assert!(matches!(*right, AstNode::BinaryOp { .. }));
        }
        other => panic!("expected addition at the root, got {other:?}"),
    }
}

#[test]
fn parentheses_override_precedence() {
    match parse("(1 + 2) * 3").unwrap() {
        AstNode::BinaryOp { op, left, .. } => {
            assert_eq!(op.as_str(), "*");
            assert!(matches!(*left, AstNode::BinaryOp { .. }));
        }
        other => panic!("expected multiplication at the root, got {other:?}"),
    }
}

#[test]
fn power_binds_tighter_than_unary_minus() {
    // `-2 ^ 2` parses as `-(2 ^ 2)` per this grammar's precedence ladder
    // (unary at level 7, power at level 8, power binds tighter so it
    // forms the operand of the outer unary minus), matching the usual
    // mathematical convention that `-2^2` evaluates to `-4`.
    match parse("-2 ^ 2").unwrap() {
        AstNode::UnaryOp { op, operand } => {
            assert_eq!(op.as_str(), "-");
            assert!(matches!(*operand, AstNode::BinaryOp { .. }));
        }
        other => panic!("expected unary minus at the root, got {other:?}"),
    }
}

#[test]
fn nested_function_calls_parse() {
    match parse("ROUND(SQRT(4), 2)").unwrap() {
        AstNode::FunctionCall { name, args } => {
            assert_eq!(name, "ROUND");
            assert_eq!(args.len(), 2);
            assert!(matches!(&args[0], AstNode::FunctionCall { name, .. } if name == "SQRT"));
        }
        other => panic!("expected function call, got {other:?}"),
    }
}

#[test]
fn conditional_keyword_and_call_style_both_parse_to_if() {
    let a = parse("if(1, 2, 3)").unwrap();
    let b = parse("IF(1, 2, 3)").unwrap();
    assert!(matches!(a, AstNode::If { .. }));
    assert!(matches!(b, AstNode::If { .. }));
}

#[test]
fn unbalanced_parens_produce_the_dedicated_error() {
    let err = parse("(1 + 2").unwrap_err();
    assert!(matches!(err, Error::UnbalancedParentheses { .. }));
}

#[test]
fn trailing_comma_in_arguments_is_rejected() {
    assert!(parse("SUM(1, 2,)").is_err());
}

#[test]
fn deeply_nested_parens_within_limits_still_parse() {
    let formula = format!("{}{}{}", "(".repeat(30), "1", ")".repeat(30));
    assert!(parse(&formula).is_ok());
}

#[test]
fn excess_nesting_depth_is_rejected() {
    let formula = format!("{}{}{}", "(".repeat(150), "1", ")".repeat(150));
    let err = parse(&formula).unwrap_err();
    assert!(matches!(err, Error::NestingTooDeep { .. }));
}
