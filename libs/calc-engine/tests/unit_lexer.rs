//! Integration-level tests for the lexer: tokenizing complete formulas
//! through the crate's public lexer API.

use calc_engine::lexer::Lexer;
use calc_engine::token::{Token, TokenType};
use calc_engine::{Error, Limits};

fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input, &Limits::default())
        .unwrap()
        .tokenize()
        .unwrap()
}

fn token_types(input: &str) -> Vec<TokenType> {
    tokenize(input).into_iter().map(|t| t.token_type).collect()
}

#[test]
fn number_literals_support_decimals_and_exponents() {
    let types = token_types("1 2.5 3e10 4.2e-3");
    assert_eq!(
        types,
        vec![
            TokenType::Number,
            TokenType::Number,
            TokenType::Number,
            TokenType::Number,
            TokenType::Dollar,
        ]
    );
}

#[test]
fn boolean_and_if_keywords_are_recognized() {
    let types = token_types("true false if");
    assert_eq!(
        types,
        vec![
            TokenType::Boolean,
            TokenType::Boolean,
            TokenType::If,
            TokenType::Dollar,
        ]
    );
}

#[test]
fn token_positions_are_monotonically_non_decreasing() {
    let tokens = tokenize("1 + 2\n* 3");
    for pair in tokens.windows(2) {
        assert!(pair[0].position.index <= pair[1].position.index);
    }
}

#[test]
fn every_token_has_a_non_empty_lexeme_except_the_sentinel() {
    for token in tokenize("1 + if(a, b, c)") {
        if token.token_type != TokenType::Dollar {
            assert!(!token.lexeme.is_empty());
        }
    }
}

#[test]
fn rejects_unexpected_character() {
    let err = Lexer::new("1 @ 2", &Limits::default())
        .unwrap()
        .tokenize()
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedCharacter { .. }));
}

#[test]
fn rejects_malformed_number() {
    let err = Lexer::new("1.2.3", &Limits::default())
        .unwrap()
        .tokenize()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidNumberFormat { .. }));
}

#[test]
fn rejects_input_exceeding_line_count() {
    let limits = Limits {
        max_lines: 2,
        ..Limits::default()
    };
    let err = Lexer::new("1\n2\n3", &limits).unwrap_err();
    assert!(matches!(err, Error::TooManyLines { .. }));
}

#[test]
fn function_call_requires_adjacent_paren() {
    assert_eq!(token_types("SUM(")[0], TokenType::Function);
    assert_eq!(token_types("SUM (")[0], TokenType::Variable);
}
