//! Error taxonomy for the formula engine
//!
//! One closed, stable-code enum covers every failure surface in the
//! pipeline: lexer pre-validation, lexical errors, parser errors, grammar
//! build errors, parser resource limits, AST invariant violations, evaluator
//! runtime errors, the security validator, and the multi-step calculator's
//! step-wrapping layer. Errors bubble up unwrapped; only the multi-step
//! calculator adds context, via `StepFailure`.

use crate::token::Position;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A stable, exhaustive error taxonomy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ---- Lexer pre-validation (input-shape errors, §4.B) ----
    #[error("input exceeds maximum length of {max} bytes")]
    InputTooLong { max: usize },

    #[error("line {line} exceeds maximum length of {max} characters")]
    LineTooLong { line: usize, max: usize },

    #[error("input exceeds maximum of {max} lines")]
    TooManyLines { max: usize },

    #[error("bracket nesting at {position} exceeds maximum depth of {max}")]
    NestingTooDeep { position: Position, max: usize },

    #[error("forbidden character at {position}")]
    ForbiddenCharacter { position: Position },

    // ---- Lexer ----
    #[error("unexpected character '{lexeme}' at {position}")]
    UnexpectedCharacter { lexeme: String, position: Position },

    #[error("invalid number format '{lexeme}' at {position}")]
    InvalidNumberFormat { lexeme: String, position: Position },

    // ---- Parser ----
    #[error("unexpected token '{lexeme}' at {position}")]
    UnexpectedToken { lexeme: String, position: Position },

    #[error("unexpected end of input at {position}")]
    UnexpectedEndOfInput { position: Position },

    #[error("unbalanced parentheses at {position}")]
    UnbalancedParentheses { position: Position },

    // ---- Table builder (build-time, surfaces synchronously) ----
    #[error("grammar conflict: {message}")]
    GrammarConflict { message: String },

    // ---- Parser runtime resource limits ----
    #[error("parser stack overflow: exceeded {max} entries")]
    StackOverflow { max: usize },

    #[error("parser step limit exceeded: {max} steps")]
    StepLimitExceeded { max: usize },

    // ---- AST factory ----
    #[error("invalid AST node: {message}")]
    InvalidASTNode { message: String },

    #[error("AST depth {depth} exceeds maximum of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("AST size {size} exceeds maximum of {max}")]
    SizeExceeded { size: usize, max: usize },

    // ---- Evaluator ----
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("function '{name}' expects {expected}, got {actual} argument(s)")]
    ArityMismatch {
        name: String,
        expected: String,
        actual: usize,
    },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("domain error: {message}")]
    DomainError { message: String },

    // ---- Validator ----
    #[error("security violation: '{name}' is a reserved name")]
    SecurityViolation { name: String },

    // ---- Multi-step calculator ----
    #[error("step {step_index} ('{formula}') failed: {source}")]
    StepFailure {
        step_index: usize,
        formula: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error as a multi-step calculator failure, attaching the
    /// 1-based step index and the offending formula text. No other layer
    /// adds this kind of context.
    pub fn into_step_failure(self, step_index: usize, formula: impl Into<String>) -> Error {
        Error::StepFailure {
            step_index,
            formula: formula.into(),
            source: Box::new(self),
        }
    }

    /// The position carried by this error, if any.
    pub fn position(&self) -> Option<Position> {
        match self {
            Error::NestingTooDeep { position, .. }
            | Error::ForbiddenCharacter { position }
            | Error::UnexpectedCharacter { position, .. }
            | Error::InvalidNumberFormat { position, .. }
            | Error::UnexpectedToken { position, .. }
            | Error::UnexpectedEndOfInput { position }
            | Error::UnbalancedParentheses { position } => Some(*position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_failure_wraps_underlying_error() {
        let underlying = Error::DivisionByZero;
        let wrapped = underlying.clone().into_step_failure(2, "x / 0");
        match wrapped {
            Error::StepFailure {
                step_index,
                formula,
                source,
            } => {
                assert_eq!(step_index, 2);
                assert_eq!(formula, "x / 0");
                assert_eq!(*source, underlying);
            }
            _ => panic!("expected StepFailure"),
        }
    }

    #[test]
    fn position_extraction() {
        let pos = Position::new(4, 1, 5);
        let err = Error::UnbalancedParentheses { position: pos };
        assert_eq!(err.position(), Some(pos));
        assert_eq!(Error::DivisionByZero.position(), None);
    }
}
