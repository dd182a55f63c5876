//! A formula evaluation engine: lexer, LR(1) parser (with its own
//! parsing-table builder), an AST model with an optimizer, a tree-walking
//! evaluator, and a multi-step calculator that threads results between
//! formulas as variables.
//!
//! # Architecture overview
//!
//! ```text
//! formula text
//!      |
//!    Lexer -> tokens
//!      |
//!   Parser (driven by a prebuilt LR(1) table) -> AST
//!      |
//!  Optimizer -> optimized AST
//!      |
//!  Evaluator (AST + variable environment) -> Value
//! ```
//!
//! `Engine::calculate` runs the whole pipeline for a single formula;
//! `Engine::calculate_multi_step` runs a named sequence of formulas against
//! a shared, threaded environment.

pub mod ast;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod grammar;
pub mod lexer;
pub mod limits;
pub mod optimizer;
pub mod parser;
pub mod table;
pub mod token;
pub mod value;
pub mod visualize;

pub use engine::{Engine, MultiStepRequest, MultiStepResult, Step};
pub use error::{Error, Result};
pub use functions::Arity;
pub use limits::Limits;
pub use value::{Environment, Value};
